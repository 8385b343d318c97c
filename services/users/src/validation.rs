//! Input validation utilities
//!
//! Only presence and size are checked. Usernames are otherwise free-form and
//! case-sensitive, and there is no password strength policy.

pub const MAX_USERNAME_LEN: usize = 64;
pub const MAX_PASSWORD_LEN: usize = 256;

/// Validate a username and return it
pub fn validate_username(username: Option<&str>) -> Result<&str, String> {
    let username = match username {
        Some(u) if !u.is_empty() => u,
        _ => return Err("username is required".to_string()),
    };

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(format!(
            "username must be at most {} characters long",
            MAX_USERNAME_LEN
        ));
    }

    Ok(username)
}

/// Validate a password and return it
pub fn validate_password(password: Option<&str>) -> Result<&str, String> {
    let password = match password {
        Some(p) if !p.is_empty() => p,
        _ => return Err("password is required".to_string()),
    };

    if password.chars().count() > MAX_PASSWORD_LEN {
        return Err(format!(
            "password must be at most {} characters long",
            MAX_PASSWORD_LEN
        ));
    }

    Ok(password)
}

/// Validate a credential pair, reporting the first problem found
pub fn validate_credentials<'a>(
    username: Option<&'a str>,
    password: Option<&'a str>,
) -> Result<(&'a str, &'a str), String> {
    Ok((validate_username(username)?, validate_password(password)?))
}
