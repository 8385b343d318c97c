//! Password hashing with Argon2id

use anyhow::{Result, anyhow};
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier as _, Version,
    password_hash::{self, SaltString},
};

use crate::config::number_var;

/// Argon2 cost parameters, fixed for the lifetime of the process
#[derive(Debug, Clone)]
pub struct HasherConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HasherConfig {
    /// # Environment Variables
    /// - `PASSWORD_HASH_MEMORY_KIB` (default: 19456)
    /// - `PASSWORD_HASH_ITERATIONS` (default: 2)
    /// - `PASSWORD_HASH_PARALLELISM` (default: 1)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            memory_kib: number_var("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: number_var("PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: number_var("PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
        })
    }
}

/// One-way salted password hashing.
///
/// Digests are PHC strings, so verification reads its parameters from the
/// digest itself and keeps working after the configured cost changes.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    /// Digest of a throwaway password, verified against when the username
    /// does not exist so that both login failures cost the same
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(config: &HasherConfig) -> Result<Self> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| anyhow!("Invalid password hashing parameters: {}", e))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut hasher = Self {
            argon2,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash("not-a-real-password")?;
        Ok(hasher)
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let digest = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {}", e))?;

        Ok(digest.to_string())
    }

    /// Check a plaintext password against a stored digest.
    ///
    /// A mismatch is `Ok(false)`; only an unreadable digest or a failure of
    /// the primitive itself is an error.
    pub fn verify(&self, password: &str, digest: &str) -> Result<bool> {
        let parsed = PasswordHash::new(digest)
            .map_err(|e| anyhow!("Failed to parse password hash: {}", e))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow!("Failed to verify password: {}", e)),
        }
    }

    /// Burn the same work as a real verification and report failure
    pub fn verify_dummy(&self, password: &str) -> Result<bool> {
        self.verify(password, &self.dummy_hash)?;
        Ok(false)
    }
}

#[cfg(test)]
pub(crate) fn fast_config() -> HasherConfig {
    HasherConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}
