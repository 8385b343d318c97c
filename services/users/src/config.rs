//! Startup configuration
//!
//! Everything the service needs from the environment is read here once and
//! handed to the components explicitly. Nothing below `main` touches
//! `std::env`.

use anyhow::{Context, Result, bail};
use std::{net::SocketAddr, time::Duration};

use crate::{
    database::StoreBackend, jwt::TokenConfig, password::HasherConfig,
    rate_limiter::RateLimiterConfig,
};

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl ServerConfig {
    /// # Environment Variables
    /// - `BIND_ADDR`: listen address (default: `0.0.0.0:3000`)
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = raw
            .parse()
            .with_context(|| format!("BIND_ADDR is not a socket address: {:?}", raw))?;

        Ok(Self { bind_addr })
    }
}

/// Full service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreBackend,
    pub tokens: TokenConfig,
    pub hasher: HasherConfig,
    pub rate_limiter: RateLimiterConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            store: StoreBackend::from_env()?,
            tokens: TokenConfig::from_env()?,
            hasher: HasherConfig::from_env()?,
            rate_limiter: RateLimiterConfig::from_env()?,
        })
    }
}

/// Read an optional duration variable, falling back to `default`
pub(crate) fn duration_var(name: &str, default: &str) -> Result<Duration> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    parse_duration(&raw).with_context(|| format!("invalid duration in {}", name))
}

/// Read an optional numeric variable, falling back to `default`
pub(crate) fn number_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

/// Longest duration any setting may hold: ten years
pub const MAX_DURATION: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Parse a duration such as `15m`, `7d`, `30s` or `2h`.
///
/// A bare integer is taken as seconds. Anything longer than
/// [`MAX_DURATION`] is rejected.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        bail!("empty duration");
    }

    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    if digits.is_empty() {
        bail!("duration {:?} has no amount", input);
    }

    let amount: u64 = digits
        .parse()
        .with_context(|| format!("duration {:?} is out of range", input))?;
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => bail!("unknown duration unit {:?} in {:?}", other, input),
    };

    let secs = amount
        .checked_mul(multiplier)
        .with_context(|| format!("duration {:?} is out of range", input))?;
    if secs == 0 {
        bail!("duration {:?} must be positive", input);
    }

    let duration = Duration::from_secs(secs);
    if duration > MAX_DURATION {
        bail!(
            "duration {:?} exceeds the maximum of {} days",
            input,
            MAX_DURATION.as_secs() / 86_400
        );
    }

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("900").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration(" 1d ").unwrap(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_parse_duration_rejects_bad_input() {
        for bad in ["", "m", "15x", "15mm", "-5m", "0s", "1.5h", "99999999999999999999d"] {
            assert!(parse_duration(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_parse_duration_caps_length() {
        assert_eq!(parse_duration("3650d").unwrap(), MAX_DURATION);
        assert!(parse_duration("3651d").is_err());
        // fits in u64 seconds but overflows once added to the clock
        assert!(parse_duration("213503982334601d").is_err());
    }

    #[test]
    #[serial]
    fn test_oversized_ttl_fails_at_startup() {
        unsafe {
            std::env::set_var("ACCESS_TOKEN_TTL", "213503982334601d");
        }
        let err = duration_var("ACCESS_TOKEN_TTL", "15m").unwrap_err();
        assert!(format!("{:#}", err).contains("ACCESS_TOKEN_TTL"));

        unsafe {
            std::env::remove_var("ACCESS_TOKEN_TTL");
        }
    }

    #[test]
    #[serial]
    fn test_server_config_from_env() {
        unsafe {
            std::env::remove_var("BIND_ADDR");
        }
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), 3000);

        unsafe {
            std::env::set_var("BIND_ADDR", "127.0.0.1:8081");
        }
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8081");

        unsafe {
            std::env::set_var("BIND_ADDR", "not-an-address");
        }
        assert!(ServerConfig::from_env().is_err());

        unsafe {
            std::env::remove_var("BIND_ADDR");
        }
    }
}
