//! Lifecycle configuration.
//!
//! Set once at startup and read-only afterwards.
//!
//! # Example
//!
//! ```rust
//! use warden::config::{RefreshPolicy, WardenConfig};
//! use chrono::Duration;
//!
//! let config = WardenConfig {
//!     access_token_ttl: Duration::minutes(5),
//!     refresh_policy: RefreshPolicy::Fixed,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::AuthError;

/// Upper bound for every configured duration.
pub const MAX_DURATION: Duration = Duration::days(3650);

/// `now + ttl`, or a `ConfigurationError` when the sum leaves chrono's range.
pub(crate) fn expires_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, AuthError> {
    now.checked_add_signed(ttl).ok_or_else(|| {
        AuthError::ConfigurationError(format!(
            "ttl of {} seconds overflows the timestamp range",
            ttl.num_seconds()
        ))
    })
}

/// How the refresh-token expiry behaves on rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Every rotation pushes the refresh expiry to `now + refresh_token_ttl`.
    #[default]
    Sliding,
    /// The refresh expiry is fixed at login; rotations never extend it.
    Fixed,
}

impl std::str::FromStr for RefreshPolicy {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sliding" => Ok(Self::Sliding),
            "fixed" => Ok(Self::Fixed),
            other => Err(AuthError::ConfigurationError(format!(
                "unknown refresh policy \"{other}\", expected \"sliding\" or \"fixed\""
            ))),
        }
    }
}

/// Main configuration for the session lifecycle.
#[derive(Debug, Clone)]
pub struct WardenConfig {
    /// Lifetime of access tokens.
    ///
    /// Default: 15 minutes
    pub access_token_ttl: Duration,

    /// Lifetime of refresh tokens (and of the session's refresh window).
    ///
    /// Default: 7 days
    pub refresh_token_ttl: Duration,

    /// Lease held while a refresh is in flight. A crashed holder blocks
    /// refreshes of its session for at most this long.
    ///
    /// Default: 10 seconds
    pub refresh_lease_ttl: Duration,

    /// How often the expiry sweeper runs.
    ///
    /// Default: 1 hour
    pub sweep_interval: Duration,

    /// Default: [`RefreshPolicy::Sliding`]
    pub refresh_policy: RefreshPolicy,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            refresh_lease_ttl: Duration::seconds(10),
            sweep_interval: Duration::hours(1),
            refresh_policy: RefreshPolicy::Sliding,
        }
    }
}

impl WardenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Long-lived tokens and a frequent sweep, for local development.
    pub fn development() -> Self {
        Self {
            access_token_ttl: Duration::hours(24),
            refresh_token_ttl: Duration::days(30),
            refresh_lease_ttl: Duration::seconds(30),
            sweep_interval: Duration::minutes(5),
            refresh_policy: RefreshPolicy::Sliding,
        }
    }

    /// Short access tokens and a refresh window that never slides.
    pub fn strict() -> Self {
        Self {
            access_token_ttl: Duration::minutes(5),
            refresh_token_ttl: Duration::hours(12),
            refresh_lease_ttl: Duration::seconds(5),
            sweep_interval: Duration::minutes(15),
            refresh_policy: RefreshPolicy::Fixed,
        }
    }

    /// Builds a configuration from `WARDEN_*` environment variables.
    ///
    /// | Env Var | Default |
    /// |---------|---------|
    /// | `WARDEN_ACCESS_TOKEN_TTL_SECS` | `900` |
    /// | `WARDEN_REFRESH_TOKEN_TTL_SECS` | `604800` |
    /// | `WARDEN_REFRESH_LEASE_TTL_SECS` | `10` |
    /// | `WARDEN_SWEEP_INTERVAL_SECS` | `3600` |
    /// | `WARDEN_REFRESH_POLICY` | `sliding` |
    ///
    /// # Errors
    ///
    /// `AuthError::ConfigurationError` if a variable is set but malformed, or
    /// the resulting configuration fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let defaults = Self::default();

        let secs = |key: &str, fallback: Duration| -> Result<Duration, AuthError> {
            match lookup(key) {
                None => Ok(fallback),
                Some(raw) => raw
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(Duration::try_seconds)
                    .ok_or_else(|| {
                        AuthError::ConfigurationError(format!(
                            "{key} must be an integer number of seconds, got \"{raw}\""
                        ))
                    }),
            }
        };

        let config = Self {
            access_token_ttl: secs("WARDEN_ACCESS_TOKEN_TTL_SECS", defaults.access_token_ttl)?,
            refresh_token_ttl: secs("WARDEN_REFRESH_TOKEN_TTL_SECS", defaults.refresh_token_ttl)?,
            refresh_lease_ttl: secs("WARDEN_REFRESH_LEASE_TTL_SECS", defaults.refresh_lease_ttl)?,
            sweep_interval: secs("WARDEN_SWEEP_INTERVAL_SECS", defaults.sweep_interval)?,
            refresh_policy: lookup("WARDEN_REFRESH_POLICY")
                .map(|raw| raw.parse::<RefreshPolicy>())
                .transpose()?
                .unwrap_or(defaults.refresh_policy),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks that all durations are positive and at most [`MAX_DURATION`],
    /// and that access tokens never outlive the refresh window.
    pub fn validate(&self) -> Result<(), AuthError> {
        let positive = [
            ("access_token_ttl", self.access_token_ttl),
            ("refresh_token_ttl", self.refresh_token_ttl),
            ("refresh_lease_ttl", self.refresh_lease_ttl),
            ("sweep_interval", self.sweep_interval),
        ];
        for (name, value) in positive {
            if value <= Duration::zero() {
                return Err(AuthError::ConfigurationError(format!(
                    "{name} must be positive"
                )));
            }
            if value > MAX_DURATION {
                return Err(AuthError::ConfigurationError(format!(
                    "{name} must not exceed {} days",
                    MAX_DURATION.num_days()
                )));
            }
        }

        if self.access_token_ttl > self.refresh_token_ttl {
            return Err(AuthError::ConfigurationError(
                "access_token_ttl must not exceed refresh_token_ttl".to_owned(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = WardenConfig::default();

        assert_eq!(config.access_token_ttl, Duration::minutes(15));
        assert_eq!(config.refresh_token_ttl, Duration::days(7));
        assert_eq!(config.refresh_lease_ttl, Duration::seconds(10));
        assert_eq!(config.sweep_interval, Duration::hours(1));
        assert_eq!(config.refresh_policy, RefreshPolicy::Sliding);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_validate() {
        assert!(WardenConfig::development().validate().is_ok());

        let strict = WardenConfig::strict();
        assert!(strict.validate().is_ok());
        assert_eq!(strict.refresh_policy, RefreshPolicy::Fixed);
    }

    #[test]
    fn test_access_longer_than_refresh_rejected() {
        let config = WardenConfig {
            access_token_ttl: Duration::days(8),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AuthError::ConfigurationError(ref msg)) if msg.contains("access_token_ttl")
        ));
    }

    #[test]
    fn test_non_positive_lease_rejected() {
        let config = WardenConfig {
            refresh_lease_ttl: Duration::zero(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = WardenConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.access_token_ttl, Duration::minutes(15));
        assert_eq!(config.refresh_policy, RefreshPolicy::Sliding);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = WardenConfig::from_lookup(lookup_from(&[
            ("WARDEN_ACCESS_TOKEN_TTL_SECS", "60"),
            ("WARDEN_REFRESH_TOKEN_TTL_SECS", "3600"),
            ("WARDEN_REFRESH_POLICY", "Fixed"),
        ]))
        .unwrap();

        assert_eq!(config.access_token_ttl, Duration::seconds(60));
        assert_eq!(config.refresh_token_ttl, Duration::hours(1));
        assert_eq!(config.refresh_policy, RefreshPolicy::Fixed);
    }

    #[test]
    fn test_from_lookup_out_of_range() {
        let result = WardenConfig::from_lookup(lookup_from(&[(
            "WARDEN_ACCESS_TOKEN_TTL_SECS",
            "9223372036854775807",
        )]));
        assert!(matches!(
            result,
            Err(AuthError::ConfigurationError(ref msg)) if msg.contains("WARDEN_ACCESS_TOKEN_TTL_SECS")
        ));

        let result = WardenConfig::from_lookup(lookup_from(&[(
            "WARDEN_REFRESH_TOKEN_TTL_SECS",
            "9000000000000",
        )]));
        assert!(matches!(
            result,
            Err(AuthError::ConfigurationError(ref msg)) if msg.contains("refresh_token_ttl")
        ));
    }

    #[test]
    fn test_duration_ceiling() {
        let config = WardenConfig {
            refresh_token_ttl: MAX_DURATION + Duration::seconds(1),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WardenConfig {
            refresh_token_ttl: MAX_DURATION,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expires_after_overflow() {
        let now = Utc::now();
        assert_eq!(
            expires_after(now, Duration::minutes(1)).unwrap(),
            now + Duration::minutes(1)
        );
        assert!(matches!(
            expires_after(now, Duration::MAX),
            Err(AuthError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_from_lookup_malformed() {
        let result = WardenConfig::from_lookup(lookup_from(&[(
            "WARDEN_SWEEP_INTERVAL_SECS",
            "hourly",
        )]));
        assert!(matches!(
            result,
            Err(AuthError::ConfigurationError(ref msg)) if msg.contains("WARDEN_SWEEP_INTERVAL_SECS")
        ));

        let result = WardenConfig::from_lookup(lookup_from(&[("WARDEN_REFRESH_POLICY", "never")]));
        assert!(result.is_err());
    }
}
