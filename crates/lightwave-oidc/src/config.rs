//! Protocol engine configuration.
//!
//! [`OidcConfig`] holds process-wide settings for the engine (public endpoint,
//! store lifetimes, cookie naming). [`TokenPolicy`] is the per-tenant policy
//! read from the identity configuration for every request.
//!
//! # Example (TOML)
//!
//! ```toml
//! [oidc]
//! public_endpoint = "sts.example.com"
//! authorization_code_lifetime = "60s"
//! session_lifetime = "8h"
//! reaper_interval = "30s"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OidcConfig {
    /// Host (and optional port) under which tenants are published.
    /// Issuers are built as `https://{public_endpoint}/{tenant}`.
    pub public_endpoint: String,

    /// How long an authorization code may wait before being redeemed.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Upper bound on session age enforced by the store sweep.
    #[serde(with = "humantime_serde")]
    pub session_lifetime: Duration,

    /// Interval between reaper sweeps.
    #[serde(with = "humantime_serde")]
    pub reaper_interval: Duration,

    /// Prefix for the per-tenant session cookie name.
    pub cookie_prefix: String,

    /// Mark session cookies `Secure`.
    pub secure_cookies: bool,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            public_endpoint: "localhost".to_string(),
            authorization_code_lifetime: Duration::from_secs(60),
            session_lifetime: Duration::from_secs(8 * 3600),
            reaper_interval: Duration::from_secs(30),
            cookie_prefix: "lightwave_sts_session".to_string(),
            secure_cookies: true,
        }
    }
}

impl OidcConfig {
    /// Sets the public endpoint.
    #[must_use]
    pub fn with_public_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.public_endpoint = endpoint.into();
        self
    }

    /// Sets the authorization code lifetime.
    #[must_use]
    pub fn with_code_lifetime(mut self, lifetime: Duration) -> Self {
        self.authorization_code_lifetime = lifetime;
        self
    }

    /// Sets the store-level session lifetime.
    #[must_use]
    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    /// Issuer URL of `tenant`.
    #[must_use]
    pub fn issuer_for(&self, tenant: &str) -> String {
        format!("https://{}/{tenant}", self.public_endpoint)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the public endpoint is missing, contains a
    /// scheme or path, or a lifetime is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.public_endpoint.is_empty() {
            return Err(ConfigError::Missing("oidc.public_endpoint".to_string()));
        }
        if self.public_endpoint.contains("://") || self.public_endpoint.contains('/') {
            return Err(ConfigError::InvalidValue(format!(
                "oidc.public_endpoint must be host[:port], got '{}'",
                self.public_endpoint
            )));
        }
        if self.authorization_code_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "oidc.authorization_code_lifetime must be > 0".to_string(),
            ));
        }
        if self.session_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "oidc.session_lifetime must be > 0".to_string(),
            ));
        }
        if self.reaper_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "oidc.reaper_interval must be > 0".to_string(),
            ));
        }
        if self.cookie_prefix.is_empty()
            || !self
                .cookie_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::InvalidValue(format!(
                "oidc.cookie_prefix '{}' is not a valid cookie name",
                self.cookie_prefix
            )));
        }
        Ok(())
    }
}

/// Per-tenant token policy.
///
/// Read from the identity configuration on every request and treated as
/// immutable for the lifetime of that request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenPolicy {
    #[serde(with = "humantime_serde")]
    pub max_bearer_token_lifetime: Duration,

    #[serde(with = "humantime_serde")]
    pub max_hok_token_lifetime: Duration,

    #[serde(with = "humantime_serde")]
    pub max_bearer_refresh_token_lifetime: Duration,

    #[serde(with = "humantime_serde")]
    pub max_hok_refresh_token_lifetime: Duration,

    /// Sessions older than this are treated as absent.
    #[serde(with = "humantime_serde")]
    pub session_lifetime: Duration,

    /// Allowed clock skew when checking token time claims.
    #[serde(with = "humantime_serde")]
    pub clock_tolerance: Duration,

    pub delegation_count: u32,
    pub renew_count: u32,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            max_bearer_token_lifetime: Duration::from_secs(3600),
            max_hok_token_lifetime: Duration::from_secs(3600),
            max_bearer_refresh_token_lifetime: Duration::from_secs(6 * 3600),
            max_hok_refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600),
            session_lifetime: Duration::from_secs(8 * 3600),
            clock_tolerance: Duration::from_secs(600),
            delegation_count: 10,
            renew_count: 10,
        }
    }
}

impl TokenPolicy {
    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a token or session lifetime is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bearer_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "max_bearer_token_lifetime must be > 0".to_string(),
            ));
        }
        if self.max_hok_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "max_hok_token_lifetime must be > 0".to_string(),
            ));
        }
        if self.session_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "session_lifetime must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OidcConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.authorization_code_lifetime, Duration::from_secs(60));
        assert!(TokenPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_issuer_for_tenant() {
        let config = OidcConfig::default().with_public_endpoint("sts.example.com:8443");
        assert_eq!(config.issuer_for("acme"), "https://sts.example.com:8443/acme");
    }

    #[test]
    fn test_public_endpoint_with_scheme_rejected() {
        let config = OidcConfig::default().with_public_endpoint("https://sts.example.com");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_missing_public_endpoint() {
        let config = OidcConfig::default().with_public_endpoint("");
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::Missing("oidc.public_endpoint".to_string())
        );
    }

    #[test]
    fn test_zero_code_lifetime_rejected() {
        let config = OidcConfig::default().with_code_lifetime(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_deserializes_humantime() {
        let policy: TokenPolicy = serde_json::from_str(
            r#"{"max_bearer_token_lifetime":"30m","clock_tolerance":"5m","renew_count":3}"#,
        )
        .unwrap();
        assert_eq!(policy.max_bearer_token_lifetime, Duration::from_secs(1800));
        assert_eq!(policy.clock_tolerance, Duration::from_secs(300));
        assert_eq!(policy.renew_count, 3);
        assert_eq!(policy.session_lifetime, Duration::from_secs(8 * 3600));
    }
}
