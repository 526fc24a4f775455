//! Process configuration.
//!
//! Loaded from a TOML file and layered under `LIGHTWAVE_STS__*` environment
//! overrides (e.g. `LIGHTWAVE_STS__SERVER__PORT=9090`).
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8443
//!
//! [logging]
//! level = "info"
//!
//! [oidc]
//! public_endpoint = "sts.example.com"
//!
//! [[tenants]]
//! name = "acme"
//!
//! [tenants.signer]
//! serial_number = "0A01"
//! private_key_path = "keys/acme.pem"
//!
//! [[tenants.clients]]
//! client_id = "app1"
//! redirect_uris = ["https://app/cb"]
//!
//! [[tenants.users]]
//! username = "alice"
//! password_hash = "$argon2id$v=19$m=19456,t=2,p=1$..."
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use argon2::password_hash::PasswordHash;
use lightwave_oidc::{ConfigError, OidcConfig, TokenPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub oidc: OidcConfig,
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

impl StsConfig {
    pub fn addr(&self) -> SocketAddr {
        let ip: std::net::IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(ip, self.server.port)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// The first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.oidc.validate()?;

        let mut names = HashSet::new();
        for tenant in &self.tenants {
            tenant.validate()?;
            if !names.insert(tenant.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate tenant '{}'",
                    tenant.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Requests served concurrently before new ones wait.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8443
}
fn default_body_limit() -> usize {
    64 * 1024
}
fn default_max_concurrent_requests() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "server.host must be an IP address, got '{}'",
                self.host
            )));
        }
        if self.body_limit_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "server.body_limit_bytes must be > 0".to_string(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue(
                "server.max_concurrent_requests must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// A statically configured tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub name: String,
    pub signer: SignerConfig,
    #[serde(default)]
    pub policy: TokenPolicy,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl TenantConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(ConfigError::InvalidValue(format!(
                "tenant name '{}' is not a valid path segment",
                self.name
            )));
        }
        self.signer.validate(&self.name)?;
        self.policy.validate()?;

        let mut client_ids = HashSet::new();
        for client in &self.clients {
            client.validate(&self.name)?;
            if !client_ids.insert(client.client_id.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "tenant '{}': duplicate client '{}'",
                    self.name, client.client_id
                )));
            }
        }

        let mut usernames = HashSet::new();
        for user in &self.users {
            user.validate(&self.name)?;
            if !usernames.insert(user.username.to_ascii_lowercase()) {
                return Err(ConfigError::InvalidValue(format!(
                    "tenant '{}': duplicate user '{}'",
                    self.name, user.username
                )));
            }
        }
        Ok(())
    }
}

/// Tenant signing key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Certificate serial number, published as the JWS `kid`.
    pub serial_number: String,
    /// PEM file with the RSA private key (PKCS#8 or PKCS#1). A key is
    /// generated at start-up when absent.
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default = "default_key_bits")]
    pub generated_key_bits: usize,
}

fn default_key_bits() -> usize {
    2048
}

impl SignerConfig {
    fn validate(&self, tenant: &str) -> Result<(), ConfigError> {
        if self.serial_number.is_empty() {
            return Err(ConfigError::Missing(format!(
                "tenants.{tenant}.signer.serial_number"
            )));
        }
        if self.private_key_path.is_none() && self.generated_key_bits < 2048 {
            return Err(ConfigError::InvalidValue(format!(
                "tenant '{tenant}': generated_key_bits must be >= 2048"
            )));
        }
        Ok(())
    }
}

/// A registered OIDC client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub post_logout_redirect_uris: Vec<String>,
    /// Front-channel logout URI.
    #[serde(default)]
    pub logout_uri: Option<String>,
    #[serde(default)]
    pub cross_tenant: bool,
}

impl ClientConfig {
    fn validate(&self, tenant: &str) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::Missing(format!(
                "tenants.{tenant}.clients.client_id"
            )));
        }
        if self.redirect_uris.is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "tenant '{tenant}': client '{}' has no redirect_uris",
                self.client_id
            )));
        }
        Ok(())
    }
}

/// A directory user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserConfig {
    fn validate(&self, tenant: &str) -> Result<(), ConfigError> {
        if self.username.is_empty() {
            return Err(ConfigError::Missing(format!(
                "tenants.{tenant}.users.username"
            )));
        }
        if PasswordHash::new(&self.password_hash).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "tenant '{tenant}': user '{}' password_hash is not a PHC string",
                self.username
            )));
        }
        Ok(())
    }
}

/// Errors raised while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),

    #[error("config validation error: {0}")]
    Invalid(#[from] ConfigError),
}

pub mod loader {
    use super::{LoadError, StsConfig};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "lightwave-sts.toml";

    pub fn load_config(path: Option<&str>) -> Result<StsConfig, LoadError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment overrides, e.g. LIGHTWAVE_STS__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("LIGHTWAVE_STS")
                .try_parsing(true)
                .separator("__"),
        );
        let merged: StsConfig = builder.build()?.try_deserialize()?;
        merged.validate()?;
        Ok(merged)
    }
}
