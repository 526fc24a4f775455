//! Collaborator interfaces consumed by the protocol engine.
//!
//! The engine never talks to a directory itself. Tenant configuration
//! (issuer, signing material, token policy, client registrations) comes
//! through [`IdentityConfig`], and credential checks go through
//! [`Authenticator`].
//!
//! # Implementation Notes
//!
//! Implementations may block on network I/O. Results must not be cached
//! indefinitely; [`IdentityConfig::refresh`] is the explicit invalidation hook.
//! Implementations must never log passwords.

use async_trait::async_trait;

use crate::config::TokenPolicy;
use crate::error::OidcError;
use crate::types::UserId;

/// Errors reported by identity collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The tenant, client or user does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The presented credentials were rejected.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The backing directory could not be reached.
    #[error("Identity backend unavailable: {0}")]
    Unavailable(String),

    /// The tenant's stored configuration is unusable.
    #[error("Invalid identity configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Identity backend error: {0}")]
    Internal(String),
}

impl From<IdentityError> for OidcError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials => {
                OidcError::invalid_grant("Invalid user name or password")
            }
            IdentityError::NotFound(what) => {
                OidcError::invalid_request(format!("Not found: {what}"))
            }
            other => OidcError::server_error(other.to_string()),
        }
    }
}

/// A registered OIDC client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OidcClient {
    pub client_id: String,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    /// Front-channel logout URI.
    pub logout_uri: Option<String>,
    pub cross_tenant: bool,
}

/// Public half of a tenant signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerCertificate {
    /// Certificate serial number, published as the JWS `kid`.
    pub serial_number: String,
    /// SPKI PEM of the certificate's RSA public key.
    pub public_key_pem: String,
}

/// Private signing key of a tenant, PKCS#8 or PKCS#1 PEM.
#[derive(Clone)]
pub struct SignerKey {
    pub private_key_pem: String,
}

impl std::fmt::Debug for SignerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerKey").finish_non_exhaustive()
    }
}

/// Tenant configuration store.
#[async_trait]
pub trait IdentityConfig: Send + Sync {
    /// Returns the tenant's issuer URL.
    async fn issuer(&self, tenant: &str) -> Result<String, IdentityError>;

    /// Returns the private key tokens are signed with.
    async fn signer_key(&self, tenant: &str) -> Result<SignerKey, IdentityError>;

    /// Returns the certificate matching [`signer_key`](Self::signer_key).
    async fn signer_cert(&self, tenant: &str) -> Result<SignerCertificate, IdentityError>;

    /// Returns every certificate that may verify tokens of this tenant,
    /// including the active one.
    async fn signer_certs(&self, tenant: &str) -> Result<Vec<SignerCertificate>, IdentityError>;

    async fn token_policy(&self, tenant: &str) -> Result<TokenPolicy, IdentityError>;

    /// Looks up a client registration. `Ok(None)` if the client is unknown.
    async fn lookup_oidc_client(
        &self,
        tenant: &str,
        client_id: &str,
    ) -> Result<Option<OidcClient>, IdentityError>;

    /// Drops anything cached for the tenant.
    async fn refresh(&self, _tenant: &str) -> Result<(), IdentityError> {
        Ok(())
    }
}

/// Username/password credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// User attributes that token issuance may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserAttribute {
    Subject,
    DisplayName,
    Groups,
}

/// Values returned by [`Authenticator::user_attributes`]. Attributes that
/// were not requested stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAttributes {
    pub subject: Option<String>,
    pub display_name: Option<String>,
    pub groups: Vec<String>,
}

/// Credential validation against the tenant's directory.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validates credentials and returns the authenticated principal.
    ///
    /// # Errors
    ///
    /// `IdentityError::InvalidCredentials` if the user is unknown or the
    /// password is wrong.
    async fn authenticate(
        &self,
        tenant: &str,
        credentials: &Credentials,
    ) -> Result<UserId, IdentityError>;

    async fn user_attributes(
        &self,
        tenant: &str,
        user: &UserId,
        attributes: &[UserAttribute],
    ) -> Result<UserAttributes, IdentityError>;
}
