//! File-configured identity directory.
//!
//! Serves tenant configuration and password authentication from the
//! `[[tenants]]` tables of the process configuration. Everything is resolved
//! once at start-up; signing keys are read from disk or generated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordVerifier};
use async_trait::async_trait;
use lightwave_oidc::{
    Authenticator, Credentials, IdentityConfig, IdentityError, OidcClient, OidcConfig,
    SignerCertificate, SignerKey, TokenPolicy, UserAttribute, UserAttributes, UserId,
};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};

use crate::config::{SignerConfig, StsConfig, TenantConfig, UserConfig};

/// Errors raised while building the directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to read signing key {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tenant '{tenant}': invalid signing key: {reason}")]
    KeyParse { tenant: String, reason: String },

    #[error("tenant '{tenant}': key generation failed: {reason}")]
    KeyGeneration { tenant: String, reason: String },
}

struct DirectoryUser {
    id: UserId,
    password_hash: String,
    display_name: Option<String>,
    groups: Vec<String>,
}

struct DirectoryTenant {
    issuer: String,
    signer_key: SignerKey,
    signer_cert: SignerCertificate,
    policy: TokenPolicy,
    clients: HashMap<String, OidcClient>,
    /// Keyed by lowercase username.
    users: HashMap<String, DirectoryUser>,
}

impl DirectoryTenant {
    fn user_by_id(&self, id: &UserId) -> Option<&DirectoryUser> {
        self.users.values().find(|user| &user.id == id)
    }
}

/// [`IdentityConfig`] and [`Authenticator`] over statically configured
/// tenants.
pub struct StaticDirectory {
    tenants: HashMap<String, DirectoryTenant>,
}

impl StaticDirectory {
    /// Builds the directory from a validated configuration.
    ///
    /// # Errors
    ///
    /// A signing key file cannot be read or parsed, or key generation fails.
    pub fn from_config(cfg: &StsConfig) -> Result<Self, DirectoryError> {
        let mut tenants = HashMap::with_capacity(cfg.tenants.len());
        for tenant in &cfg.tenants {
            tenants.insert(tenant.name.clone(), build_tenant(&cfg.oidc, tenant)?);
            tracing::info!(
                tenant = %tenant.name,
                clients = tenant.clients.len(),
                users = tenant.users.len(),
                "Tenant loaded"
            );
        }
        Ok(Self { tenants })
    }

    pub fn tenant_names(&self) -> impl Iterator<Item = &str> {
        self.tenants.keys().map(String::as_str)
    }

    fn tenant(&self, name: &str) -> Result<&DirectoryTenant, IdentityError> {
        self.tenants
            .get(name)
            .ok_or_else(|| IdentityError::NotFound(format!("tenant {name}")))
    }
}

fn build_tenant(oidc: &OidcConfig, tenant: &TenantConfig) -> Result<DirectoryTenant, DirectoryError> {
    let (signer_key, signer_cert) = load_signer(&tenant.name, &tenant.signer)?;

    let clients = tenant
        .clients
        .iter()
        .map(|client| {
            (
                client.client_id.clone(),
                OidcClient {
                    client_id: client.client_id.clone(),
                    redirect_uris: client.redirect_uris.clone(),
                    post_logout_redirect_uris: client.post_logout_redirect_uris.clone(),
                    logout_uri: client.logout_uri.clone(),
                    cross_tenant: client.cross_tenant,
                },
            )
        })
        .collect();

    let users = tenant
        .users
        .iter()
        .map(|user| (user.username.to_ascii_lowercase(), directory_user(&tenant.name, user)))
        .collect();

    Ok(DirectoryTenant {
        issuer: oidc.issuer_for(&tenant.name),
        signer_key,
        signer_cert,
        policy: tenant.policy.clone(),
        clients,
        users,
    })
}

fn directory_user(tenant: &str, user: &UserConfig) -> DirectoryUser {
    DirectoryUser {
        id: UserId::new(format!("{}@{tenant}", user.username.to_ascii_lowercase())),
        password_hash: user.password_hash.clone(),
        display_name: user.display_name.clone(),
        groups: user.groups.clone(),
    }
}

fn load_signer(
    tenant: &str,
    signer: &SignerConfig,
) -> Result<(SignerKey, SignerCertificate), DirectoryError> {
    let private = match &signer.private_key_path {
        Some(path) => read_private_key(tenant, path)?,
        None => {
            tracing::warn!(
                tenant,
                bits = signer.generated_key_bits,
                "No signing key configured, generating one"
            );
            RsaPrivateKey::new(&mut OsRng, signer.generated_key_bits).map_err(|e| {
                DirectoryError::KeyGeneration {
                    tenant: tenant.to_string(),
                    reason: e.to_string(),
                }
            })?
        }
    };

    let encoding = |e: &dyn std::fmt::Display| DirectoryError::KeyParse {
        tenant: tenant.to_string(),
        reason: e.to_string(),
    };
    let private_key_pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| encoding(&e))?
        .as_str()
        .to_string();
    let public_key_pem = private
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| encoding(&e))?;

    Ok((
        SignerKey { private_key_pem },
        SignerCertificate {
            serial_number: signer.serial_number.clone(),
            public_key_pem,
        },
    ))
}

fn read_private_key(tenant: &str, path: &Path) -> Result<RsaPrivateKey, DirectoryError> {
    let pem = std::fs::read_to_string(path).map_err(|source| DirectoryError::KeyFile {
        path: path.to_path_buf(),
        source,
    })?;
    RsaPrivateKey::from_pkcs8_pem(&pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
        .map_err(|e| DirectoryError::KeyParse {
            tenant: tenant.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl IdentityConfig for StaticDirectory {
    async fn issuer(&self, tenant: &str) -> Result<String, IdentityError> {
        Ok(self.tenant(tenant)?.issuer.clone())
    }

    async fn signer_key(&self, tenant: &str) -> Result<SignerKey, IdentityError> {
        Ok(self.tenant(tenant)?.signer_key.clone())
    }

    async fn signer_cert(&self, tenant: &str) -> Result<SignerCertificate, IdentityError> {
        Ok(self.tenant(tenant)?.signer_cert.clone())
    }

    async fn signer_certs(&self, tenant: &str) -> Result<Vec<SignerCertificate>, IdentityError> {
        Ok(vec![self.tenant(tenant)?.signer_cert.clone()])
    }

    async fn token_policy(&self, tenant: &str) -> Result<TokenPolicy, IdentityError> {
        Ok(self.tenant(tenant)?.policy.clone())
    }

    async fn lookup_oidc_client(
        &self,
        tenant: &str,
        client_id: &str,
    ) -> Result<Option<OidcClient>, IdentityError> {
        Ok(self.tenant(tenant)?.clients.get(client_id).cloned())
    }

    // Static configuration has nothing to refresh.
    async fn refresh(&self, tenant: &str) -> Result<(), IdentityError> {
        self.tenant(tenant).map(|_| ())
    }
}

#[async_trait]
impl Authenticator for StaticDirectory {
    async fn authenticate(
        &self,
        tenant: &str,
        credentials: &Credentials,
    ) -> Result<UserId, IdentityError> {
        let user = self
            .tenant(tenant)?
            .users
            .get(&credentials.username.to_ascii_lowercase())
            .ok_or(IdentityError::InvalidCredentials)?;

        let hash = user.password_hash.clone();
        let password = credentials.password.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| IdentityError::Internal(e.to_string()))??;

        if verified {
            Ok(user.id.clone())
        } else {
            Err(IdentityError::InvalidCredentials)
        }
    }

    async fn user_attributes(
        &self,
        tenant: &str,
        user: &UserId,
        attributes: &[UserAttribute],
    ) -> Result<UserAttributes, IdentityError> {
        let entry = self
            .tenant(tenant)?
            .user_by_id(user)
            .ok_or_else(|| IdentityError::NotFound(format!("user {user}")))?;

        let mut values = UserAttributes::default();
        for attribute in attributes {
            match attribute {
                UserAttribute::Subject => values.subject = Some(entry.id.to_string()),
                UserAttribute::DisplayName => values.display_name = entry.display_name.clone(),
                UserAttribute::Groups => values.groups = entry.groups.clone(),
            }
        }
        Ok(values)
    }
}

fn verify_password(password: &str, hash: &str) -> Result<bool, IdentityError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| IdentityError::InvalidConfiguration(format!("password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
