//! In-memory identity collaborators shared by unit tests.

use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

use crate::config::TokenPolicy;
use crate::identity::{
    Authenticator, Credentials, IdentityConfig, IdentityError, OidcClient, SignerCertificate,
    SignerKey, UserAttribute, UserAttributes,
};
use crate::types::UserId;

pub const TENANT: &str = "acme";
pub const ISSUER: &str = "https://sts.example.com/acme";
pub const ALICE: &str = "alice@acme.local";

struct TestKey {
    serial: &'static str,
    private_pem: String,
    public_pem: String,
}

// RSA key generation is slow in debug builds; share two keys across tests.
fn keys() -> &'static [TestKey; 2] {
    static KEYS: OnceLock<[TestKey; 2]> = OnceLock::new();
    KEYS.get_or_init(|| [generate("0A01"), generate("0A02")])
}

fn generate(serial: &'static str) -> TestKey {
    let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    TestKey {
        serial,
        private_pem: private.to_pkcs8_pem(LineEnding::LF).unwrap().as_str().to_string(),
        public_pem: private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap(),
    }
}

struct SignerState {
    active: usize,
    registered: Vec<usize>,
}

/// Single-tenant directory with clients `app1`, `app2` and `multi`, and the
/// user `alice` / `secret`.
pub struct MockDirectory {
    signers: Mutex<SignerState>,
    policy: Mutex<TokenPolicy>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            signers: Mutex::new(SignerState {
                active: 0,
                registered: vec![0],
            }),
            policy: Mutex::new(TokenPolicy::default()),
        }
    }

    /// Replaces the tenant's token policy.
    pub fn set_policy(&self, policy: TokenPolicy) {
        *self.policy.lock().unwrap() = policy;
    }

    /// Serial of the active signer certificate.
    pub fn signer_serial(&self) -> &'static str {
        keys()[self.signers.lock().unwrap().active].serial
    }

    /// Switches to the second key, optionally keeping the first registered.
    pub fn rotate_signer(&self, keep_old: bool) {
        let mut state = self.signers.lock().unwrap();
        state.active = 1;
        state.registered = if keep_old { vec![1, 0] } else { vec![1] };
    }

    fn check_tenant(tenant: &str) -> Result<(), IdentityError> {
        if tenant == TENANT {
            Ok(())
        } else {
            Err(IdentityError::NotFound(format!("tenant {tenant}")))
        }
    }
}

#[async_trait]
impl IdentityConfig for MockDirectory {
    async fn issuer(&self, tenant: &str) -> Result<String, IdentityError> {
        Self::check_tenant(tenant)?;
        Ok(ISSUER.to_string())
    }

    async fn signer_key(&self, tenant: &str) -> Result<SignerKey, IdentityError> {
        Self::check_tenant(tenant)?;
        let active = self.signers.lock().unwrap().active;
        Ok(SignerKey {
            private_key_pem: keys()[active].private_pem.clone(),
        })
    }

    async fn signer_cert(&self, tenant: &str) -> Result<SignerCertificate, IdentityError> {
        Self::check_tenant(tenant)?;
        let active = self.signers.lock().unwrap().active;
        Ok(SignerCertificate {
            serial_number: keys()[active].serial.to_string(),
            public_key_pem: keys()[active].public_pem.clone(),
        })
    }

    async fn signer_certs(&self, tenant: &str) -> Result<Vec<SignerCertificate>, IdentityError> {
        Self::check_tenant(tenant)?;
        let registered = self.signers.lock().unwrap().registered.clone();
        Ok(registered
            .into_iter()
            .map(|i| SignerCertificate {
                serial_number: keys()[i].serial.to_string(),
                public_key_pem: keys()[i].public_pem.clone(),
            })
            .collect())
    }

    async fn token_policy(&self, tenant: &str) -> Result<TokenPolicy, IdentityError> {
        Self::check_tenant(tenant)?;
        Ok(self.policy.lock().unwrap().clone())
    }

    async fn lookup_oidc_client(
        &self,
        tenant: &str,
        client_id: &str,
    ) -> Result<Option<OidcClient>, IdentityError> {
        Self::check_tenant(tenant)?;
        let client = match client_id {
            "app1" => OidcClient {
                client_id: "app1".to_string(),
                redirect_uris: vec!["https://app/cb".to_string()],
                post_logout_redirect_uris: vec!["https://app/bye".to_string()],
                logout_uri: Some("https://app/logout".to_string()),
                cross_tenant: false,
            },
            "app2" => OidcClient {
                client_id: "app2".to_string(),
                redirect_uris: vec!["https://app2/cb".to_string()],
                post_logout_redirect_uris: Vec::new(),
                logout_uri: Some("https://app2/logout?x=1".to_string()),
                cross_tenant: false,
            },
            "multi" => OidcClient {
                client_id: "multi".to_string(),
                redirect_uris: vec![
                    "https://multi/a".to_string(),
                    "https://multi/b".to_string(),
                ],
                ..OidcClient::default()
            },
            _ => return Ok(None),
        };
        Ok(Some(client))
    }
}

#[async_trait]
impl Authenticator for MockDirectory {
    async fn authenticate(
        &self,
        tenant: &str,
        credentials: &Credentials,
    ) -> Result<UserId, IdentityError> {
        Self::check_tenant(tenant)?;
        if credentials.username == "alice" && credentials.password == "secret" {
            Ok(UserId::new(ALICE))
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
        Self::check_tenant(tenant)?;
        if user.as_str() != ALICE {
            return Err(IdentityError::NotFound(format!("user {user}")));
        }
        let mut values = UserAttributes::default();
        for attribute in attributes {
            match attribute {
                UserAttribute::Subject => values.subject = Some(ALICE.to_string()),
                UserAttribute::DisplayName => {
                    values.display_name = Some("Alice Example".to_string());
                }
                UserAttribute::Groups => values.groups = vec!["acme\\Users".to_string()],
            }
        }
        Ok(values)
    }
}

/// Validator over a fresh [`MockDirectory`].
pub fn client_validator() -> crate::request::ClientValidator {
    let dir = std::sync::Arc::new(MockDirectory::new());
    crate::request::ClientValidator::new(
        dir.clone(),
        crate::token::TokenIssuer::new(dir.clone(), dir),
    )
}
