use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OidcError;
use crate::identity::{IdentityConfig, OidcClient};
use crate::token::{TokenClaims, TokenIssuer};

use super::{RequestValidator, resolve_registered_uri};

/// [`RequestValidator`] backed by the tenant's client registrations and
/// signer certificates.
#[derive(Clone)]
pub struct ClientValidator {
    identity: Arc<dyn IdentityConfig>,
    issuer: TokenIssuer,
}

impl ClientValidator {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityConfig>, issuer: TokenIssuer) -> Self {
        Self { identity, issuer }
    }

    async fn client(&self, tenant: &str, client_id: &str) -> Result<OidcClient, OidcError> {
        self.identity
            .lookup_oidc_client(tenant, client_id)
            .await?
            .ok_or_else(|| OidcError::invalid_request(format!("Unknown client '{client_id}'")))
    }
}

#[async_trait]
impl RequestValidator for ClientValidator {
    async fn validate_client(&self, tenant: &str, client_id: &str) -> Result<(), OidcError> {
        self.client(tenant, client_id).await.map(|_| ())
    }

    async fn validate_redirect_uri(
        &self,
        tenant: &str,
        client_id: &str,
        redirect_uri: Option<&str>,
    ) -> Result<String, OidcError> {
        let client = self.client(tenant, client_id).await?;
        resolve_registered_uri(&client.redirect_uris, redirect_uri, "redirect_uri")
    }

    async fn validate_post_logout_uri(
        &self,
        tenant: &str,
        client_id: &str,
        uri: Option<&str>,
    ) -> Result<String, OidcError> {
        let client = self.client(tenant, client_id).await?;
        resolve_registered_uri(
            &client.post_logout_redirect_uris,
            uri,
            "post_logout_redirect_uri",
        )
    }

    async fn validate_id_token_hint(
        &self,
        tenant: &str,
        token: &str,
    ) -> Result<TokenClaims, OidcError> {
        // Expired hints are acceptable for logout and re-authentication.
        self.issuer.validate_token(tenant, token, false).await
    }
}
