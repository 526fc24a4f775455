use crate::error::OidcError;
use crate::types::{ClientInfo, ScopeSet};

use super::{Grant, Params, RequestValidator};

/// A validated token-endpoint request.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub client: ClientInfo,
    pub scope: ScopeSet,
    pub grant: Grant,
}

impl TokenRequest {
    /// Parses a token request from its form body.
    ///
    /// Every grant requires a registered `client_id`. The
    /// `authorization_code` grant also requires an explicit, registered
    /// `redirect_uri` and must not carry `scope`.
    ///
    /// # Errors
    ///
    /// `invalid_request`, `unsupported_grant_type`, or `invalid_scope`.
    pub async fn parse(
        tenant: &str,
        form: &Params,
        validator: &dyn RequestValidator,
    ) -> Result<Self, OidcError> {
        let grant = Grant::parse(form)?;
        let client_id = form.require("client_id")?;

        let (redirect_uri, scope) = match &grant {
            Grant::AuthorizationCode { .. } => {
                let requested = form.require("redirect_uri")?;
                let redirect_uri = validator
                    .validate_redirect_uri(tenant, client_id, Some(requested))
                    .await?;
                if form.get("scope")?.is_some() {
                    return Err(OidcError::invalid_request(
                        "scope must not be sent with the authorization_code grant",
                    ));
                }
                (Some(redirect_uri), ScopeSet::empty())
            }
            Grant::Password(_) | Grant::RefreshToken { .. } => {
                validator.validate_client(tenant, client_id).await?;
                let scope = form
                    .get("scope")?
                    .map(ScopeSet::parse)
                    .transpose()?
                    .unwrap_or_default();
                (None, scope)
            }
        };

        Ok(Self {
            client: ClientInfo::new(client_id, redirect_uri),
            scope,
            grant,
        })
    }
}
