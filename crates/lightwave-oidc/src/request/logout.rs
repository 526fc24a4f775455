use crate::error::OidcError;
use crate::token::TokenClaims;
use crate::types::ResponseMode;

use super::{Params, RedirectContext, RequestError, RequestValidator};

/// A validated logout (end-session) request.
#[derive(Debug, Clone, Default)]
pub struct LogoutRequest {
    /// Claims of the verified `id_token_hint`.
    pub id_token_hint: Option<TokenClaims>,
    /// Client the hint was issued to.
    pub client_id: Option<String>,
    pub post_logout_redirect_uri: Option<String>,
    pub state: Option<String>,
}

impl LogoutRequest {
    /// Parses a logout request.
    ///
    /// A `post_logout_redirect_uri` needs a client to validate against, so it
    /// is only accepted together with an `id_token_hint`.
    ///
    /// # Errors
    ///
    /// Hint verification failures, unregistered post-logout URIs, repeated
    /// parameters.
    pub async fn parse(
        tenant: &str,
        query: &Params,
        validator: &dyn RequestValidator,
    ) -> Result<Self, RequestError> {
        let state = query.get("state")?;

        let id_token_hint = match query.get("id_token_hint")? {
            Some(hint) => Some(validator.validate_id_token_hint(tenant, hint).await?),
            None => None,
        };
        let client_id = id_token_hint
            .as_ref()
            .and_then(TokenClaims::client_id)
            .map(str::to_string);

        let post_logout_redirect_uri = match (query.get("post_logout_redirect_uri")?, &client_id) {
            (Some(uri), Some(client_id)) => Some(
                validator
                    .validate_post_logout_uri(tenant, client_id, Some(uri))
                    .await?,
            ),
            (Some(_), None) => {
                return Err(OidcError::invalid_request(
                    "post_logout_redirect_uri requires id_token_hint",
                )
                .into());
            }
            (None, _) => None,
        };

        Ok(Self {
            id_token_hint,
            client_id,
            post_logout_redirect_uri,
            state: state.map(str::to_string),
        })
    }

    /// Session named by the hint's `sid` claim.
    #[must_use]
    pub fn hinted_session(&self) -> Option<&str> {
        self.id_token_hint.as_ref()?.sid.as_deref()
    }

    /// Redirect target for errors, once a post-logout URI is validated.
    #[must_use]
    pub fn redirect_context(&self) -> Option<RedirectContext> {
        self.post_logout_redirect_uri
            .as_ref()
            .map(|uri| RedirectContext {
                redirect_uri: uri.clone(),
                state: self.state.clone(),
                response_mode: ResponseMode::Query,
                login_form_post: false,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::OidcErrorCode;
    use crate::request::ClientValidator;
    use crate::testing::{MockDirectory, TENANT};
    use crate::token::{IssueRequest, TokenIssuer};
    use crate::types::{ScopeSet, SessionId, UserId};

    async fn id_token(issuer: &TokenIssuer) -> String {
        let scope = ScopeSet::parse("openid").unwrap();
        let user = UserId::new("alice@acme.local");
        let sid = SessionId::new("sid-7");
        issuer
            .issue_tokens(IssueRequest {
                tenant: TENANT,
                client_id: "app1",
                response_types: None,
                scope: &scope,
                nonce: None,
                user: &user,
                code: None,
                session_id: Some(&sid),
            })
            .await
            .unwrap()
            .id_token
            .unwrap()
    }

    fn setup() -> (TokenIssuer, ClientValidator) {
        let dir = Arc::new(MockDirectory::new());
        let issuer = TokenIssuer::new(dir.clone(), dir.clone());
        (issuer.clone(), ClientValidator::new(dir, issuer))
    }

    #[tokio::test]
    async fn test_logout_with_hint_and_redirect() {
        let (issuer, validator) = setup();
        let hint = id_token(&issuer).await;
        let query = Params::from_iter([
            ("id_token_hint", hint.as_str()),
            ("post_logout_redirect_uri", "https://app/bye"),
            ("state", "s1"),
        ]);

        let req = LogoutRequest::parse(TENANT, &query, &validator).await.unwrap();
        assert_eq!(req.client_id.as_deref(), Some("app1"));
        assert_eq!(req.hinted_session(), Some("sid-7"));
        let ctx = req.redirect_context().unwrap();
        assert_eq!(ctx.redirect_uri, "https://app/bye");
        assert_eq!(ctx.state.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn test_logout_without_parameters() {
        let (_, validator) = setup();
        let req = LogoutRequest::parse(TENANT, &Params::default(), &validator)
            .await
            .unwrap();
        assert!(req.id_token_hint.is_none());
        assert!(req.redirect_context().is_none());
    }

    #[tokio::test]
    async fn test_redirect_without_hint_rejected() {
        let (_, validator) = setup();
        let query = Params::parse("post_logout_redirect_uri=https%3A%2F%2Fapp%2Fbye");
        let err = LogoutRequest::parse(TENANT, &query, &validator).await.unwrap_err();
        assert_eq!(err.error.error_code(), OidcErrorCode::InvalidRequest);
        assert!(err.redirect.is_none());
    }

    #[tokio::test]
    async fn test_unregistered_post_logout_uri() {
        let (issuer, validator) = setup();
        let hint = id_token(&issuer).await;
        let query = Params::from_iter([
            ("id_token_hint", hint.as_str()),
            ("post_logout_redirect_uri", "https://evil/bye"),
        ]);
        let err = LogoutRequest::parse(TENANT, &query, &validator).await.unwrap_err();
        assert_eq!(err.error.error_code(), OidcErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_bad_hint_rejected() {
        let (_, validator) = setup();
        let err = LogoutRequest::parse(TENANT, &Params::parse("id_token_hint=x.y.z"), &validator)
            .await
            .unwrap_err();
        assert!(matches!(err.error, OidcError::TokenFormat { .. }));
    }
}
