//! Typed, validated OIDC requests.
//!
//! Parsers turn raw form/query parameters into [`AuthzRequest`],
//! [`TokenRequest`] and [`LogoutRequest`]. Every rule is checked here, so the
//! processor only ever sees well-formed requests. Client-specific checks
//! (registered redirect URIs, ID token hints) go through a
//! [`RequestValidator`].

mod authz;
mod logout;
mod params;
mod token;
mod validator;

pub use authz::AuthzRequest;
pub use logout::LogoutRequest;
pub use params::Params;
pub use token::TokenRequest;
pub use validator::ClientValidator;

use async_trait::async_trait;

use crate::error::{OidcError, OidcErrorCode};
use crate::identity::Credentials;
use crate::token::TokenClaims;
use crate::types::{GrantType, ResponseMode};

/// An authorization grant presented by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    Password(Credentials),
    AuthorizationCode { code: String },
    RefreshToken { token: String },
}

impl Grant {
    #[must_use]
    pub fn grant_type(&self) -> GrantType {
        match self {
            Self::Password(_) => GrantType::Password,
            Self::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Self::RefreshToken { .. } => GrantType::RefreshToken,
        }
    }

    /// Parses the grant of a token-endpoint request.
    ///
    /// # Errors
    ///
    /// `invalid_request` for missing fields, `unsupported_grant_type` for
    /// unknown grant types.
    pub fn parse(params: &Params) -> Result<Self, OidcError> {
        let grant_type: GrantType = params.require("grant_type")?.parse()?;
        Ok(match grant_type {
            GrantType::Password => Self::Password(Credentials {
                username: params.require("username")?.to_string(),
                password: params.require("password")?.to_string(),
            }),
            GrantType::AuthorizationCode => Self::AuthorizationCode {
                code: params.require("code")?.to_string(),
            },
            GrantType::RefreshToken => Self::RefreshToken {
                token: params.require("refresh_token")?.to_string(),
            },
        })
    }

    /// Parses the credentials posted by the login form. Only the password
    /// grant is accepted; a form without `grant_type` yields `None`.
    ///
    /// # Errors
    ///
    /// `invalid_grant` for any other grant or incomplete credentials.
    pub fn parse_login(form: &Params) -> Result<Option<Self>, OidcError> {
        if form
            .get("grant_type")
            .map_err(|e| OidcError::invalid_grant(e.description()))?
            .is_none()
        {
            return Ok(None);
        }
        match Self::parse(form) {
            Ok(grant @ Self::Password(_)) => Ok(Some(grant)),
            Ok(_) => Err(OidcError::invalid_grant("Unsupported authentication method")),
            Err(e) if e.error_code() == OidcErrorCode::UnsupportedGrantType => {
                Err(OidcError::invalid_grant("Unsupported authentication method"))
            }
            Err(_) => Err(OidcError::invalid_grant("Invalid user name or password")),
        }
    }
}

/// Client-specific checks the parsers depend on.
#[async_trait]
pub trait RequestValidator: Send + Sync {
    /// Checks that `client_id` is registered with the tenant.
    async fn validate_client(&self, tenant: &str, client_id: &str) -> Result<(), OidcError>;

    /// Resolves the redirect URI for `client_id`.
    ///
    /// When `redirect_uri` is omitted and the client registered exactly one
    /// URI, that URI is used. Otherwise it must equal a registered URI.
    async fn validate_redirect_uri(
        &self,
        tenant: &str,
        client_id: &str,
        redirect_uri: Option<&str>,
    ) -> Result<String, OidcError>;

    /// Same as [`validate_redirect_uri`](Self::validate_redirect_uri), against
    /// the client's post-logout redirect URIs.
    async fn validate_post_logout_uri(
        &self,
        tenant: &str,
        client_id: &str,
        uri: Option<&str>,
    ) -> Result<String, OidcError>;

    /// Verifies an `id_token_hint` issued by this tenant.
    async fn validate_id_token_hint(
        &self,
        tenant: &str,
        token: &str,
    ) -> Result<TokenClaims, OidcError>;
}

/// Picks the URI a request will redirect to from a client's registered set.
///
/// # Errors
///
/// `invalid_request` if `requested` is absent and the client does not have
/// exactly one registered URI, or if `requested` is not registered.
pub fn resolve_registered_uri(
    registered: &[String],
    requested: Option<&str>,
    parameter: &str,
) -> Result<String, OidcError> {
    match (requested, registered) {
        (None, [only]) => Ok(only.clone()),
        (None, _) => Err(OidcError::invalid_request(format!(
            "Missing required parameter '{parameter}'"
        ))),
        (Some(uri), _) if registered.iter().any(|r| r == uri) => Ok(uri.to_string()),
        (Some(_), _) => Err(OidcError::invalid_request(format!(
            "Unregistered {parameter}"
        ))),
    }
}

/// Where and how an error may still be delivered to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectContext {
    pub redirect_uri: String,
    pub state: Option<String>,
    pub response_mode: ResponseMode,
    pub login_form_post: bool,
}

/// A parse failure, carrying the redirect context once it is known.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}")]
pub struct RequestError {
    pub error: OidcError,
    pub redirect: Option<RedirectContext>,
}

impl RequestError {
    /// Failure before a redirect URI was validated; reported as JSON.
    #[must_use]
    pub fn direct(error: OidcError) -> Self {
        Self {
            error,
            redirect: None,
        }
    }
}

impl From<OidcError> for RequestError {
    fn from(error: OidcError) -> Self {
        Self::direct(error)
    }
}
