//! OAuth 2.0 / OpenID Connect error types.
//!
//! Every failure surfaced by the protocol engine is an [`OidcError`]. Each
//! variant maps onto exactly one wire-level [`OidcErrorCode`], which in turn
//! carries a fixed HTTP status. Internal failures (encoding, entropy, signing,
//! token parsing) keep their own variant for diagnostics but collapse to a
//! standard code on the wire.

use std::fmt;
use std::str::FromStr;

use axum::http::StatusCode;

/// Standard error codes defined by RFC 6749 and OpenID Connect Core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OidcErrorCode {
    InvalidRequest,
    UnauthorizedClient,
    AccessDenied,
    UnsupportedResponseType,
    InvalidScope,
    ServerError,
    TemporarilyUnavailable,
    InvalidClient,
    InvalidGrant,
    UnsupportedGrantType,
    InteractionRequired,
    LoginRequired,
}

impl OidcErrorCode {
    /// Returns the code as it appears in the `error` response parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InteractionRequired => "interaction_required",
            Self::LoginRequired => "login_required",
        }
    }

    /// Returns the HTTP status used when this error is delivered directly.
    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::UnauthorizedClient | Self::AccessDenied => StatusCode::UNAUTHORIZED,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::TemporarilyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRequest
            | Self::UnsupportedResponseType
            | Self::InvalidScope
            | Self::InvalidClient
            | Self::InvalidGrant
            | Self::UnsupportedGrantType
            | Self::InteractionRequired
            | Self::LoginRequired => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for OidcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OidcErrorCode {
    type Err = OidcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "invalid_request" => Self::InvalidRequest,
            "unauthorized_client" => Self::UnauthorizedClient,
            "access_denied" => Self::AccessDenied,
            "unsupported_response_type" => Self::UnsupportedResponseType,
            "invalid_scope" => Self::InvalidScope,
            "server_error" => Self::ServerError,
            "temporarily_unavailable" => Self::TemporarilyUnavailable,
            "invalid_client" => Self::InvalidClient,
            "invalid_grant" => Self::InvalidGrant,
            "unsupported_grant_type" => Self::UnsupportedGrantType,
            "interaction_required" => Self::InteractionRequired,
            "login_required" => Self::LoginRequired,
            other => {
                return Err(OidcError::invalid_request(format!(
                    "Unknown error code '{other}'"
                )));
            }
        })
    }
}

/// Errors produced while parsing or processing OIDC requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OidcError {
    /// The request is missing a parameter, repeats one, or is malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unauthorized client: {message}")]
    UnauthorizedClient { message: String },

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("Unsupported response type: {message}")]
    UnsupportedResponseType { message: String },

    #[error("Invalid scope: {message}")]
    InvalidScope { message: String },

    #[error("Server error: {message}")]
    ServerError { message: String },

    #[error("Temporarily unavailable: {message}")]
    TemporarilyUnavailable { message: String },

    #[error("Invalid client: {message}")]
    InvalidClient { message: String },

    /// Credentials, authorization code or session could not be used.
    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("Unsupported grant type: {message}")]
    UnsupportedGrantType { message: String },

    #[error("Interaction required: {message}")]
    InteractionRequired { message: String },

    /// `prompt=none` was requested but the user has no session.
    #[error("Login required: {message}")]
    LoginRequired { message: String },

    /// A response could not be serialized.
    #[error("Encode failure: {message}")]
    Encode { message: String },

    /// The entropy source failed while generating a code or session ID.
    #[error("Random generation failure: {message}")]
    RandomGeneration { message: String },

    /// A token could not be signed.
    #[error("Signature failure: {message}")]
    Signature { message: String },

    /// Writing the response body failed.
    #[error("Stream write failure: {message}")]
    StreamWrite { message: String },

    /// A presented token is structurally unusable.
    #[error("Token format error: {message}")]
    TokenFormat { message: String },

    /// No registered signer verifies a presented token.
    #[error("Signature validation failure: {message}")]
    SignatureValidation { message: String },
}

macro_rules! constructors {
    ($($fn_name:ident => $variant:ident),* $(,)?) => {
        impl OidcError {
            $(
                #[doc = concat!("Creates a new `", stringify!($variant), "` error.")]
                #[must_use]
                pub fn $fn_name(message: impl Into<String>) -> Self {
                    Self::$variant {
                        message: message.into(),
                    }
                }
            )*
        }
    };
}

constructors! {
    invalid_request => InvalidRequest,
    unauthorized_client => UnauthorizedClient,
    access_denied => AccessDenied,
    unsupported_response_type => UnsupportedResponseType,
    invalid_scope => InvalidScope,
    server_error => ServerError,
    temporarily_unavailable => TemporarilyUnavailable,
    invalid_client => InvalidClient,
    invalid_grant => InvalidGrant,
    unsupported_grant_type => UnsupportedGrantType,
    interaction_required => InteractionRequired,
    login_required => LoginRequired,
    encode => Encode,
    random_generation => RandomGeneration,
    signature => Signature,
    stream_write => StreamWrite,
    token_format => TokenFormat,
    signature_validation => SignatureValidation,
}

impl OidcError {
    /// Returns the wire-level error code for this error.
    #[must_use]
    pub fn error_code(&self) -> OidcErrorCode {
        match self {
            Self::InvalidRequest { .. } => OidcErrorCode::InvalidRequest,
            Self::UnauthorizedClient { .. } => OidcErrorCode::UnauthorizedClient,
            Self::AccessDenied { .. } => OidcErrorCode::AccessDenied,
            Self::UnsupportedResponseType { .. } => OidcErrorCode::UnsupportedResponseType,
            Self::InvalidScope { .. } => OidcErrorCode::InvalidScope,
            Self::ServerError { .. } => OidcErrorCode::ServerError,
            Self::TemporarilyUnavailable { .. } => OidcErrorCode::TemporarilyUnavailable,
            Self::InvalidClient { .. } => OidcErrorCode::InvalidClient,
            Self::InvalidGrant { .. } => OidcErrorCode::InvalidGrant,
            Self::UnsupportedGrantType { .. } => OidcErrorCode::UnsupportedGrantType,
            Self::InteractionRequired { .. } => OidcErrorCode::InteractionRequired,
            Self::LoginRequired { .. } => OidcErrorCode::LoginRequired,
            Self::TokenFormat { .. } | Self::SignatureValidation { .. } => {
                OidcErrorCode::InvalidRequest
            }
            Self::Encode { .. }
            | Self::RandomGeneration { .. }
            | Self::Signature { .. }
            | Self::StreamWrite { .. } => OidcErrorCode::ServerError,
        }
    }

    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        self.error_code().http_status()
    }

    /// Returns the diagnostic code, which distinguishes internal failures
    /// that share a wire code.
    #[must_use]
    pub fn diagnostic_code(&self) -> &'static str {
        match self {
            Self::Encode { .. } => "encode_error",
            Self::RandomGeneration { .. } => "random_generation_error",
            Self::Signature { .. } => "signature_error",
            Self::StreamWrite { .. } => "stream_write_error",
            Self::TokenFormat { .. } => "token_format_error",
            Self::SignatureValidation { .. } => "signature_validation_error",
            _ => self.error_code().as_str(),
        }
    }

    /// Returns the human-readable description sent as `error_description`.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::InvalidRequest { message }
            | Self::UnauthorizedClient { message }
            | Self::AccessDenied { message }
            | Self::UnsupportedResponseType { message }
            | Self::InvalidScope { message }
            | Self::ServerError { message }
            | Self::TemporarilyUnavailable { message }
            | Self::InvalidClient { message }
            | Self::InvalidGrant { message }
            | Self::UnsupportedGrantType { message }
            | Self::InteractionRequired { message }
            | Self::LoginRequired { message }
            | Self::Encode { message }
            | Self::RandomGeneration { message }
            | Self::Signature { message }
            | Self::StreamWrite { message }
            | Self::TokenFormat { message }
            | Self::SignatureValidation { message } => message,
        }
    }

    /// Returns `true` if the failure is the server's rather than the caller's.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.http_status().is_server_error()
    }
}

impl From<jsonwebtoken::errors::Error> for OidcError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => Self::signature_validation("Token signature is invalid"),
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                Self::signature(format!("Invalid signing key: {err}"))
            }
            _ => Self::token_format(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_status_table() {
        let expected = [
            ("invalid_request", 400),
            ("unauthorized_client", 401),
            ("access_denied", 401),
            ("unsupported_response_type", 400),
            ("invalid_scope", 400),
            ("server_error", 500),
            ("temporarily_unavailable", 503),
            ("invalid_client", 400),
            ("invalid_grant", 400),
            ("unsupported_grant_type", 400),
            ("interaction_required", 400),
            ("login_required", 400),
        ];
        for (code, status) in expected {
            let parsed: OidcErrorCode = code.parse().unwrap();
            assert_eq!(parsed.as_str(), code);
            assert_eq!(parsed.http_status().as_u16(), status, "{code}");
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert!("invalid_token".parse::<OidcErrorCode>().is_err());
    }

    #[test]
    fn test_internal_errors_collapse() {
        let err = OidcError::random_generation("entropy source closed");
        assert_eq!(err.error_code(), OidcErrorCode::ServerError);
        assert_eq!(err.diagnostic_code(), "random_generation_error");
        assert!(err.is_server_error());

        let err = OidcError::signature_validation("no key verified");
        assert_eq!(err.error_code(), OidcErrorCode::InvalidRequest);
        assert_eq!(err.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.diagnostic_code(), "signature_validation_error");

        let err = OidcError::token_format("expected three segments");
        assert_eq!(err.error_code(), OidcErrorCode::InvalidRequest);
    }

    #[test]
    fn test_error_display_and_description() {
        let err = OidcError::invalid_grant("Invalid authz code");
        assert_eq!(err.to_string(), "Invalid grant: Invalid authz code");
        assert_eq!(err.description(), "Invalid authz code");
        assert_eq!(err.diagnostic_code(), "invalid_grant");
        assert!(!err.is_server_error());
    }
}
