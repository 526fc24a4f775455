//! # lightwave-oidc
//!
//! OAuth 2.0 / OpenID Connect protocol engine of the Lightwave STS.
//!
//! Every operation is scoped to a tenant named by the first path segment of
//! the endpoint URL. Directory data (clients, users, signing keys, token
//! policy) comes from an [`IdentityConfig`] and an [`Authenticator`]
//! supplied by the host; authorization codes and login sessions live in
//! process memory.
//!
//! ## Modules
//!
//! - [`config`] - Engine settings and per-tenant token policy
//! - [`error`] - OAuth error codes and their HTTP mapping
//! - [`identity`] - Directory traits consumed by the engine
//! - [`types`] - Identifiers, response types, scopes and prompts
//! - [`request`] - Parameter parsing and request validation
//! - [`storage`] - Authorization code and session stores
//! - [`token`] - JWT minting and verification
//! - [`processor`] - Authorize, token, logout and discovery operations
//! - [`response`] - Response documents and their HTTP encodings
//! - [`http`] - Axum handlers for the tenant endpoints

pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod processor;
pub mod request;
pub mod response;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, OidcConfig, TokenPolicy};
pub use error::{OidcError, OidcErrorCode};
pub use http::{OidcState, oidc_router};
pub use identity::{
    Authenticator, Credentials, IdentityConfig, IdentityError, OidcClient, SignerCertificate,
    SignerKey, UserAttribute, UserAttributes,
};
pub use processor::{AuthzOutcome, ProcessedResponse, RequestContext, RequestProcessor};
pub use storage::{AuthSessionStore, AuthzCodeStore, start_reaper};
pub use token::{TokenClaims, TokenIssuer};
pub use types::{ClientInfo, LoginMethod, SessionId, UserId};
