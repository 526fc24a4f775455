//! Axum handlers for the tenant-scoped OIDC endpoints.
//!
//! # Routes
//!
//! | Route | Method | Handler |
//! |---|---|---|
//! | `/{tenant}/.well-known/openid-configuration` | GET | [`openid_configuration_handler`] |
//! | `/{tenant}/oidc/jwks` | GET | [`jwks_handler`] |
//! | `/{tenant}/oidc/authorize` | GET, POST | [`authorize_get`], [`authorize_post`] |
//! | `/{tenant}/oidc/token` | POST | [`token_handler`] |
//! | `/{tenant}/oidc/logout` | GET | [`logout_handler`] |
//!
//! Handlers only move data between HTTP and the [`RequestProcessor`]:
//! parameters in, session cookie in and out, encoded response out.

mod authorize;
mod discovery;
mod logout;
mod templates;
mod token;

pub use authorize::{authorize_get, authorize_post};
pub use discovery::{jwks_handler, openid_configuration_handler};
pub use logout::logout_handler;
pub use token::token_handler;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};

use crate::processor::{ProcessedResponse, RequestProcessor};
use crate::types::SessionId;

/// Shared state of the OIDC handlers.
#[derive(Clone)]
pub struct OidcState {
    pub processor: RequestProcessor,
    /// Mark session cookies `Secure`.
    pub secure_cookies: bool,
}

impl OidcState {
    #[must_use]
    pub fn new(processor: RequestProcessor, secure_cookies: bool) -> Self {
        Self {
            processor,
            secure_cookies,
        }
    }

    fn session_cookie_name(&self, tenant: &str) -> String {
        self.processor.session_cookie_name(tenant)
    }

    /// Session ID carried by the tenant's session cookie.
    fn session_id(&self, jar: &CookieJar, tenant: &str) -> Option<SessionId> {
        jar.get(&self.session_cookie_name(tenant))
            .map(|cookie| cookie.value())
            .filter(|value| !value.is_empty())
            .map(SessionId::new)
    }

    fn session_cookie(&self, tenant: &str, id: &SessionId) -> Cookie<'static> {
        Cookie::build((self.session_cookie_name(tenant), id.as_str().to_string()))
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .path(format!("/{tenant}"))
            .build()
    }

    fn clear_session_cookie(&self, tenant: &str) -> Cookie<'static> {
        Cookie::build((self.session_cookie_name(tenant), ""))
            .path(format!("/{tenant}"))
            .build()
    }

    /// Encodes `processed`, falling back to a JSON `server_error` if the
    /// response cannot be rendered.
    fn deliver(&self, processed: &ProcessedResponse) -> Response {
        match processed.encode() {
            Ok(encoded) => encoded.into_response(),
            Err(err) => {
                tracing::error!(error = %err, "Response encoding failed");
                match self.processor.error_response(err).encode() {
                    Ok(encoded) => encoded.into_response(),
                    Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                }
            }
        }
    }
}

/// Builds the OIDC router.
pub fn oidc_router(state: OidcState) -> Router {
    Router::new()
        .route(
            "/{tenant}/.well-known/openid-configuration",
            get(openid_configuration_handler),
        )
        .route("/{tenant}/oidc/jwks", get(jwks_handler))
        .route(
            "/{tenant}/oidc/authorize",
            get(authorize_get).post(authorize_post),
        )
        .route("/{tenant}/oidc/token", post(token_handler))
        .route("/{tenant}/oidc/logout", get(logout_handler))
        .with_state(state)
}
