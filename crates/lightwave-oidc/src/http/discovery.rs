//! Discovery and key-set endpoints.

use axum::extract::{Path, State};
use axum::response::Response;

use crate::processor::RequestContext;

use super::OidcState;

/// `GET /{tenant}/.well-known/openid-configuration`
pub async fn openid_configuration_handler(
    State(state): State<OidcState>,
    Path(tenant): Path<String>,
) -> Response {
    let ctx = RequestContext::new(&tenant);
    let response = state.processor.process_metadata_request(&ctx).await;
    state.deliver(&response)
}

/// `GET /{tenant}/oidc/jwks`
///
/// Every registered signer certificate of the tenant, so tokens signed
/// before a key rotation still verify.
pub async fn jwks_handler(State(state): State<OidcState>, Path(tenant): Path<String>) -> Response {
    let ctx = RequestContext::new(&tenant);
    let response = state.processor.process_jwks_request(&ctx).await;
    state.deliver(&response)
}
