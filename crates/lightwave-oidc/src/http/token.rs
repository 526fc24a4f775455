use axum::extract::{Path, State};
use axum::response::Response;

use crate::processor::RequestContext;
use crate::request::{Params, TokenRequest};

use super::OidcState;

/// `POST /{tenant}/oidc/token` with an `application/x-www-form-urlencoded`
/// body. Always answers JSON.
pub async fn token_handler(
    State(state): State<OidcState>,
    Path(tenant): Path<String>,
    body: String,
) -> Response {
    let ctx = RequestContext::new(&tenant);
    let form = Params::parse(&body);

    let response = match TokenRequest::parse(&tenant, &form, state.processor.validator()).await {
        Ok(req) => state.processor.process_token_request(&req, &ctx).await,
        Err(err) => state.processor.error_response(err),
    };
    state.deliver(&response)
}
