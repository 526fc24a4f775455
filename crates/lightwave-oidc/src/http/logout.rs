use axum::extract::{Path, RawQuery, State};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;

use crate::processor::RequestContext;
use crate::request::{LogoutRequest, Params};

use super::OidcState;

/// `GET /{tenant}/oidc/logout` (RP-initiated, front-channel).
///
/// Ends the session named by the cookie (or by the hint's `sid`), clears the
/// cookie and renders the front-channel logout page.
pub async fn logout_handler(
    State(state): State<OidcState>,
    Path(tenant): Path<String>,
    RawQuery(query): RawQuery,
    jar: CookieJar,
) -> Response {
    let ctx = RequestContext::new(&tenant);
    let query = Params::parse(query.as_deref().unwrap_or_default());

    let req = match LogoutRequest::parse(&tenant, &query, state.processor.validator()).await {
        Ok(req) => req,
        Err(err) => {
            let response = state
                .processor
                .error_logout_response(err.redirect.as_ref(), err.error);
            return state.deliver(&response);
        }
    };

    let session_id = state.session_id(&jar, &tenant);
    let response = state
        .processor
        .process_logout_request(&req, session_id.as_ref(), &ctx)
        .await;

    let body = state.deliver(&response);
    if session_id.is_some() {
        (jar.remove(state.clear_session_cookie(&tenant)), body).into_response()
    } else {
        body
    }
}
