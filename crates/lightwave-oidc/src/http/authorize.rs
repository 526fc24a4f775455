//! Authorization endpoint.
//!
//! ```text
//! GET  /{tenant}/oidc/authorize?...   ─► session cookie? ─► respond
//!                                         └─► login page (POSTs back here)
//! POST /{tenant}/oidc/authorize?...   ─► authenticate form credentials
//!      grant_type=password&...           ─► new session cookie + respond
//! ```

use axum::extract::{Path, RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::CookieJar;

use crate::processor::{AuthzOutcome, RequestContext};
use crate::request::{AuthzRequest, Params};

use super::OidcState;
use super::templates::render_login_page;

/// `GET /{tenant}/oidc/authorize`
pub async fn authorize_get(
    State(state): State<OidcState>,
    Path(tenant): Path<String>,
    RawQuery(query): RawQuery,
    jar: CookieJar,
) -> Response {
    authorize(&state, &tenant, query.as_deref(), None, jar).await
}

/// `POST /{tenant}/oidc/authorize`: the login form submission. OAuth
/// parameters stay in the query; the body carries the credentials.
pub async fn authorize_post(
    State(state): State<OidcState>,
    Path(tenant): Path<String>,
    RawQuery(query): RawQuery,
    jar: CookieJar,
    body: String,
) -> Response {
    let form = Params::parse(&body);
    authorize(&state, &tenant, query.as_deref(), Some(form), jar).await
}

async fn authorize(
    state: &OidcState,
    tenant: &str,
    query: Option<&str>,
    login_form: Option<Params>,
    jar: CookieJar,
) -> Response {
    let ctx = RequestContext::new(tenant);
    let query = Params::parse(query.unwrap_or_default());

    let req = match AuthzRequest::parse(
        tenant,
        &query,
        login_form.as_ref(),
        state.processor.validator(),
    )
    .await
    {
        Ok(req) => req,
        Err(err) => {
            let response = state
                .processor
                .error_authz_response(err.redirect.as_ref(), err.error);
            return state.deliver(&response);
        }
    };

    let session_id = state.session_id(&jar, tenant);
    match state
        .processor
        .process_authz_request(&req, session_id.as_ref(), &ctx)
        .await
    {
        AuthzOutcome::ShowLogin => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "no-store")],
            Html(render_login_page(tenant, &req.client.client_id)),
        )
            .into_response(),
        AuthzOutcome::Respond {
            response,
            new_session,
        } => {
            let body = state.deliver(&response);
            match new_session {
                Some(id) => (jar.add(state.session_cookie(tenant, &id)), body).into_response(),
                None => body,
            }
        }
    }
}
