use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use super::*;
use crate::config::TokenPolicy;
use crate::request::Params;
use crate::response::TokenResponse;
use crate::testing::{ALICE, ISSUER, MockDirectory, TENANT};
use crate::token::{TokenClaims, token_hash};

const LOGIN: &str = "grant_type=password&username=alice&password=secret";
const CODE_QUERY: &str =
    "response_type=code&client_id=app1&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=openid&state=s1";
const APP1_CB: &str = "redirect_uri=https%3A%2F%2Fapp%2Fcb";

struct Harness {
    dir: Arc<MockDirectory>,
    codes: Arc<AuthzCodeStore>,
    sessions: Arc<AuthSessionStore>,
    processor: RequestProcessor,
    ctx: RequestContext,
}

fn harness() -> Harness {
    let dir = Arc::new(MockDirectory::new());
    let codes = Arc::new(AuthzCodeStore::new(Duration::from_secs(60)));
    let sessions = Arc::new(AuthSessionStore::new(
        "lightwave_sts_session",
        Duration::from_secs(3600),
    ));
    let processor = RequestProcessor::new(dir.clone(), dir.clone(), codes.clone(), sessions.clone());
    Harness {
        dir,
        codes,
        sessions,
        processor,
        ctx: RequestContext::new(TENANT),
    }
}

impl Harness {
    async fn authz(&self, query: &str, login: Option<&str>, sid: Option<&SessionId>) -> AuthzOutcome {
        let form = login.map(Params::parse);
        let req = AuthzRequest::parse(
            TENANT,
            &Params::parse(query),
            form.as_ref(),
            self.processor.validator(),
        )
        .await
        .unwrap();
        self.processor.process_authz_request(&req, sid, &self.ctx).await
    }

    async fn respond(&self, query: &str, sid: &SessionId) -> ProcessedResponse {
        match self.authz(query, None, Some(sid)).await {
            AuthzOutcome::Respond {
                response,
                new_session: None,
            } => response,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    async fn login(&self, query: &str) -> (ProcessedResponse, SessionId) {
        match self.authz(query, Some(LOGIN), None).await {
            AuthzOutcome::Respond {
                response,
                new_session: Some(sid),
            } => (response, sid),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    async fn token(&self, body: &str) -> ProcessedResponse {
        let req = TokenRequest::parse(TENANT, &Params::parse(body), self.processor.validator())
            .await
            .unwrap();
        self.processor.process_token_request(&req, &self.ctx).await
    }

    async fn exchange(&self, code: &str) -> ProcessedResponse {
        self.token(&format!(
            "grant_type=authorization_code&code={code}&client_id=app1&{APP1_CB}"
        ))
        .await
    }

    async fn logout(&self, params: &[(&str, &str)], sid: Option<&SessionId>) -> ProcessedResponse {
        let req = LogoutRequest::parse(
            TENANT,
            &params.iter().copied().collect::<Params>(),
            self.processor.validator(),
        )
        .await
        .unwrap();
        self.processor.process_logout_request(&req, sid, &self.ctx).await
    }

    async fn claims(&self, token: &str) -> TokenClaims {
        self.processor
            .issuer()
            .validate_token(TENANT, token, true)
            .await
            .unwrap()
    }
}

fn authz_of(resp: &ProcessedResponse) -> &AuthzResponse {
    match &resp.response {
        OidcResponse::Authz(authz) => authz,
        other => panic!("expected authz response, got {other:?}"),
    }
}

fn error_of(resp: &ProcessedResponse) -> &ErrorResponse {
    match &resp.response {
        OidcResponse::Error(err) => err,
        other => panic!("expected error response, got {other:?}"),
    }
}

fn token_of(resp: &ProcessedResponse) -> &TokenResponse {
    match &resp.response {
        OidcResponse::Token(token) => token,
        other => panic!("expected token response, got {other:?}"),
    }
}

fn logout_of(resp: &ProcessedResponse) -> &LogoutResponse {
    match &resp.response {
        OidcResponse::Logout(logout) => logout,
        other => panic!("expected logout response, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Authorize
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_login_form_issues_code_and_session() {
    let h = harness();
    let (resp, sid) = h.login(CODE_QUERY).await;

    assert_eq!(
        resp.binding,
        HttpBinding {
            status: StatusCode::OK,
            format: MarshalFormat::Query
        }
    );
    let authz = authz_of(&resp);
    assert!(authz.code.is_some());
    assert!(authz.access_token.is_none());
    assert_eq!(authz.state.as_deref(), Some("s1"));

    let session = h.sessions.get(TENANT, &sid).unwrap();
    assert_eq!(session.user.as_str(), ALICE);
    assert!(session.clients.contains("app1"));
    assert_eq!(h.codes.len(TENANT), 1);
}

#[tokio::test]
async fn test_login_failure_is_invalid_grant() {
    let h = harness();
    let outcome = h
        .authz(
            CODE_QUERY,
            Some("grant_type=password&username=alice&password=wrong"),
            None,
        )
        .await;
    let AuthzOutcome::Respond {
        response,
        new_session,
    } = outcome
    else {
        panic!("expected a response");
    };
    assert!(new_session.is_none());
    assert_eq!(response.binding, HttpBinding::json(StatusCode::BAD_REQUEST));
    assert_eq!(error_of(&response).error, "invalid_grant");
    assert_eq!(h.codes.len(TENANT), 0);
}

#[tokio::test]
async fn test_no_session_shows_login() {
    let h = harness();
    assert_eq!(h.authz(CODE_QUERY, None, None).await, AuthzOutcome::ShowLogin);

    let unknown = SessionId::new("no-such-session");
    assert_eq!(
        h.authz(CODE_QUERY, None, Some(&unknown)).await,
        AuthzOutcome::ShowLogin
    );
}

#[tokio::test]
async fn test_prompt_none_without_session() {
    let h = harness();

    // The single registered URI receives the error.
    let outcome = h
        .authz("response_type=code&client_id=app1&prompt=none", None, None)
        .await;
    let AuthzOutcome::Respond { response, .. } = outcome else {
        panic!("expected a response");
    };
    assert_eq!(response.binding.status, StatusCode::FOUND);
    assert_eq!(response.binding.format, MarshalFormat::Query);
    assert_eq!(error_of(&response).error, "login_required");

    let query = format!("response_type=code&client_id=app1&{APP1_CB}&prompt=none&state=s1");
    let AuthzOutcome::Respond { response, .. } = h.authz(&query, None, None).await else {
        panic!("expected a response");
    };
    let encoded = response.encode().unwrap();
    assert_eq!(encoded.status, StatusCode::FOUND);
    let location = encoded.location.unwrap();
    assert!(location.starts_with("https://app/cb?error=login_required"));
    assert!(location.ends_with("&state=s1"));
}

#[tokio::test]
async fn test_existing_session_records_client() {
    let h = harness();
    let (_, sid) = h.login(CODE_QUERY).await;

    let resp = h
        .respond(
            "response_type=code&client_id=app2&redirect_uri=https%3A%2F%2Fapp2%2Fcb",
            &sid,
        )
        .await;
    assert_eq!(resp.binding.status, StatusCode::FOUND);
    assert!(authz_of(&resp).code.is_some());

    let session = h.sessions.get(TENANT, &sid).unwrap();
    assert_eq!(
        session.clients.iter().map(String::as_str).collect::<Vec<_>>(),
        ["app1", "app2"]
    );
}

#[tokio::test]
async fn test_omitted_redirect_uses_single_registration() {
    let h = harness();
    let query = "response_type=code&client_id=app1&scope=openid&state=s3";

    let (resp, sid) = h.login(query).await;
    assert_eq!(
        resp.binding,
        HttpBinding {
            status: StatusCode::OK,
            format: MarshalFormat::Query
        }
    );
    let encoded = resp.encode().unwrap();
    assert!(encoded.body.starts_with("https://app/cb?code="));
    assert!(encoded.body.ends_with("&state=s3"));

    let resp = h
        .respond("response_type=code&client_id=app1&scope=openid&state=s2", &sid)
        .await;
    assert_eq!(resp.binding.status, StatusCode::FOUND);
    assert_eq!(resp.binding.format, MarshalFormat::Query);
    let location = resp.encode().unwrap().location.unwrap();
    assert!(location.starts_with("https://app/cb?code="));
    assert!(location.ends_with("&state=s2"));

    // The code is bound to the resolved URI.
    let code = authz_of(&resp).code.clone().unwrap();
    assert_eq!(h.exchange(&code).await.binding, HttpBinding::SUCCESS);
}

#[tokio::test]
async fn test_prompt_login_forces_login() {
    let h = harness();
    let (_, sid) = h.login(CODE_QUERY).await;
    let query = format!("{CODE_QUERY}&prompt=login");
    assert_eq!(h.authz(&query, None, Some(&sid)).await, AuthzOutcome::ShowLogin);
}

#[tokio::test]
async fn test_expired_session_is_dropped() {
    let h = harness();
    let (_, sid) = h.login(CODE_QUERY).await;

    h.dir.set_policy(TokenPolicy {
        session_lifetime: Duration::from_millis(1),
        ..TokenPolicy::default()
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(h.authz(CODE_QUERY, None, Some(&sid)).await, AuthzOutcome::ShowLogin);
    assert!(h.sessions.get(TENANT, &sid).is_none());
}

#[tokio::test]
async fn test_implicit_flow_issues_tokens() {
    let h = harness();
    let (_, sid) = h.login(CODE_QUERY).await;

    let query = format!(
        "response_type=id_token%20token&client_id=app1&{APP1_CB}&scope=openid&nonce=n1&state=s2"
    );
    let resp = h.respond(&query, &sid).await;
    assert_eq!(resp.binding.format, MarshalFormat::Fragment);
    assert_eq!(resp.binding.status, StatusCode::FOUND);

    let authz = authz_of(&resp);
    assert!(authz.code.is_none());
    assert_eq!(authz.token_type.as_deref(), Some("Bearer"));
    let access_token = authz.access_token.as_deref().unwrap();
    let claims = h.claims(authz.id_token.as_deref().unwrap()).await;
    assert_eq!(claims.at_hash, Some(token_hash(access_token)));
    assert!(claims.c_hash.is_none());
    assert_eq!(claims.nonce.as_deref(), Some("n1"));
    assert_eq!(claims.sid.as_deref(), Some(sid.as_str()));
}

#[tokio::test]
async fn test_hybrid_flow_links_code() {
    let h = harness();
    let (_, sid) = h.login(CODE_QUERY).await;

    let query =
        format!("response_type=code%20id_token&client_id=app1&{APP1_CB}&scope=openid&nonce=n1");
    let resp = h.respond(&query, &sid).await;
    let authz = authz_of(&resp);
    let code = authz.code.as_deref().unwrap();
    assert!(authz.access_token.is_none());

    let claims = h.claims(authz.id_token.as_deref().unwrap()).await;
    assert_eq!(claims.c_hash, Some(token_hash(code)));
    assert!(claims.at_hash.is_none());
}

#[tokio::test]
async fn test_none_response_type() {
    let h = harness();
    let (_, sid) = h.login(CODE_QUERY).await;
    let before = h.codes.len(TENANT);

    let resp = h
        .respond(&format!("response_type=none&client_id=app1&{APP1_CB}&state=s3"), &sid)
        .await;
    let authz = authz_of(&resp);
    assert!(authz.code.is_none() && authz.id_token.is_none() && authz.access_token.is_none());
    assert_eq!(authz.state.as_deref(), Some("s3"));
    assert_eq!(h.codes.len(TENANT), before);
}

#[tokio::test]
async fn test_form_post_login_renders_bare_form() {
    let h = harness();
    let (resp, _) = h.login(&format!("{CODE_QUERY}&response_mode=form_post")).await;
    assert_eq!(resp.binding.format, MarshalFormat::Form);
    let body = resp.encode().unwrap().body;
    assert!(body.contains("oidcPostForm"));
    assert!(body.contains(r#"name="state" value="s1""#));
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_code_exchange_is_single_use() {
    let h = harness();
    let (resp, sid) = h.login(CODE_QUERY).await;
    let code = authz_of(&resp).code.clone().unwrap();

    let first = h.exchange(&code).await;
    assert_eq!(first.binding, HttpBinding::SUCCESS);
    let tokens = token_of(&first);
    assert_eq!(tokens.token_type.as_deref(), Some("Bearer"));
    assert!(tokens.access_token.is_some());
    let claims = h.claims(tokens.id_token.as_deref().unwrap()).await;
    assert_eq!(claims.sid.as_deref(), Some(sid.as_str()));
    assert_eq!(claims.client_id(), Some("app1"));

    let second = h.exchange(&code).await;
    assert_eq!(second.binding, HttpBinding::json(StatusCode::BAD_REQUEST));
    assert_eq!(error_of(&second).error, "invalid_grant");
}

#[tokio::test]
async fn test_code_client_mismatch() {
    let h = harness();
    let (resp, _) = h.login(CODE_QUERY).await;
    let code = authz_of(&resp).code.clone().unwrap();

    let resp = h
        .token(&format!(
            "grant_type=authorization_code&code={code}&client_id=app2&redirect_uri=https%3A%2F%2Fapp2%2Fcb"
        ))
        .await;
    let err = error_of(&resp);
    assert_eq!(err.error, "invalid_grant");
    assert_eq!(err.error_description, "Client id mismatch");

    // The code was consumed by the failed attempt.
    assert_eq!(error_of(&h.exchange(&code).await).error, "invalid_grant");
}

#[tokio::test]
async fn test_code_redirect_mismatch() {
    let h = harness();
    let (resp, _) = h
        .login("response_type=code&client_id=multi&redirect_uri=https%3A%2F%2Fmulti%2Fa")
        .await;
    let code = authz_of(&resp).code.clone().unwrap();

    let resp = h
        .token(&format!(
            "grant_type=authorization_code&code={code}&client_id=multi&redirect_uri=https%3A%2F%2Fmulti%2Fb"
        ))
        .await;
    assert_eq!(error_of(&resp).error_description, "Client redirect uri mismatch");
}

#[tokio::test]
async fn test_code_without_session() {
    let h = harness();
    let (resp, sid) = h.login(CODE_QUERY).await;
    let code = authz_of(&resp).code.clone().unwrap();
    h.sessions.remove(TENANT, &sid);

    assert_eq!(error_of(&h.exchange(&code).await).error, "invalid_grant");
}

#[tokio::test]
async fn test_code_with_expired_session() {
    let h = harness();
    let (resp, sid) = h.login(CODE_QUERY).await;
    let code = authz_of(&resp).code.clone().unwrap();

    h.dir.set_policy(TokenPolicy {
        session_lifetime: Duration::from_millis(1),
        ..TokenPolicy::default()
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(error_of(&h.exchange(&code).await).error, "invalid_grant");
    assert!(h.sessions.get(TENANT, &sid).is_none());
}

#[tokio::test]
async fn test_password_grant() {
    let h = harness();
    let resp = h
        .token("grant_type=password&username=alice&password=secret&client_id=app1&scope=openid")
        .await;
    let tokens = token_of(&resp);
    assert!(tokens.access_token.is_some());
    let claims = h.claims(tokens.id_token.as_deref().unwrap()).await;
    assert_eq!(claims.sub, ALICE);
    assert!(claims.sid.is_none());

    let resp = h
        .token("grant_type=password&username=alice&password=nope&client_id=app1")
        .await;
    assert_eq!(resp.binding.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&resp).error, "invalid_grant");
}

#[tokio::test]
async fn test_refresh_grant_rejected() {
    let h = harness();
    let resp = h
        .token("grant_type=refresh_token&refresh_token=r1&client_id=app1")
        .await;
    assert_eq!(resp.binding, HttpBinding::json(StatusCode::BAD_REQUEST));
    assert_eq!(error_of(&resp).error, "unsupported_grant_type");
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

/// Logs in with app1, uses the session with app2, and returns app1's ID token.
async fn shared_session(h: &Harness) -> (SessionId, String) {
    let (resp, sid) = h.login(CODE_QUERY).await;
    let code = authz_of(&resp).code.clone().unwrap();
    h.respond(
        "response_type=code&client_id=app2&redirect_uri=https%3A%2F%2Fapp2%2Fcb",
        &sid,
    )
    .await;
    let id_token = token_of(&h.exchange(&code).await).id_token.clone().unwrap();
    (sid, id_token)
}

#[tokio::test]
async fn test_logout_notifies_other_clients() {
    let h = harness();
    let (sid, id_token) = shared_session(&h).await;

    let resp = h
        .logout(&[("id_token_hint", id_token.as_str())], Some(&sid))
        .await;
    assert_eq!(resp.binding, HttpBinding::html());

    let logout = logout_of(&resp);
    assert_eq!(logout.logout_uris.len(), 1);
    let url = Url::parse(&logout.logout_uris[0]).unwrap();
    assert_eq!(url.host_str(), Some("app2"));
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(
        pairs,
        [
            ("x".to_string(), "1".to_string()),
            ("iss".to_string(), ISSUER.to_string()),
            ("sid".to_string(), sid.as_str().to_string()),
        ]
    );
    assert!(h.sessions.get(TENANT, &sid).is_none());
    assert_eq!(resp.encode().unwrap().body.matches("<iframe").count(), 1);
}

#[tokio::test]
async fn test_logout_falls_back_to_hint_sid() {
    let h = harness();
    let (sid, id_token) = shared_session(&h).await;

    let resp = h.logout(&[("id_token_hint", id_token.as_str())], None).await;
    assert_eq!(logout_of(&resp).logout_uris.len(), 1);
    assert!(h.sessions.get(TENANT, &sid).is_none());
}

#[tokio::test]
async fn test_logout_without_session() {
    let h = harness();
    let resp = h.logout(&[], None).await;
    assert_eq!(resp.binding, HttpBinding::html());
    assert_eq!(logout_of(&resp), &LogoutResponse::default());
}

#[tokio::test]
async fn test_logout_redirects_with_state() {
    let h = harness();
    let (sid, id_token) = shared_session(&h).await;

    let resp = h
        .logout(
            &[
                ("id_token_hint", id_token.as_str()),
                ("post_logout_redirect_uri", "https://app/bye"),
                ("state", "s9"),
            ],
            Some(&sid),
        )
        .await;
    assert_eq!(
        logout_of(&resp).post_logout_redirect_uri.as_deref(),
        Some("https://app/bye?state=s9")
    );
}

#[tokio::test]
async fn test_logout_error_redirects_to_post_logout_uri() {
    let h = harness();
    let redirect = RedirectContext {
        redirect_uri: "https://app/bye".to_string(),
        state: Some("s9".to_string()),
        response_mode: crate::types::ResponseMode::Query,
        login_form_post: false,
    };
    let resp = h
        .processor
        .error_logout_response(Some(&redirect), OidcError::server_error("boom"));
    let encoded = resp.encode().unwrap();
    assert_eq!(encoded.status, StatusCode::FOUND);
    assert_eq!(
        encoded.location.as_deref(),
        Some("https://app/bye?error=server_error&error_description=boom&state=s9")
    );
}

// ---------------------------------------------------------------------------
// Metadata, JWKS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_metadata_and_jwks() {
    let h = harness();

    let resp = h.processor.process_metadata_request(&h.ctx).await;
    assert_eq!(resp.binding, HttpBinding::SUCCESS);
    let OidcResponse::Metadata(doc) = &resp.response else {
        panic!("expected metadata");
    };
    assert_eq!(doc.issuer, ISSUER);
    assert_eq!(doc.end_session_endpoint, format!("{ISSUER}/oidc/logout"));

    let resp = h.processor.process_jwks_request(&h.ctx).await;
    let OidcResponse::Jwks(jwks) = &resp.response else {
        panic!("expected jwks");
    };
    assert_eq!(jwks.keys.len(), 1);
    assert_eq!(jwks.keys[0].kid, h.dir.signer_serial());
}

#[tokio::test]
async fn test_unknown_tenant_is_json_error() {
    let h = harness();
    let ctx = RequestContext::new("globex");
    let resp = h.processor.process_jwks_request(&ctx).await;
    assert!(resp.response.is_error());
    assert_eq!(resp.binding.format, MarshalFormat::Json);
    assert_eq!(resp.binding.status, StatusCode::BAD_REQUEST);
}
