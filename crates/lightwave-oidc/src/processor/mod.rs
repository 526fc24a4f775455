//! The authorize / token / logout state machine.
//!
//! [`RequestProcessor`] is stateless per call: everything it knows about a
//! user comes from the session and code stores, and every call returns a
//! [`ProcessedResponse`] (an [`OidcResponse`] with its [`HttpBinding`]).
//! Failures inside the state machine are turned into error responses that
//! keep the request's redirect context; nothing is retried.
//!
//! # Authorize flow
//!
//! ```text
//! login form post ─► authenticate ─► new session ─┐
//! cookie session ──► (expired? prompt=login?) ────┼─► code (code, hybrid)
//!     └─► none: prompt=none ? login_required      │   tokens (implicit, hybrid)
//!               : show login page                 └─► respond per binding
//! ```

mod binding;

pub use binding::{HttpBinding, MarshalFormat};

use std::sync::Arc;

use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::error::OidcError;
use crate::identity::{Authenticator, IdentityConfig, IdentityError};
use crate::request::{
    AuthzRequest, ClientValidator, Grant, LogoutRequest, RedirectContext, TokenRequest,
};
use crate::response::{
    AuthzResponse, EncodedResponse, ErrorResponse, LogoutResponse, MetadataDocument, OidcResponse,
    encode_response,
};
use crate::storage::{AuthSession, AuthSessionStore, AuthzCodeStore};
use crate::token::{IssueRequest, IssuedTokens, TokenIssuer};
use crate::types::{LoginMethod, Prompt, SessionId};

/// Per-request diagnostics context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    tenant: String,
    request_id: Uuid,
}

impl RequestContext {
    #[must_use]
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            request_id: Uuid::new_v4(),
        }
    }

    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    fn span(&self, operation: &'static str) -> tracing::Span {
        tracing::info_span!(
            "oidc",
            operation,
            tenant = %self.tenant,
            request_id = %self.request_id
        )
    }
}

/// A response together with how it must be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedResponse {
    pub response: OidcResponse,
    pub binding: HttpBinding,
}

impl ProcessedResponse {
    /// Renders the response.
    ///
    /// # Errors
    ///
    /// See [`encode_response`].
    pub fn encode(&self) -> Result<EncodedResponse, OidcError> {
        encode_response(&self.response, &self.binding)
    }
}

/// Result of an authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthzOutcome {
    /// The user must log in first; render the login page.
    ShowLogin,
    /// Deliver `response`. `new_session` is set when this request created
    /// a session whose cookie must be issued.
    Respond {
        response: ProcessedResponse,
        new_session: Option<SessionId>,
    },
}

/// Drives the authorize, token, logout, metadata and JWKS operations.
#[derive(Clone)]
pub struct RequestProcessor {
    identity: Arc<dyn IdentityConfig>,
    authenticator: Arc<dyn Authenticator>,
    issuer: TokenIssuer,
    validator: ClientValidator,
    codes: Arc<AuthzCodeStore>,
    sessions: Arc<AuthSessionStore>,
}

impl RequestProcessor {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityConfig>,
        authenticator: Arc<dyn Authenticator>,
        codes: Arc<AuthzCodeStore>,
        sessions: Arc<AuthSessionStore>,
    ) -> Self {
        let issuer = TokenIssuer::new(identity.clone(), authenticator.clone());
        let validator = ClientValidator::new(identity.clone(), issuer.clone());
        Self {
            identity,
            authenticator,
            issuer,
            validator,
            codes,
            sessions,
        }
    }

    /// Validator for the request parsers.
    #[must_use]
    pub fn validator(&self) -> &ClientValidator {
        &self.validator
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn session_cookie_name(&self, tenant: &str) -> String {
        self.sessions.session_cookie_name(tenant)
    }

    // ---------------------------------------------------------------------
    // Authorize
    // ---------------------------------------------------------------------

    /// Processes a parsed authorization request. `session_id` is the value of
    /// the tenant's session cookie, if the browser sent one.
    pub async fn process_authz_request(
        &self,
        req: &AuthzRequest,
        session_id: Option<&SessionId>,
        ctx: &RequestContext,
    ) -> AuthzOutcome {
        self.authorize(req, session_id, ctx.tenant())
            .instrument(ctx.span("authorize"))
            .await
    }

    async fn authorize(
        &self,
        req: &AuthzRequest,
        session_id: Option<&SessionId>,
        tenant: &str,
    ) -> AuthzOutcome {
        let client_id = req.client.client_id.as_str();

        let (session, created) = if req.login_form_post {
            match self.login(req, tenant).await {
                Ok(session) => (session, true),
                Err(err) => return self.authz_error(req, err),
            }
        } else {
            let existing = match session_id {
                Some(id) => match self.live_session(tenant, id).await {
                    Ok(session) => session,
                    Err(err) => return self.authz_error(req, err),
                },
                None => None,
            };
            let force_login = req.scope.has_openid() && req.prompt.contains(Prompt::Login);

            match existing {
                Some(session) if !force_login => {
                    match self.sessions.update(tenant, &session.id, None, client_id) {
                        Some(session) => (session, false),
                        None => {
                            return self.authz_error(
                                req,
                                OidcError::server_error("Unable to update session"),
                            );
                        }
                    }
                }
                _ if req.prompt.contains(Prompt::None) => {
                    tracing::info!(client_id, "No session, but prompt=none");
                    return self.authz_error(
                        req,
                        OidcError::login_required("Unable to complete request silently"),
                    );
                }
                _ => return AuthzOutcome::ShowLogin,
            }
        };

        match self.respond(req, tenant, &session).await {
            Ok(response) => {
                tracing::info!(
                    client_id,
                    response_type = %req.response_types,
                    new_session = created,
                    "Authorization granted"
                );
                AuthzOutcome::Respond {
                    response,
                    new_session: created.then_some(session.id),
                }
            }
            Err(err) => {
                if created {
                    self.sessions.remove(tenant, &session.id);
                }
                self.authz_error(req, err)
            }
        }
    }

    async fn login(&self, req: &AuthzRequest, tenant: &str) -> Result<AuthSession, OidcError> {
        let Some(Grant::Password(credentials)) = &req.login else {
            tracing::warn!("Login form post without credentials");
            return Err(OidcError::invalid_grant("Invalid user name or password"));
        };
        let user = self
            .authenticator
            .authenticate(tenant, credentials)
            .await
            .map_err(login_failure)?;

        self.sessions
            .new_session(tenant, &user, LoginMethod::Password, &req.client.client_id)
            .map_err(|err| {
                tracing::error!(error = %err, "Creating session failed");
                OidcError::server_error("Unable to create an auth session")
            })
    }

    /// Returns the session unless it is older than the tenant's session
    /// lifetime, in which case it is removed.
    async fn live_session(
        &self,
        tenant: &str,
        id: &SessionId,
    ) -> Result<Option<AuthSession>, OidcError> {
        let Some(session) = self.sessions.get(tenant, id) else {
            return Ok(None);
        };
        let policy = self.identity.token_policy(tenant).await.map_err(|err| {
            tracing::error!(error = %err, "Token policy lookup failed");
            OidcError::server_error("Unable to read token policy")
        })?;
        if session.age() > policy.session_lifetime {
            tracing::debug!("Session expired");
            self.sessions.remove(tenant, id);
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn respond(
        &self,
        req: &AuthzRequest,
        tenant: &str,
        session: &AuthSession,
    ) -> Result<ProcessedResponse, OidcError> {
        let types = req.response_types;

        let code = if types.is_authz_flow() || types.is_hybrid_flow() {
            let entry = self
                .codes
                .add(
                    tenant,
                    &req.client,
                    &req.scope,
                    req.nonce.as_deref(),
                    &session.id,
                )
                .map_err(|err| {
                    tracing::error!(error = %err, "Creating authz code failed");
                    OidcError::server_error("Unable to create authz code")
                })?;
            Some(entry.code)
        } else {
            None
        };

        let tokens = if types.is_implicit_flow() || types.is_hybrid_flow() {
            self.issuer
                .issue_tokens(IssueRequest {
                    tenant,
                    client_id: &req.client.client_id,
                    response_types: Some(types),
                    scope: &req.scope,
                    nonce: req.nonce.as_deref(),
                    user: &session.user,
                    code: code.as_deref(),
                    session_id: Some(&session.id),
                })
                .await
                .map_err(issuance_failure)?
        } else {
            IssuedTokens::default()
        };

        Ok(ProcessedResponse {
            response: OidcResponse::Authz(AuthzResponse::new(
                req.redirect_uri(),
                req.state.clone(),
                code,
                tokens,
            )),
            binding: HttpBinding::for_authz(Some(&req.redirect_context()), None),
        })
    }

    fn authz_error(&self, req: &AuthzRequest, err: OidcError) -> AuthzOutcome {
        AuthzOutcome::Respond {
            response: self.error_authz_response(Some(&req.redirect_context()), err),
            new_session: None,
        }
    }

    /// Error response for an authorization request, delivered through
    /// `redirect` when there is one.
    #[must_use]
    pub fn error_authz_response(
        &self,
        redirect: Option<&RedirectContext>,
        err: OidcError,
    ) -> ProcessedResponse {
        tracing::info!(
            error = err.diagnostic_code(),
            description = err.description(),
            redirected = redirect.is_some(),
            "Authorization error"
        );
        let binding = HttpBinding::for_authz(redirect, Some(&err));
        ProcessedResponse {
            response: OidcResponse::Error(ErrorResponse::new(
                &err,
                redirect.map(|r| r.redirect_uri.clone()),
                redirect.and_then(|r| r.state.clone()),
            )),
            binding,
        }
    }

    // ---------------------------------------------------------------------
    // Token
    // ---------------------------------------------------------------------

    /// Processes a parsed token request. Responses are always JSON.
    pub async fn process_token_request(
        &self,
        req: &TokenRequest,
        ctx: &RequestContext,
    ) -> ProcessedResponse {
        let span = ctx.span("token");
        async {
            match self.redeem(req, ctx.tenant()).await {
                Ok(tokens) => {
                    tracing::info!(
                        client_id = %req.client.client_id,
                        grant_type = %req.grant.grant_type(),
                        "Tokens issued"
                    );
                    ProcessedResponse {
                        response: OidcResponse::Token(tokens.into()),
                        binding: HttpBinding::SUCCESS,
                    }
                }
                Err(err) => self.error_response(err),
            }
        }
        .instrument(span)
        .await
    }

    async fn redeem(&self, req: &TokenRequest, tenant: &str) -> Result<IssuedTokens, OidcError> {
        let client_id = req.client.client_id.as_str();

        let (user, scope, nonce, session_id) = match &req.grant {
            Grant::Password(credentials) => {
                let user = self
                    .authenticator
                    .authenticate(tenant, credentials)
                    .await
                    .map_err(login_failure)?;
                (user, req.scope.clone(), None, None)
            }
            Grant::AuthorizationCode { code } => {
                let entry = self
                    .codes
                    .remove(tenant, code)
                    .ok_or_else(|| OidcError::invalid_grant("Invalid authz code"))?;
                if entry.client_id != client_id {
                    tracing::warn!(
                        code_client = %entry.client_id,
                        client_id,
                        "Client ID mismatch"
                    );
                    return Err(OidcError::invalid_grant("Client id mismatch"));
                }
                if entry.redirect_uri != req.client.redirect_uri {
                    tracing::warn!(client_id, "Redirect URI mismatch");
                    return Err(OidcError::invalid_grant("Client redirect uri mismatch"));
                }
                let session = self
                    .live_session(tenant, &entry.session_id)
                    .await?
                    .ok_or_else(|| OidcError::invalid_grant("Invalid authz code"))?;
                (session.user, entry.scope, entry.nonce, Some(entry.session_id))
            }
            Grant::RefreshToken { .. } => {
                return Err(OidcError::unsupported_grant_type(
                    "refresh_token grant is not supported",
                ));
            }
        };

        self.issuer
            .issue_tokens(IssueRequest {
                tenant,
                client_id,
                response_types: None,
                scope: &scope,
                nonce: nonce.as_deref(),
                user: &user,
                code: None,
                session_id: session_id.as_ref(),
            })
            .await
            .map_err(issuance_failure)
    }

    // ---------------------------------------------------------------------
    // Logout
    // ---------------------------------------------------------------------

    /// Ends the browser session and fans the logout out to every other client
    /// that used it. The session is taken from the cookie, or from the `sid`
    /// of the ID token hint when there is no cookie.
    pub async fn process_logout_request(
        &self,
        req: &LogoutRequest,
        session_id: Option<&SessionId>,
        ctx: &RequestContext,
    ) -> ProcessedResponse {
        let span = ctx.span("logout");
        async {
            match self.end_session(req, session_id, ctx.tenant()).await {
                Ok(logout) => {
                    tracing::info!(
                        client_id = req.client_id.as_deref().unwrap_or_default(),
                        notified = logout.logout_uris.len(),
                        "Session logged out"
                    );
                    ProcessedResponse {
                        response: OidcResponse::Logout(logout),
                        binding: HttpBinding::html(),
                    }
                }
                Err(err) => self.error_logout_response(req.redirect_context().as_ref(), err),
            }
        }
        .instrument(span)
        .await
    }

    async fn end_session(
        &self,
        req: &LogoutRequest,
        session_id: Option<&SessionId>,
        tenant: &str,
    ) -> Result<LogoutResponse, OidcError> {
        let sid = session_id
            .cloned()
            .or_else(|| req.hinted_session().map(SessionId::new));
        let session = sid.and_then(|sid| self.sessions.remove(tenant, &sid));

        let mut logout_uris = Vec::new();
        if let Some(session) = session {
            let issuer = self.issuer.issuer(tenant).await.map_err(|err| {
                tracing::error!(error = %err, "Issuer lookup failed");
                OidcError::server_error("Failed obtaining issuer")
            })?;
            let others = session
                .clients
                .iter()
                .filter(|client| Some(client.as_str()) != req.client_id.as_deref());
            for client_id in others {
                if let Some(uri) = self.logout_uri(tenant, client_id, &issuer, &session.id).await? {
                    logout_uris.push(uri);
                }
            }
        }

        let post_logout_redirect_uri = req
            .post_logout_redirect_uri
            .as_deref()
            .map(|uri| append_state(uri, req.state.as_deref()))
            .transpose()?;

        Ok(LogoutResponse {
            logout_uris,
            post_logout_redirect_uri,
        })
    }

    /// Front-channel logout URI of `client_id` with `iss` and `sid` appended,
    /// or `None` if the client registered none.
    async fn logout_uri(
        &self,
        tenant: &str,
        client_id: &str,
        issuer: &str,
        sid: &SessionId,
    ) -> Result<Option<String>, OidcError> {
        let client = self
            .identity
            .lookup_oidc_client(tenant, client_id)
            .await
            .map_err(|err| {
                tracing::warn!(client_id, error = %err, "Client lookup failed");
                OidcError::invalid_request("client info unavailable")
            })?;
        let Some(uri) = client.and_then(|client| client.logout_uri) else {
            return Ok(None);
        };
        let mut url =
            Url::parse(&uri).map_err(|_| OidcError::invalid_request("invalid logout uri"))?;
        url.query_pairs_mut()
            .append_pair("iss", issuer)
            .append_pair("sid", sid.as_str());
        Ok(Some(url.into()))
    }

    /// Error response for a logout request.
    #[must_use]
    pub fn error_logout_response(
        &self,
        redirect: Option<&RedirectContext>,
        err: OidcError,
    ) -> ProcessedResponse {
        tracing::info!(
            error = err.diagnostic_code(),
            description = err.description(),
            "Logout error"
        );
        let binding = HttpBinding::for_logout_error(redirect, &err);
        ProcessedResponse {
            response: OidcResponse::Error(ErrorResponse::new(
                &err,
                redirect.map(|r| r.redirect_uri.clone()),
                redirect.and_then(|r| r.state.clone()),
            )),
            binding,
        }
    }

    // ---------------------------------------------------------------------
    // Metadata, JWKS, errors
    // ---------------------------------------------------------------------

    /// The tenant's OpenID Provider metadata.
    pub async fn process_metadata_request(&self, ctx: &RequestContext) -> ProcessedResponse {
        match self.issuer.issuer(ctx.tenant()).await {
            Ok(issuer) => ProcessedResponse {
                response: OidcResponse::Metadata(Box::new(MetadataDocument::new(&issuer))),
                binding: HttpBinding::SUCCESS,
            },
            Err(err) => self.error_response(err),
        }
    }

    /// The tenant's signer keys.
    pub async fn process_jwks_request(&self, ctx: &RequestContext) -> ProcessedResponse {
        match self.issuer.signers(ctx.tenant()).await {
            Ok(jwks) => ProcessedResponse {
                response: OidcResponse::Jwks(jwks),
                binding: HttpBinding::SUCCESS,
            },
            Err(err) => self.error_response(err),
        }
    }

    /// A JSON error with the error's HTTP status.
    #[must_use]
    pub fn error_response(&self, err: OidcError) -> ProcessedResponse {
        if err.is_server_error() {
            tracing::error!(
                error = err.diagnostic_code(),
                description = err.description(),
                "Request failed"
            );
        } else {
            tracing::info!(
                error = err.diagnostic_code(),
                description = err.description(),
                "Request rejected"
            );
        }
        ProcessedResponse {
            binding: HttpBinding::json(err.http_status()),
            response: OidcResponse::Error(ErrorResponse::new(&err, None, None)),
        }
    }
}

/// Maps an authentication failure. Directory outages stay server errors;
/// anything else about the credentials is `invalid_grant`.
fn login_failure(err: IdentityError) -> OidcError {
    tracing::warn!(error = %err, "User authentication failed");
    match err {
        IdentityError::Unavailable(_)
        | IdentityError::InvalidConfiguration(_)
        | IdentityError::Internal(_) => OidcError::from(err),
        IdentityError::NotFound(_) | IdentityError::InvalidCredentials => {
            OidcError::invalid_grant("Invalid user name or password")
        }
    }
}

fn issuance_failure(err: OidcError) -> OidcError {
    tracing::error!(
        error = err.diagnostic_code(),
        description = err.description(),
        "Token issuance failed"
    );
    OidcError::server_error("Unable to issue tokens")
}

fn append_state(uri: &str, state: Option<&str>) -> Result<String, OidcError> {
    let mut url = Url::parse(uri)
        .map_err(|_| OidcError::invalid_request("invalid post_logout_redirect_uri"))?;
    if let Some(state) = state {
        url.query_pairs_mut().append_pair("state", state);
    }
    Ok(url.into())
}

#[cfg(test)]
mod tests;
