use crate::error::OidcError;
use crate::token::TokenClaims;
use crate::types::{ClientInfo, PromptSet, ResponseMode, ResponseType, ResponseTypeSet, ScopeSet};

use super::{Grant, Params, RedirectContext, RequestError, RequestValidator};

/// A validated authorization-endpoint request.
#[derive(Debug, Clone)]
pub struct AuthzRequest {
    /// Client with its resolved redirect URI.
    pub client: ClientInfo,
    pub response_types: ResponseTypeSet,
    pub scope: ScopeSet,
    pub state: Option<String>,
    pub response_mode: ResponseMode,
    pub nonce: Option<String>,
    pub prompt: PromptSet,
    pub id_token_hint: Option<TokenClaims>,
    /// Credentials posted by the login form.
    pub login: Option<Grant>,
    /// The request is a login form submission (POST).
    pub login_form_post: bool,
}

/// Binds errors to the redirect target once it is known.
struct Redirect<'a> {
    uri: &'a str,
    state: Option<&'a str>,
    login_form_post: bool,
}

impl Redirect<'_> {
    fn error(&self, mode: ResponseMode) -> impl Fn(OidcError) -> RequestError + '_ {
        move |error| RequestError {
            error,
            redirect: Some(RedirectContext {
                redirect_uri: self.uri.to_string(),
                state: self.state.map(str::to_string),
                response_mode: mode,
                login_form_post: self.login_form_post,
            }),
        }
    }
}

impl AuthzRequest {
    /// Parses an authorization request.
    ///
    /// `query` holds the OAuth parameters. `login_form` is the POST body of a
    /// login form submission, if this is one.
    ///
    /// # Errors
    ///
    /// Failures before the redirect URI is resolved carry no redirect
    /// context. Later failures carry one, with the response mode a success
    /// would have used. A client with a single registered URI may omit
    /// `redirect_uri`; that URI is then used.
    pub async fn parse(
        tenant: &str,
        query: &Params,
        login_form: Option<&Params>,
        validator: &dyn RequestValidator,
    ) -> Result<Self, RequestError> {
        let client_id = query.require("client_id")?;
        let requested_redirect = query.get("redirect_uri")?;
        let redirect_uri = validator
            .validate_redirect_uri(tenant, client_id, requested_redirect)
            .await?;

        // A repeated state cannot be echoed back.
        let state = query.get("state").map_err(|error| RequestError {
            error,
            redirect: Some(RedirectContext {
                redirect_uri: redirect_uri.clone(),
                state: None,
                response_mode: ResponseMode::Query,
                login_form_post: login_form.is_some(),
            }),
        })?;

        let redirect = Redirect {
            uri: &redirect_uri,
            state,
            login_form_post: login_form.is_some(),
        };

        let requested_mode = query
            .get("response_mode")
            .ok()
            .flatten()
            .and_then(|mode| mode.parse().ok());
        let early = redirect.error(requested_mode.unwrap_or(ResponseMode::Query));

        let response_types = query
            .require("response_type")
            .and_then(ResponseTypeSet::parse)
            .map_err(&early)?;

        let default_mode = response_types.default_response_mode();
        let fail = redirect.error(requested_mode.unwrap_or(default_mode));

        let response_mode = match query.get("response_mode").map_err(&fail)? {
            Some(mode) => mode
                .parse::<ResponseMode>()
                .map_err(redirect.error(default_mode))?,
            None => default_mode,
        };
        let implicit_or_hybrid = response_types.is_implicit_flow() || response_types.is_hybrid_flow();
        if response_mode == ResponseMode::Query && implicit_or_hybrid {
            return Err(redirect.error(default_mode)(OidcError::invalid_request(
                "response_mode 'query' cannot be used with implicit or hybrid flows",
            )));
        }

        let fail = redirect.error(response_mode);

        let scope = query
            .get("scope")
            .and_then(|scope| scope.map(ScopeSet::parse).transpose())
            .map_err(&fail)?
            .unwrap_or_default();
        if response_types.contains(ResponseType::IdToken) && !scope.has_openid() {
            return Err(fail(OidcError::invalid_scope(
                "response_type 'id_token' requires the 'openid' scope",
            )));
        }

        let nonce = query.get("nonce").map_err(&fail)?;
        if scope.has_openid() && implicit_or_hybrid && nonce.is_none() {
            return Err(fail(OidcError::invalid_request(
                "nonce is required for implicit and hybrid flows",
            )));
        }

        let prompt = query
            .get("prompt")
            .and_then(|prompt| prompt.map(PromptSet::parse).transpose())
            .map_err(&fail)?
            .unwrap_or_default();

        let id_token_hint = match query.get("id_token_hint").map_err(&fail)? {
            Some(hint) => Some(
                validator
                    .validate_id_token_hint(tenant, hint)
                    .await
                    .map_err(&fail)?,
            ),
            None => None,
        };

        let login = match login_form {
            Some(form) => Grant::parse_login(form).map_err(&fail)?,
            None => None,
        };

        Ok(Self {
            client: ClientInfo::new(client_id, Some(redirect_uri.clone())),
            response_types,
            scope,
            state: state.map(str::to_string),
            response_mode,
            nonce: nonce.map(str::to_string),
            prompt,
            id_token_hint,
            login,
            login_form_post: login_form.is_some(),
        })
    }

    /// Resolved redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        self.client.redirect_uri.as_deref().unwrap_or_default()
    }

    /// Delivery target for responses to this request.
    #[must_use]
    pub fn redirect_context(&self) -> RedirectContext {
        RedirectContext {
            redirect_uri: self.redirect_uri().to_string(),
            state: self.state.clone(),
            response_mode: self.response_mode,
            login_form_post: self.login_form_post,
        }
    }
}
