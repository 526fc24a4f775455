//! OIDC responses and their wire encodings.
//!
//! A processor produces an [`OidcResponse`] plus an [`HttpBinding`]; the
//! binding picks one of the encodings below and [`encode_response`] renders
//! it:
//!
//! | Format | Body | Location |
//! |---|---|---|
//! | JSON | response object | - |
//! | Query | redirect URL (only when not redirecting) | `redirect_uri?params` |
//! | Fragment | redirect URL (only when not redirecting) | `redirect_uri#params` |
//! | Form | bare `oidcPostForm` form | - |
//! | HTML | auto-submitting page, or the logout page | - |

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use url::Url;

use crate::error::OidcError;
use crate::processor::{HttpBinding, MarshalFormat};
use crate::token::{IssuedTokens, Jwks};
use crate::types::scopes;

/// Id of the form carrying form-post responses.
pub const POST_FORM_ID: &str = "oidcPostForm";

/// Outcome of an authorization request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthzResponse {
    #[serde(skip)]
    pub redirect_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl AuthzResponse {
    /// Response carrying the issued code and/or tokens.
    #[must_use]
    pub fn new(
        redirect_uri: impl Into<String>,
        state: Option<String>,
        code: Option<String>,
        tokens: IssuedTokens,
    ) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            code,
            access_token: tokens.access_token,
            token_type: tokens.token_type.map(str::to_string),
            expires_in: tokens.expires_in,
            id_token: tokens.id_token,
            state,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(6);
        push(&mut params, "code", self.code.as_deref());
        push(&mut params, "access_token", self.access_token.as_deref());
        push(&mut params, "token_type", self.token_type.as_deref());
        if let Some(expires_in) = self.expires_in {
            params.push(("expires_in", expires_in.to_string()));
        }
        push(&mut params, "id_token", self.id_token.as_deref());
        push(&mut params, "state", self.state.as_deref());
        params
    }
}

/// Token endpoint success body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl From<IssuedTokens> for TokenResponse {
    fn from(tokens: IssuedTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            token_type: tokens.token_type.map(str::to_string),
            expires_in: tokens.expires_in,
            id_token: tokens.id_token,
        }
    }
}

/// OAuth error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Where the error is redirected to, if anywhere.
    #[serde(skip)]
    pub redirect_uri: Option<String>,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: &OidcError, redirect_uri: Option<String>, state: Option<String>) -> Self {
        Self {
            error: error.error_code().as_str().to_string(),
            error_description: error.description().to_string(),
            state,
            redirect_uri,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("error", self.error.clone()),
            ("error_description", self.error_description.clone()),
        ];
        push(&mut params, "state", self.state.as_deref());
        params
    }
}

/// Front-channel logout page contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogoutResponse {
    /// Client logout URIs, each loaded in a hidden iframe.
    pub logout_uris: Vec<String>,
    /// Post-logout redirect (with `state`), navigated to after the iframes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_logout_redirect_uri: Option<String>,
}

/// Discovery document served at `/.well-known/openid-configuration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub end_session_endpoint: String,
    pub jwks_uri: String,
    pub response_types_supported: Vec<&'static str>,
    pub response_modes_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub subject_types_supported: Vec<&'static str>,
    pub id_token_signing_alg_values_supported: Vec<&'static str>,
    pub scopes_supported: Vec<&'static str>,
    pub claims_supported: Vec<&'static str>,
    pub frontchannel_logout_supported: bool,
    pub frontchannel_logout_session_supported: bool,
}

impl MetadataDocument {
    /// Metadata for the tenant published under `issuer`.
    #[must_use]
    pub fn new(issuer: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{issuer}/oidc/authorize"),
            token_endpoint: format!("{issuer}/oidc/token"),
            end_session_endpoint: format!("{issuer}/oidc/logout"),
            jwks_uri: format!("{issuer}/oidc/jwks"),
            response_types_supported: vec![
                "code",
                "id_token",
                "token",
                "id_token token",
                "code id_token",
                "code token",
                "code id_token token",
                "none",
            ],
            response_modes_supported: vec!["query", "fragment", "form_post"],
            grant_types_supported: vec!["authorization_code", "implicit", "password"],
            subject_types_supported: vec!["public"],
            id_token_signing_alg_values_supported: vec!["RS256"],
            scopes_supported: vec![
                scopes::OPENID,
                scopes::OFFLINE_ACCESS,
                scopes::PROFILE,
                scopes::EMAIL,
                scopes::ID_GROUPS,
                scopes::AT_GROUPS,
            ],
            claims_supported: vec![
                "sub",
                "iss",
                "aud",
                "exp",
                "iat",
                "jti",
                "sid",
                "nonce",
                "at_hash",
                "c_hash",
                "name",
                "scope",
                "lightwave_token_class",
                "lightwave_groups",
                "lightwave_tenant",
            ],
            frontchannel_logout_supported: true,
            frontchannel_logout_session_supported: true,
        }
    }
}

/// A response produced by the request processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OidcResponse {
    Authz(AuthzResponse),
    Token(TokenResponse),
    Error(ErrorResponse),
    Logout(LogoutResponse),
    Metadata(Box<MetadataDocument>),
    Jwks(Jwks),
}

impl OidcResponse {
    /// The redirect target for redirect-style encodings.
    fn redirect_uri(&self) -> Option<&str> {
        match self {
            Self::Authz(resp) => Some(resp.redirect_uri.as_str()),
            Self::Error(resp) => resp.redirect_uri.as_deref(),
            _ => None,
        }
    }

    /// Parameters for query, fragment and form encodings.
    fn params(&self) -> Result<Vec<(&'static str, String)>, OidcError> {
        match self {
            Self::Authz(resp) => Ok(resp.params()),
            Self::Error(resp) => Ok(resp.params()),
            _ => Err(OidcError::encode(
                "response cannot be encoded as parameters",
            )),
        }
    }

    /// `true` for error responses.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// A rendered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub location: Option<String>,
    pub body: String,
}

impl EncodedResponse {
    fn json(status: StatusCode, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            location: None,
            body,
        }
    }
}

impl IntoResponse for EncodedResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.content_type),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if let Some(location) = self.location
            && let Ok(value) = HeaderValue::from_str(&location)
        {
            headers.insert(header::LOCATION, value);
        }
        response
    }
}

/// Renders `response` as `binding` prescribes.
///
/// # Errors
///
/// `Encode` if the response has no redirect target for a redirect-style
/// format, the target is not a valid URL, or JSON serialization fails.
pub fn encode_response(
    response: &OidcResponse,
    binding: &HttpBinding,
) -> Result<EncodedResponse, OidcError> {
    match binding.format {
        MarshalFormat::Json => {
            let body = serde_json::to_string(response)
                .map_err(|e| OidcError::encode(format!("JSON encoding failed: {e}")))?;
            Ok(EncodedResponse::json(binding.status, body))
        }
        MarshalFormat::Query | MarshalFormat::Fragment => {
            let url = redirect_url(response, binding.format)?;
            Ok(redirect_or_body(binding.status, url))
        }
        MarshalFormat::Form => Ok(html(binding.status, post_form(response)?)),
        MarshalFormat::Html => match response {
            OidcResponse::Logout(logout) => Ok(html(binding.status, logout_page(logout))),
            _ => Ok(html(binding.status, post_form_page(&post_form(response)?))),
        },
    }
}

fn redirect_url(response: &OidcResponse, format: MarshalFormat) -> Result<String, OidcError> {
    let target = response
        .redirect_uri()
        .ok_or_else(|| OidcError::encode("response has no redirect target"))?;
    let mut url = Url::parse(target)
        .map_err(|e| OidcError::encode(format!("invalid redirect URI: {e}")))?;
    let params = response.params()?;

    if format == MarshalFormat::Fragment {
        let fragment = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();
        url.set_fragment(Some(&fragment));
    } else {
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    }
    Ok(url.into())
}

// A login form submission gets the URL as the body so page script can navigate.
fn redirect_or_body(status: StatusCode, url: String) -> EncodedResponse {
    if status.is_redirection() {
        EncodedResponse {
            status,
            content_type: "text/plain; charset=utf-8",
            location: Some(url),
            body: String::new(),
        }
    } else {
        EncodedResponse {
            status,
            content_type: "text/plain; charset=utf-8",
            location: None,
            body: url,
        }
    }
}

fn html(status: StatusCode, body: String) -> EncodedResponse {
    EncodedResponse {
        status,
        content_type: "text/html; charset=utf-8",
        location: None,
        body,
    }
}

fn post_form(response: &OidcResponse) -> Result<String, OidcError> {
    let action = response
        .redirect_uri()
        .ok_or_else(|| OidcError::encode("response has no form action"))?;
    let mut form = String::with_capacity(512);
    form.push_str("\n    <form id=\"");
    form.push_str(POST_FORM_ID);
    form.push_str("\" method=\"post\" action=\"");
    form.push_str(&html_escape(action));
    form.push_str("\">");
    for (name, value) in response.params()? {
        form.push_str("<input type=\"hidden\" name=\"");
        form.push_str(name);
        form.push_str("\" value=\"");
        form.push_str(&html_escape(&value));
        form.push_str("\"/>");
    }
    form.push_str("\n    </form>");
    Ok(form)
}

fn post_form_page(form: &str) -> String {
    let mut page = String::with_capacity(form.len() + 256);
    page.push_str("<html>\n  <head><title>Code Form Post</title></head>\n");
    page.push_str("  <body onload=\"document.getElementById('");
    page.push_str(POST_FORM_ID);
    page.push_str("').submit(); \">");
    page.push_str(form);
    page.push_str("\n  </body>\n</html>");
    page
}

fn logout_page(logout: &LogoutResponse) -> String {
    let mut page = String::with_capacity(512);
    page.push_str("<!DOCTYPE html>\n<html>\n<head><title>Logout</title></head>\n<body>\n");
    for uri in &logout.logout_uris {
        page.push_str("<iframe src=\"");
        page.push_str(&html_escape(uri));
        page.push_str("\" style=\"display:none\"></iframe>\n");
    }
    if let Some(target) = &logout.post_logout_redirect_uri {
        // Runs after the iframes have loaded.
        page.push_str("<script>window.onload = function() { window.location.replace(");
        page.push_str(&script_string(target));
        page.push_str("); };</script>\n");
    }
    page.push_str("</body>\n</html>");
    page
}

/// A JavaScript string literal that cannot close the surrounding script.
fn script_string(value: &str) -> String {
    serde_json::Value::from(value)
        .to_string()
        .replace("</", "<\\/")
}

fn push(params: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<&str>) {
    if let Some(value) = value {
        params.push((name, value.to_string()));
    }
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
