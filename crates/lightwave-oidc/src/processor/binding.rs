use axum::http::StatusCode;

use crate::error::OidcError;
use crate::request::RedirectContext;
use crate::types::ResponseMode;

/// Wire format of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarshalFormat {
    Json,
    Query,
    Fragment,
    /// Bare `oidcPostForm` form for page script.
    Form,
    /// Full HTML page.
    Html,
}

/// How a response must be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpBinding {
    pub status: StatusCode,
    pub format: MarshalFormat,
}

impl HttpBinding {
    /// 200 JSON.
    pub const SUCCESS: Self = Self::json(StatusCode::OK);

    #[must_use]
    pub const fn json(status: StatusCode) -> Self {
        Self {
            status,
            format: MarshalFormat::Json,
        }
    }

    #[must_use]
    pub const fn html() -> Self {
        Self {
            status: StatusCode::OK,
            format: MarshalFormat::Html,
        }
    }

    /// Binding for an authorization response.
    ///
    /// Without a redirect target, and for errors raised by a login form
    /// submission, the response is JSON. Otherwise the response mode decides;
    /// login form submissions are never redirected but answered with 200 so
    /// page script can act on the payload.
    #[must_use]
    pub fn for_authz(redirect: Option<&RedirectContext>, error: Option<&OidcError>) -> Self {
        let Some(redirect) = redirect.filter(|r| !r.redirect_uri.is_empty()) else {
            return Self::json(error.map_or(StatusCode::OK, OidcError::http_status));
        };
        let login_form_post = redirect.login_form_post;
        if let Some(error) = error
            && login_form_post
        {
            return Self::json(error.http_status());
        }

        let navigate = if login_form_post {
            StatusCode::OK
        } else {
            StatusCode::FOUND
        };
        match redirect.response_mode {
            ResponseMode::Query => Self {
                status: navigate,
                format: MarshalFormat::Query,
            },
            ResponseMode::Fragment => Self {
                status: navigate,
                format: MarshalFormat::Fragment,
            },
            ResponseMode::FormPost => Self {
                status: StatusCode::OK,
                format: if login_form_post {
                    MarshalFormat::Form
                } else {
                    MarshalFormat::Html
                },
            },
        }
    }

    /// Binding for a logout error: a query redirect to the post-logout URI
    /// when one was validated, JSON otherwise.
    #[must_use]
    pub fn for_logout_error(redirect: Option<&RedirectContext>, error: &OidcError) -> Self {
        match redirect {
            Some(_) => Self {
                status: StatusCode::FOUND,
                format: MarshalFormat::Query,
            },
            None => Self::json(error.http_status()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(mode: ResponseMode, login_form_post: bool) -> RedirectContext {
        RedirectContext {
            redirect_uri: "https://app/cb".to_string(),
            state: None,
            response_mode: mode,
            login_form_post,
        }
    }

    #[test]
    fn test_no_redirect_is_json() {
        assert_eq!(HttpBinding::for_authz(None, None), HttpBinding::SUCCESS);
        let err = OidcError::login_required("no session");
        let binding = HttpBinding::for_authz(None, Some(&err));
        assert_eq!(binding, HttpBinding::json(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_redirect_modes() {
        let binding = HttpBinding::for_authz(Some(&ctx(ResponseMode::Query, false)), None);
        assert_eq!(binding.status, StatusCode::FOUND);
        assert_eq!(binding.format, MarshalFormat::Query);

        let binding = HttpBinding::for_authz(Some(&ctx(ResponseMode::Fragment, true)), None);
        assert_eq!(binding.status, StatusCode::OK);
        assert_eq!(binding.format, MarshalFormat::Fragment);

        let binding = HttpBinding::for_authz(Some(&ctx(ResponseMode::FormPost, false)), None);
        assert_eq!(binding, HttpBinding::html());

        let binding = HttpBinding::for_authz(Some(&ctx(ResponseMode::FormPost, true)), None);
        assert_eq!(binding.format, MarshalFormat::Form);
    }

    #[test]
    fn test_errors_follow_response_mode() {
        let err = OidcError::invalid_scope("bad");
        let binding = HttpBinding::for_authz(Some(&ctx(ResponseMode::Fragment, false)), Some(&err));
        assert_eq!(binding.status, StatusCode::FOUND);
        assert_eq!(binding.format, MarshalFormat::Fragment);

        // login form errors stay on the page
        let err = OidcError::invalid_grant("Invalid user name or password");
        let binding = HttpBinding::for_authz(Some(&ctx(ResponseMode::Query, true)), Some(&err));
        assert_eq!(binding, HttpBinding::json(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_logout_error_binding() {
        let err = OidcError::server_error("boom");
        assert_eq!(
            HttpBinding::for_logout_error(None, &err),
            HttpBinding::json(StatusCode::INTERNAL_SERVER_ERROR)
        );
        let binding = HttpBinding::for_logout_error(Some(&ctx(ResponseMode::Query, false)), &err);
        assert_eq!(binding.status, StatusCode::FOUND);
    }
}
