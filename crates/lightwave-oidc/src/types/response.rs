//! Response type and response mode values.

use std::fmt;
use std::str::FromStr;

use crate::error::OidcError;

/// A single `response_type` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    Code,
    Token,
    IdToken,
    None,
}

impl ResponseType {
    const fn bit(self) -> u8 {
        match self {
            Self::Code => 0b0001,
            Self::Token => 0b0010,
            Self::IdToken => 0b0100,
            Self::None => 0b1000,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Token => "token",
            Self::IdToken => "id_token",
            Self::None => "none",
        }
    }
}

impl FromStr for ResponseType {
    type Err = OidcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "token" => Ok(Self::Token),
            "id_token" => Ok(Self::IdToken),
            "none" => Ok(Self::None),
            other => Err(OidcError::unsupported_response_type(format!(
                "Unsupported response_type '{other}'"
            ))),
        }
    }
}

/// How the response types of a request combine into an OAuth 2.0 flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFlow {
    /// `code`
    Authorization,
    /// `token`, `id_token`, `id_token token`
    Implicit,
    /// `code` with `token` and/or `id_token`
    Hybrid,
    /// `none`
    None,
}

/// The set of response types requested in one authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResponseTypeSet(u8);

impl ResponseTypeSet {
    const ORDER: [ResponseType; 4] = [
        ResponseType::Code,
        ResponseType::IdToken,
        ResponseType::Token,
        ResponseType::None,
    ];

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn of(types: &[ResponseType]) -> Self {
        types.iter().fold(Self::empty(), |set, t| set.with(*t))
    }

    #[must_use]
    pub const fn with(self, t: ResponseType) -> Self {
        Self(self.0 | t.bit())
    }

    #[must_use]
    pub const fn contains(self, t: ResponseType) -> bool {
        self.0 & t.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parses a space-delimited `response_type` parameter.
    ///
    /// # Errors
    ///
    /// `invalid_request` if the value is empty or combines `none` with other
    /// types; `unsupported_response_type` for unknown values.
    pub fn parse(value: &str) -> Result<Self, OidcError> {
        let mut set = Self::empty();
        for part in value.split_whitespace() {
            set = set.with(part.parse()?);
        }
        if set.is_empty() {
            return Err(OidcError::invalid_request("response_type is required"));
        }
        if set.flow().is_none() {
            return Err(OidcError::invalid_request(
                "response_type 'none' cannot be combined with other response types",
            ));
        }
        Ok(set)
    }

    /// Classifies the set. Returns `None` for the empty set and for `none`
    /// combined with anything else.
    #[must_use]
    pub fn flow(self) -> Option<ResponseFlow> {
        let code = self.contains(ResponseType::Code);
        let token = self.contains(ResponseType::Token);
        let id_token = self.contains(ResponseType::IdToken);
        let none = self.contains(ResponseType::None);

        match (none, code, token || id_token) {
            (true, false, false) => Some(ResponseFlow::None),
            (true, _, _) => None,
            (false, true, false) => Some(ResponseFlow::Authorization),
            (false, true, true) => Some(ResponseFlow::Hybrid),
            (false, false, true) => Some(ResponseFlow::Implicit),
            (false, false, false) => None,
        }
    }

    #[must_use]
    pub fn is_authz_flow(self) -> bool {
        self.flow() == Some(ResponseFlow::Authorization)
    }

    #[must_use]
    pub fn is_implicit_flow(self) -> bool {
        self.flow() == Some(ResponseFlow::Implicit)
    }

    #[must_use]
    pub fn is_hybrid_flow(self) -> bool {
        self.flow() == Some(ResponseFlow::Hybrid)
    }

    #[must_use]
    pub fn is_none_response(self) -> bool {
        self.flow() == Some(ResponseFlow::None)
    }

    /// Response mode used when the request does not name one.
    #[must_use]
    pub fn default_response_mode(self) -> ResponseMode {
        match self.flow() {
            Some(ResponseFlow::Implicit | ResponseFlow::Hybrid) => ResponseMode::Fragment,
            _ => ResponseMode::Query,
        }
    }
}

impl fmt::Display for ResponseTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for t in Self::ORDER.iter().filter(|t| self.contains(**t)) {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(t.as_str())?;
            first = false;
        }
        Ok(())
    }
}

/// How authorization response parameters are delivered to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseMode {
    Query,
    Fragment,
    FormPost,
}

impl ResponseMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Fragment => "fragment",
            Self::FormPost => "form_post",
        }
    }
}

impl FromStr for ResponseMode {
    type Err = OidcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Self::Query),
            "fragment" => Ok(Self::Fragment),
            "form_post" => Ok(Self::FormPost),
            other => Err(OidcError::invalid_request(format!(
                "Unsupported response_mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OidcErrorCode;

    fn flow_of(value: &str) -> ResponseFlow {
        ResponseTypeSet::parse(value).unwrap().flow().unwrap()
    }

    #[test]
    fn test_flow_classification() {
        assert_eq!(flow_of("code"), ResponseFlow::Authorization);
        assert_eq!(flow_of("token"), ResponseFlow::Implicit);
        assert_eq!(flow_of("id_token"), ResponseFlow::Implicit);
        assert_eq!(flow_of("id_token token"), ResponseFlow::Implicit);
        assert_eq!(flow_of("code token"), ResponseFlow::Hybrid);
        assert_eq!(flow_of("code id_token"), ResponseFlow::Hybrid);
        assert_eq!(flow_of("token code id_token"), ResponseFlow::Hybrid);
        assert_eq!(flow_of("none"), ResponseFlow::None);
    }

    #[test]
    fn test_none_cannot_combine() {
        for value in ["none code", "none token", "id_token none"] {
            let err = ResponseTypeSet::parse(value).unwrap_err();
            assert_eq!(err.error_code(), OidcErrorCode::InvalidRequest, "{value}");
        }
        let set = ResponseTypeSet::of(&[ResponseType::None, ResponseType::Code]);
        assert_eq!(set.flow(), None);
    }

    #[test]
    fn test_unknown_and_empty_response_type() {
        let err = ResponseTypeSet::parse("code device").unwrap_err();
        assert_eq!(err.error_code(), OidcErrorCode::UnsupportedResponseType);

        let err = ResponseTypeSet::parse("   ").unwrap_err();
        assert_eq!(err.error_code(), OidcErrorCode::InvalidRequest);
    }

    #[test]
    fn test_default_response_mode() {
        let mode = |v| ResponseTypeSet::parse(v).unwrap().default_response_mode();
        assert_eq!(mode("code"), ResponseMode::Query);
        assert_eq!(mode("none"), ResponseMode::Query);
        assert_eq!(mode("id_token token"), ResponseMode::Fragment);
        assert_eq!(mode("code id_token"), ResponseMode::Fragment);
    }

    #[test]
    fn test_display_is_canonical() {
        let set = ResponseTypeSet::parse("token id_token code").unwrap();
        assert_eq!(set.to_string(), "code id_token token");
    }

    #[test]
    fn test_response_mode_parse() {
        assert_eq!("form_post".parse::<ResponseMode>().unwrap(), ResponseMode::FormPost);
        assert!("web_message".parse::<ResponseMode>().is_err());
    }
}
