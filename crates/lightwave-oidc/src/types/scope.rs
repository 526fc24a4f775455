//! Scope and prompt values.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::OidcError;

/// Standard scope values.
pub mod scopes {
    pub const OPENID: &str = "openid";
    pub const OFFLINE_ACCESS: &str = "offline_access";
    pub const PROFILE: &str = "profile";
    pub const EMAIL: &str = "email";
    /// Include group memberships in the ID token.
    pub const ID_GROUPS: &str = "id_groups";
    /// Include group memberships in the access token.
    pub const AT_GROUPS: &str = "at_groups";
}

/// An ordered, duplicate-free set of scope values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Parses a space-delimited `scope` parameter.
    ///
    /// # Errors
    ///
    /// `invalid_scope` if a value contains characters outside the RFC 6749
    /// scope-token grammar.
    pub fn parse(value: &str) -> Result<Self, OidcError> {
        let mut set = Self::empty();
        for part in value.split_whitespace() {
            if !part
                .chars()
                .all(|c| c == '!' || ('#'..='[').contains(&c) || (']'..='~').contains(&c))
            {
                return Err(OidcError::invalid_scope(format!(
                    "Scope value '{part}' contains invalid characters"
                )));
            }
            set.insert(part);
        }
        Ok(set)
    }

    pub fn insert(&mut self, scope: &str) {
        if !self.contains(scope) {
            self.0.push(scope.to_string());
        }
    }

    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.iter().any(|s| s == scope)
    }

    /// Returns `true` if this is an OpenID Connect request.
    #[must_use]
    pub fn has_openid(&self) -> bool {
        self.contains(scopes::OPENID)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl Serialize for ScopeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ScopeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A single `prompt` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prompt {
    None,
    Login,
    Consent,
    SelectAccount,
}

impl Prompt {
    const fn bit(self) -> u8 {
        match self {
            Self::None => 0b0001,
            Self::Login => 0b0010,
            Self::Consent => 0b0100,
            Self::SelectAccount => 0b1000,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Login => "login",
            Self::Consent => "consent",
            Self::SelectAccount => "select_account",
        }
    }
}

/// The set of `prompt` values requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PromptSet(u8);

impl PromptSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn with(self, p: Prompt) -> Self {
        Self(self.0 | p.bit())
    }

    #[must_use]
    pub const fn contains(self, p: Prompt) -> bool {
        self.0 & p.bit() != 0
    }

    /// Parses a space-delimited `prompt` parameter.
    ///
    /// # Errors
    ///
    /// `invalid_request` for unknown values or `none` combined with others.
    pub fn parse(value: &str) -> Result<Self, OidcError> {
        let mut set = Self::empty();
        for part in value.split_whitespace() {
            let prompt = match part {
                "none" => Prompt::None,
                "login" => Prompt::Login,
                "consent" => Prompt::Consent,
                "select_account" => Prompt::SelectAccount,
                other => {
                    return Err(OidcError::invalid_request(format!(
                        "Unsupported prompt value '{other}'"
                    )));
                }
            };
            set = set.with(prompt);
        }
        if set.contains(Prompt::None) && set.0 != Prompt::None.bit() {
            return Err(OidcError::invalid_request(
                "prompt 'none' cannot be combined with other values",
            ));
        }
        Ok(set)
    }
}
