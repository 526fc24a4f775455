//! Claims carried by issued access and ID tokens.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{ScopeSet, TokenClass};

/// `token_type` claim value for bearer tokens.
pub const BEARER: &str = "Bearer";

/// Claims of a Lightwave access or ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iss: String,
    pub lightwave_token_class: TokenClass,
    pub token_type: String,

    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,

    #[serde(default, skip_serializing_if = "ScopeSet::is_empty")]
    pub scope: ScopeSet,

    pub exp: i64,
    pub iat: i64,
    pub jti: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lightwave_groups: Vec<String>,

    pub lightwave_tenant: String,
}

impl TokenClaims {
    /// First audience entry, which is the client the token was issued to.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.aud.first().map(String::as_str)
    }
}

// `aud` may be a single string or an array.
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(aud) => aud,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> TokenClaims {
        TokenClaims {
            sub: "alice@acme.local".to_string(),
            iss: "https://sts.example.com/acme".to_string(),
            lightwave_token_class: TokenClass::IdToken,
            token_type: BEARER.to_string(),
            aud: vec!["app1".to_string()],
            scope: ScopeSet::parse("openid").unwrap(),
            exp: 2_000_000_000,
            iat: 1_999_996_400,
            jti: "j1".to_string(),
            sid: Some("sid-1".to_string()),
            nonce: None,
            at_hash: None,
            c_hash: None,
            name: None,
            lightwave_groups: Vec::new(),
            lightwave_tenant: "acme".to_string(),
        }
    }

    #[test]
    fn test_empty_claims_are_omitted() {
        let json = serde_json::to_value(claims()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("nonce"));
        assert!(!obj.contains_key("at_hash"));
        assert!(!obj.contains_key("c_hash"));
        assert!(!obj.contains_key("lightwave_groups"));
        assert_eq!(obj["lightwave_token_class"], "id_token");
        assert_eq!(obj["aud"], serde_json::json!(["app1"]));
        assert_eq!(obj["scope"], "openid");
    }

    #[test]
    fn test_single_string_audience() {
        let mut json = serde_json::to_value(claims()).unwrap();
        json["aud"] = serde_json::json!("app9");
        let parsed: TokenClaims = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.client_id(), Some("app9"));
    }
}
