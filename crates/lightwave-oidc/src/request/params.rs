use url::form_urlencoded;

use crate::error::OidcError;

/// Raw `application/x-www-form-urlencoded` parameters of one request.
///
/// Keeps every occurrence so repeated parameters can be rejected
/// (RFC 6749 section 3.1). Empty values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// Decodes a query string or form body.
    #[must_use]
    pub fn parse(encoded: &str) -> Self {
        Self(
            form_urlencoded::parse(encoded.as_bytes())
                .into_owned()
                .collect(),
        )
    }

    /// Looks up a parameter.
    ///
    /// # Errors
    ///
    /// `invalid_request` if the parameter occurs more than once.
    pub fn get(&self, name: &str) -> Result<Option<&str>, OidcError> {
        let mut found = None;
        for (key, value) in &self.0 {
            if key == name {
                if found.is_some() {
                    return Err(OidcError::invalid_request(format!(
                        "Parameter '{name}' must not be repeated"
                    )));
                }
                found = Some(value.as_str());
            }
        }
        Ok(found.filter(|v| !v.is_empty()))
    }

    /// Looks up a mandatory parameter.
    ///
    /// # Errors
    ///
    /// `invalid_request` if the parameter is missing, empty or repeated.
    pub fn require(&self, name: &str) -> Result<&str, OidcError> {
        self.get(name)?.ok_or_else(|| {
            OidcError::invalid_request(format!("Missing required parameter '{name}'"))
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
