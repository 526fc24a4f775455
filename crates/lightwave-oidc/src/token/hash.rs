//! OIDC `at_hash` / `c_hash` computation.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// Returns base64url(left half of SHA-256(`value`)), the linking hash used
/// for `at_hash` and `c_hash` with RS256-signed ID tokens.
#[must_use]
pub fn token_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_hash_reference_value() {
        assert_eq!(
            token_hash("jHkWEdUXMU1BwAsC4vtUsZwnNvTIxEl0z9K3vx5KF0Y"),
            "77QmUPtjPfzWtF2AnpK9RQ"
        );
    }

    #[test]
    fn test_c_hash_reference_value() {
        assert_eq!(
            token_hash("Qcb0Orv1zh30vL1MPRsbm-diHiMwcLyZvn1arpZv-Jxf_11jnpEX3Tgfvk"),
            "LDktKdoQak3Pk0cnXxCltA"
        );
    }

    #[test]
    fn test_hash_is_first_sixteen_bytes() {
        let value = "some-access-token";
        let digest = Sha256::digest(value.as_bytes());
        let decoded = URL_SAFE_NO_PAD.decode(token_hash(value)).unwrap();
        assert_eq!(decoded.len(), 16);
        assert_eq!(decoded.as_slice(), &digest[..16]);
    }
}
