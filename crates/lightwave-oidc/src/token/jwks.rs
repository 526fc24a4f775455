//! JSON Web Key Set export of tenant signer certificates.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::RsaPublicKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};

use crate::error::OidcError;
use crate::identity::SignerCertificate;

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// RSA signature verification key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,

    #[serde(rename = "use")]
    pub use_: String,

    pub alg: String,

    /// Signer certificate serial number.
    pub kid: String,

    /// RSA modulus (base64url encoded).
    pub n: String,

    /// RSA exponent (base64url encoded).
    pub e: String,
}

impl Jwk {
    /// Builds the verification key for a signer certificate.
    ///
    /// # Errors
    ///
    /// `ServerError` if the certificate's public key is not an RSA PEM key.
    pub fn from_certificate(cert: &SignerCertificate) -> Result<Self, OidcError> {
        let key = parse_public_key(&cert.public_key_pem)?;
        Ok(Self {
            kty: "RSA".to_string(),
            use_: "sig".to_string(),
            alg: "RS256".to_string(),
            kid: cert.serial_number.clone(),
            n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
        })
    }
}

impl Jwks {
    /// Builds a key set from certificates, in order.
    ///
    /// # Errors
    ///
    /// Fails if any certificate key cannot be parsed.
    pub fn from_certificates(certs: &[SignerCertificate]) -> Result<Self, OidcError> {
        let keys = certs
            .iter()
            .map(Jwk::from_certificate)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keys })
    }
}

/// Accepts SPKI (`PUBLIC KEY`) and PKCS#1 (`RSA PUBLIC KEY`) PEM.
fn parse_public_key(pem: &str) -> Result<RsaPublicKey, OidcError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| OidcError::server_error(format!("Invalid signer certificate key: {e}")))
}
