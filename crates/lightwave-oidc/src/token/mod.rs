//! JWT issuance and verification.
//!
//! Tokens are RS256-signed with the tenant's active signer key; the JWS `kid`
//! is the signer certificate serial number. Tokens are never stored: their
//! validity rests on signature and claim checks alone.

mod claims;
mod hash;
mod issuer;
mod jwks;

pub use claims::{BEARER, TokenClaims};
pub use hash::token_hash;
pub use issuer::{IssueRequest, IssuedTokens, TokenIssuer};
pub use jwks::{Jwk, Jwks};
