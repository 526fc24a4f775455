//! Token construction, RS256 signing and verification.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::OidcError;
use crate::identity::{Authenticator, IdentityConfig, UserAttribute, UserAttributes};
use crate::types::{ResponseType, ResponseTypeSet, ScopeSet, SessionId, TokenClass, UserId, scopes};

use super::claims::{BEARER, TokenClaims};
use super::hash::token_hash;
use super::jwks::Jwks;

/// Inputs for one token issuance.
#[derive(Debug, Clone, Copy)]
pub struct IssueRequest<'a> {
    pub tenant: &'a str,
    pub client_id: &'a str,
    /// Response types of an authorization request; `None` for the token
    /// endpoint.
    pub response_types: Option<ResponseTypeSet>,
    pub scope: &'a ScopeSet,
    pub nonce: Option<&'a str>,
    pub user: &'a UserId,
    /// Authorization code issued alongside (hybrid flow).
    pub code: Option<&'a str>,
    pub session_id: Option<&'a SessionId>,
}

/// Signed tokens produced by [`TokenIssuer::issue_tokens`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub token_type: Option<&'static str>,
    pub expires_in: Option<u64>,
}

/// Builds, signs and verifies tenant tokens.
///
/// Signing material and policy are fetched from the identity configuration
/// on every call; the issuer itself holds no per-tenant state.
#[derive(Clone)]
pub struct TokenIssuer {
    identity: Arc<dyn IdentityConfig>,
    authenticator: Arc<dyn Authenticator>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityConfig>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            identity,
            authenticator,
        }
    }

    /// Tenant issuer URL.
    ///
    /// # Errors
    ///
    /// Fails if the tenant is unknown.
    pub async fn issuer(&self, tenant: &str) -> Result<String, OidcError> {
        Ok(self.identity.issuer(tenant).await?)
    }

    /// Public keys of every registered signer certificate.
    ///
    /// # Errors
    ///
    /// Fails if the tenant is unknown or a certificate key is unusable.
    pub async fn signers(&self, tenant: &str) -> Result<Jwks, OidcError> {
        let certs = self.identity.signer_certs(tenant).await?;
        Jwks::from_certificates(&certs)
    }

    /// Mints the tokens a request is entitled to.
    ///
    /// For authorization requests the response types decide which tokens are
    /// built. For token-endpoint requests an access token is always built,
    /// plus an ID token when the scope contains `openid`.
    ///
    /// # Errors
    ///
    /// Collaborator failures, `Signature` if signing fails.
    pub async fn issue_tokens(&self, req: IssueRequest<'_>) -> Result<IssuedTokens, OidcError> {
        let (want_access, want_id) = match req.response_types {
            Some(types) => (
                types.contains(ResponseType::Token),
                types.contains(ResponseType::IdToken),
            ),
            None => (true, req.scope.has_openid()),
        };
        if !want_access && !want_id {
            return Ok(IssuedTokens::default());
        }

        let policy = self.identity.token_policy(req.tenant).await?;
        let issuer = self.identity.issuer(req.tenant).await?;
        let key = self.identity.signer_key(req.tenant).await?;
        let cert = self.identity.signer_cert(req.tenant).await?;
        let attributes = self
            .authenticator
            .user_attributes(
                req.tenant,
                req.user,
                &[
                    UserAttribute::Subject,
                    UserAttribute::DisplayName,
                    UserAttribute::Groups,
                ],
            )
            .await?;

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key_pem.as_bytes())
            .map_err(|e| OidcError::signature(format!("Invalid signer key: {e}")))?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(cert.serial_number.clone());

        let lifetime = policy.max_bearer_token_lifetime.as_secs();
        let iat = OffsetDateTime::now_utc().unix_timestamp();
        let exp = iat.saturating_add(i64::try_from(lifetime).unwrap_or(i64::MAX));

        let base = TokenClaims {
            sub: attributes
                .subject
                .clone()
                .unwrap_or_else(|| req.user.to_string()),
            iss: issuer,
            lightwave_token_class: TokenClass::AccessToken,
            token_type: BEARER.to_string(),
            aud: vec![req.client_id.to_string()],
            scope: req.scope.clone(),
            exp,
            iat,
            jti: String::new(),
            sid: req.session_id.map(|sid| sid.as_str().to_string()),
            nonce: None,
            at_hash: None,
            c_hash: None,
            name: None,
            lightwave_groups: Vec::new(),
            lightwave_tenant: req.tenant.to_string(),
        };

        let mut issued = IssuedTokens {
            token_type: Some(BEARER),
            expires_in: Some(lifetime),
            ..IssuedTokens::default()
        };

        if want_access {
            let claims = TokenClaims {
                jti: Uuid::new_v4().to_string(),
                lightwave_groups: groups_for(&attributes, req.scope, scopes::AT_GROUPS),
                ..base.clone()
            };
            issued.access_token = Some(sign(&header, &claims, &encoding_key)?);
        }

        if want_id {
            let claims = TokenClaims {
                lightwave_token_class: TokenClass::IdToken,
                jti: Uuid::new_v4().to_string(),
                nonce: req.nonce.map(str::to_string),
                at_hash: issued.access_token.as_deref().map(token_hash),
                c_hash: req.code.map(token_hash),
                name: attributes.display_name.clone(),
                lightwave_groups: groups_for(&attributes, req.scope, scopes::ID_GROUPS),
                ..base
            };
            issued.id_token = Some(sign(&header, &claims, &encoding_key)?);
        }

        tracing::debug!(
            tenant = req.tenant,
            client_id = req.client_id,
            access_token = want_access,
            id_token = want_id,
            "Issued tokens"
        );
        Ok(issued)
    }

    /// Verifies a compact JWS issued by this tenant and returns its claims.
    ///
    /// Candidate keys are the tenant's signer certificates, narrowed to the
    /// header `kid` when one is present; each is tried until one verifies.
    /// Expiry is only checked when `check_expiry` is set, with the tenant's
    /// clock tolerance as leeway.
    ///
    /// # Errors
    ///
    /// `TokenFormat` for structural problems, a wrong algorithm or failed
    /// claim checks; `SignatureValidation` if no candidate key verifies.
    pub async fn validate_token(
        &self,
        tenant: &str,
        token: &str,
        check_expiry: bool,
    ) -> Result<TokenClaims, OidcError> {
        if token.split('.').count() != 3 {
            return Err(OidcError::token_format(
                "Token must be a compact JWS with exactly one signature",
            ));
        }
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| OidcError::token_format(format!("Malformed token header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(OidcError::token_format(format!(
                "Unsupported token algorithm {:?}",
                header.alg
            )));
        }

        let policy = self.identity.token_policy(tenant).await?;
        let issuer = self.identity.issuer(tenant).await?;
        let certs = self.identity.signer_certs(tenant).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        validation.validate_exp = check_expiry;
        validation.leeway = policy.clock_tolerance.as_secs();

        let candidates = certs
            .iter()
            .filter(|cert| header.kid.as_deref().is_none_or(|kid| kid == cert.serial_number));

        for cert in candidates {
            let key = match DecodingKey::from_rsa_pem(cert.public_key_pem.as_bytes()) {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(tenant, kid = %cert.serial_number, error = %e, "Unusable signer certificate");
                    continue;
                }
            };
            match jsonwebtoken::decode::<TokenClaims>(token, &key, &validation) {
                Ok(data) => {
                    if data.claims.lightwave_tenant != tenant {
                        return Err(OidcError::token_format("Token was issued for another tenant"));
                    }
                    return Ok(data.claims);
                }
                Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => continue,
                Err(e) => return Err(OidcError::token_format(e.to_string())),
            }
        }

        Err(OidcError::signature_validation(
            "No registered signer verifies the token",
        ))
    }
}

fn groups_for(attributes: &UserAttributes, scope: &ScopeSet, wanted: &str) -> Vec<String> {
    if scope.contains(wanted) {
        attributes.groups.clone()
    } else {
        Vec::new()
    }
}

fn sign(header: &Header, claims: &TokenClaims, key: &EncodingKey) -> Result<String, OidcError> {
    jsonwebtoken::encode(header, claims, key)
        .map_err(|e| OidcError::signature(format!("Failed to sign token: {e}")))
}
