//! Bearer credential validation.
//!
//! Tokens are HS256 JWTs issued elsewhere with claims
//! `{"user_id": …, "type": "access" | "refresh", "exp": …}`. Only access
//! tokens authenticate requests and connections.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lebensmittel_core::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication failure.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Signature, structure, or expiry check failed.
    #[error("invalid or expired token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    /// A well-formed token of the wrong kind (e.g. a refresh token).
    #[error("invalid token type")]
    WrongType,
}

/// Result alias for credential validation.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Token kind carried in the `type` claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived request credential.
    Access,
    /// Long-lived credential only good for minting new access tokens.
    Refresh,
}

/// JWT claims.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject.
    pub user_id: UserId,
    /// Token kind.
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

/// Resolves a bearer credential to the user it authenticates.
pub trait CredentialValidator: Send + Sync {
    /// Validate `token` and return its user.
    fn validate(&self, token: &str) -> Result<UserId>;
}

/// HS256 validator over a shared secret.
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    /// Create a validator for `secret`, allowing `leeway_secs` of clock skew on `exp`.
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decode and verify `token` without checking its kind.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

impl CredentialValidator for JwtValidator {
    fn validate(&self, token: &str) -> Result<UserId> {
        let claims = self.decode(token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::WrongType);
        }
        Ok(claims.user_id)
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator").finish_non_exhaustive()
    }
}

/// Sign `claims` with `secret`.
pub fn encode(secret: &str, claims: &Claims) -> Result<String> {
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Pull the credential out of a `token` query value or an `Authorization` header.
///
/// The query parameter wins. The header must carry a `Bearer ` prefix,
/// matched case-insensitively.
pub fn extract_credential<'a>(query: Option<&'a str>, header: Option<&'a str>) -> Option<&'a str> {
    if let Some(token) = query.filter(|t| !t.is_empty()) {
        return Some(token);
    }
    bearer_token(header?)
}

/// Strip a case-insensitive `Bearer ` prefix.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
