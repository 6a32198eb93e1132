//! JWT token generation and validation
//!
//! Tokens are HS256-signed. The signing key of every token is the global
//! secret followed by the owning user's secret, so rotating a user's secret
//! invalidates all tokens issued to that user and nobody else's.
//!
//! The combined key is rebuilt inside each call and dropped when the call
//! returns; it is never stored.

use base64::Engine;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, get_current_timestamp, Algorithm, DecodingKey,
    EncodingKey, Header, Validation,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use warden_core::AuthConfig;

/// Kind of a signed token, carried in the `typ` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Identity carried in both token kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Subject - user ID
    pub sub: String,
    /// User's email address
    pub email: String,
}

/// Full JWT claim set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: String,
    /// User's email address
    pub email: String,
    /// Audience
    pub aud: String,
    /// Token issuer
    pub iss: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
    /// JWT ID - unique per issued token
    pub jti: String,
    /// Token kind
    pub typ: TokenKind,
}

impl Claims {
    pub fn payload(&self) -> TokenPayload {
        TokenPayload {
            sub: self.sub.clone(),
            email: self.email.clone(),
        }
    }
}

/// Token errors
///
/// Every verification failure collapses into [`TokenError::InvalidToken`];
/// the reason is only logged.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Failed to encode JWT: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Token lifetime of {ttl}s overflows the expiry timestamp")]
    ExpiryOverflow { ttl: u64 },
}

/// Signs and verifies access and refresh tokens
#[derive(Clone)]
pub struct TokenIssuer {
    global_secret: String,
    issuer: String,
    audience: String,
    access_expiration_secs: u64,
    refresh_expiration_secs: u64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_expiration_secs", &self.access_expiration_secs)
            .field("refresh_expiration_secs", &self.refresh_expiration_secs)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            global_secret: config.jwt_secret.clone(),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            access_expiration_secs: config.access_expiration_secs,
            refresh_expiration_secs: config.refresh_expiration_secs,
        }
    }

    /// Lifetime of a token of the given kind, in seconds
    pub fn ttl(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.access_expiration_secs,
            TokenKind::Refresh => self.refresh_expiration_secs,
        }
    }

    fn signing_key(&self, user_secret: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.global_secret.len() + user_secret.len());
        key.extend_from_slice(self.global_secret.as_bytes());
        key.extend_from_slice(user_secret.as_bytes());
        key
    }

    /// Sign a token of `kind` for `payload` with the user's secret
    pub fn create_token(
        &self,
        payload: &TokenPayload,
        user_secret: &str,
        kind: TokenKind,
    ) -> Result<String, TokenError> {
        let now = get_current_timestamp();
        let ttl = self.ttl(kind);
        let exp = now
            .checked_add(ttl)
            .ok_or(TokenError::ExpiryOverflow { ttl })?;

        // Fresh jti keeps tokens issued within one second distinct
        let claims = Claims {
            sub: payload.sub.clone(),
            email: payload.email.clone(),
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
            typ: kind,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.signing_key(user_secret)),
        )?;

        Ok(token)
    }

    /// Verify signature, expiry, audience, issuer and kind
    pub fn verify_token(
        &self,
        token: &str,
        user_secret: &str,
        kind: TokenKind,
    ) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        // No grace period past `exp`
        validation.leeway = 0;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.signing_key(user_secret)),
            &validation,
        )
        .map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("Token expired"),
                ErrorKind::InvalidSignature => tracing::debug!("Token signature mismatch"),
                _ => tracing::debug!(error = %e, "Token rejected"),
            }
            TokenError::InvalidToken
        })?
        .claims;

        // Signature is fine; reject a refresh token used as access and vice versa
        if claims.typ != kind {
            tracing::debug!(
                expected = kind.as_str(),
                actual = claims.typ.as_str(),
                "Token kind mismatch"
            );
            return Err(TokenError::InvalidToken);
        }

        Ok(claims)
    }
}

/// Read `sub` and `email` from a token without verifying it.
///
/// The result is untrusted; it only names the user whose secret is then
/// used for [`TokenIssuer::verify_token`].
pub fn extract_payload(token: &str) -> Result<TokenPayload, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Only structure is checked here
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<TokenPayload>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Token payload could not be decoded");
            TokenError::InvalidToken
        })
}

/// 32 random bytes, base64-encoded
pub fn generate_user_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
