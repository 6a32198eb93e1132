//! Refresh token rotation
//!
//! Each user has at most one valid refresh token. Issuing a token replaces
//! the previous one in a single upsert, so a superseded token fails
//! [`RefreshTokenStore::is_valid`] even before it expires.

use super::token::{TokenIssuer, TokenKind};
use crate::error::AuthError;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;
use warden_core::{RefreshToken, RefreshTokenRepository};

/// Hex SHA-256 digest of a token, the form in which refresh tokens are stored
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct RefreshTokenStore {
    repository: Arc<dyn RefreshTokenRepository>,
    issuer: Arc<TokenIssuer>,
}

impl RefreshTokenStore {
    pub fn new(repository: Arc<dyn RefreshTokenRepository>, issuer: Arc<TokenIssuer>) -> Self {
        Self { repository, issuer }
    }

    /// Make `token` the user's only valid refresh token
    pub async fn issue(&self, user_id: Uuid, token: &str) -> Result<(), AuthError> {
        self.repository
            .upsert(RefreshToken::new(user_id, hash_token(token)))
            .await?;
        tracing::debug!(user_id = %user_id, "Refresh token stored");
        Ok(())
    }

    /// Whether `token` is the user's current refresh token and verifies
    /// under `user_secret`
    pub async fn is_valid(
        &self,
        token: &str,
        user_id: Uuid,
        user_secret: &str,
    ) -> Result<bool, AuthError> {
        let stored = match self.repository.find_by_user(user_id).await? {
            Some(stored) => stored,
            None => {
                tracing::debug!(user_id = %user_id, "No refresh token on record");
                return Ok(false);
            }
        };

        if stored.token_hash != hash_token(token) {
            tracing::debug!(user_id = %user_id, "Refresh token superseded");
            return Ok(false);
        }

        Ok(self
            .issuer
            .verify_token(token, user_secret, TokenKind::Refresh)
            .is_ok())
    }

    /// Drop the user's refresh token. Idempotent.
    pub async fn invalidate(&self, user_id: Uuid) -> Result<(), AuthError> {
        let existed = self.repository.delete_by_user(user_id).await?;
        tracing::debug!(user_id = %user_id, existed, "Refresh token invalidated");
        Ok(())
    }
}
