//! Warden Core - Domain models, repository traits, and shared types
//!
//! This crate defines the core abstractions used throughout Warden:
//! - User and refresh token records
//! - Repository traits implemented by the storage backends
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseBackend, DatabaseConfig, LoggingConfig,
    PasswordHashConfig, ServerConfig,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for storage and configuration
#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WardenError>;

// ============================================================================
// Users
// ============================================================================

/// Normalize an email address for storage and lookup.
///
/// Emails are compared case-insensitively, so `A@X.com` and `a@x.com`
/// resolve to the same account.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User account record
///
/// `password_hash` and `secret` never leave the service; API responses are
/// built from [`UserPublic`].
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    /// Stable, server-generated identifier
    pub id: Uuid,
    /// Normalized email address (unique)
    pub email: String,
    /// Display name
    pub name: String,
    /// PHC-format password digest
    pub password_hash: String,
    /// Per-user signing secret (32 random bytes, base64)
    pub secret: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a fresh id and timestamps
    pub fn new(
        email: &str,
        name: impl Into<String>,
        password_hash: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            name: name.into(),
            password_hash: password_hash.into(),
            secret: secret.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Public projection of this user
    pub fn to_public(&self) -> UserPublic {
        UserPublic::from(self)
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password_hash", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// User information safe to return to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserPublic {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// ============================================================================
// Refresh Tokens
// ============================================================================

/// The single active refresh token of a user
///
/// Only the SHA-256 digest of the signed token is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new(user_id: Uuid, token_hash: impl Into<String>) -> Self {
        Self {
            user_id,
            token_hash: token_hash.into(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Repository Traits
// ============================================================================

/// User persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user.
    ///
    /// Fails with [`WardenError::Conflict`] when the email is already taken;
    /// an existing user is never overwritten.
    async fn create(&self, user: User) -> Result<User>;

    /// Find a user by (normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Find a user by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Replace the user's signing secret.
    ///
    /// Returns `false` when no such user exists.
    async fn update_secret(&self, id: Uuid, secret: &str) -> Result<bool>;

    /// Backend health check
    async fn ping(&self) -> Result<()>;
}

/// Refresh token persistence, keyed by user id
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Insert or replace the user's refresh token in a single operation
    async fn upsert(&self, token: RefreshToken) -> Result<()>;

    /// Current refresh token of a user, if any
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<RefreshToken>>;

    /// Delete the user's refresh token. Returns whether a row existed.
    async fn delete_by_user(&self, user_id: Uuid) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
        assert_eq!(normalize_email("a@x.com"), "a@x.com");
    }

    #[test]
    fn test_new_user_normalizes_email() {
        let user = User::new("A@X.com", "A", "hash", "secret");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_user_debug_redacts_credentials() {
        let user = User::new("a@x.com", "A", "$argon2id$v=19$abc", "c2VjcmV0");
        let debug = format!("{user:?}");

        assert!(debug.contains("a@x.com"));
        assert!(!debug.contains("argon2id"));
        assert!(!debug.contains("c2VjcmV0"));
    }

    #[test]
    fn test_public_projection_has_no_credentials() {
        let user = User::new("a@x.com", "A", "hash-value", "secret-value");
        let json = serde_json::to_value(user.to_public()).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj["email"], "a@x.com");
        assert_eq!(obj["name"], "A");
        assert!(obj.contains_key("createdAt"));
        assert!(obj.contains_key("updatedAt"));
        assert!(!obj.contains_key("passwordHash"));
        assert!(!obj.contains_key("password_hash"));
        assert!(!obj.contains_key("secret"));
    }
}
