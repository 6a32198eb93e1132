//! In-memory storage (development and tests)

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use warden_core::{
    normalize_email, RefreshToken, RefreshTokenRepository, Result, User, UserRepository,
    WardenError,
};

#[derive(Default)]
struct UserTable {
    by_id: HashMap<Uuid, User>,
    /// email -> id
    by_email: HashMap<String, Uuid>,
}

/// Process-local store for users and refresh tokens
///
/// Each operation takes the table lock once, so `create` is an atomic
/// check-and-insert and `upsert` an atomic replace.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<UserTable>,
    /// user id -> current refresh token
    refresh_tokens: RwLock<HashMap<Uuid, RefreshToken>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored refresh tokens across all users
    pub async fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.read().await.len()
    }

    /// Number of registered users
    pub async fn user_count(&self) -> usize {
        self.users.read().await.by_id.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, mut user: User) -> Result<User> {
        user.email = normalize_email(&user.email);

        let mut table = self.users.write().await;
        if table.by_email.contains_key(&user.email) {
            return Err(WardenError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        if table.by_id.contains_key(&user.id) {
            return Err(WardenError::Conflict(format!("user {} already exists", user.id)));
        }

        table.by_email.insert(user.email.clone(), user.id);
        table.by_id.insert(user.id, user.clone());
        tracing::debug!(user_id = %user.id, "User stored in memory");

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let table = self.users.read().await;
        Ok(table
            .by_email
            .get(&normalize_email(email))
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.by_id.get(&id).cloned())
    }

    async fn update_secret(&self, id: Uuid, secret: &str) -> Result<bool> {
        let mut table = self.users.write().await;
        match table.by_id.get_mut(&id) {
            Some(user) => {
                user.secret = secret.to_string();
                user.updated_at = chrono::Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryStore {
    async fn upsert(&self, token: RefreshToken) -> Result<()> {
        self.refresh_tokens
            .write()
            .await
            .insert(token.user_id, token);
        Ok(())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<RefreshToken>> {
        Ok(self.refresh_tokens.read().await.get(&user_id).cloned())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.refresh_tokens.write().await.remove(&user_id).is_some())
    }
}
