//! SurrealDB implementation for user and refresh token storage
//!
//! Users live in the `users` table keyed by their UUID with a unique index
//! on `email`. Refresh tokens live in `refresh_tokens`, keyed by the owning
//! user's id, so issuing a token is a single `UPSERT` on one record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use uuid::Uuid;
use warden_core::{
    normalize_email, DatabaseConfig, RefreshToken, RefreshTokenRepository, Result, User,
    UserRepository, WardenError,
};

/// SurrealDB-backed store
#[derive(Clone)]
pub struct SurrealStore {
    client: Surreal<Client>,
}

impl SurrealStore {
    /// Create a new SurrealDB connection
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        // Remove ws:// or wss:// prefix if present (surrealdb crate adds it automatically)
        let url = config
            .surrealdb_url
            .strip_prefix("ws://")
            .or_else(|| config.surrealdb_url.strip_prefix("wss://"))
            .unwrap_or(&config.surrealdb_url);

        let client = Surreal::new::<Ws>(url)
            .await
            .map_err(|e| WardenError::Database(format!("SurrealDB connection failed: {e}")))?;

        client
            .signin(Root {
                username: &config.surrealdb_user,
                password: &config.surrealdb_pass,
            })
            .await
            .map_err(|e| WardenError::Database(format!("SurrealDB auth failed: {e}")))?;

        client
            .use_ns(&config.surrealdb_namespace)
            .use_db(&config.surrealdb_database)
            .await
            .map_err(|e| WardenError::Database(format!("SurrealDB namespace error: {e}")))?;

        Ok(Self { client })
    }

    /// Define tables and the unique email index (idempotent)
    pub async fn init_schema(&self) -> Result<()> {
        self.client
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS users SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS users_email ON TABLE users FIELDS email UNIQUE;
                DEFINE TABLE IF NOT EXISTS refresh_tokens SCHEMALESS;
            "#,
            )
            .await
            .and_then(|response| response.check())
            .map_err(|e| WardenError::Database(format!("Schema init failed: {e}")))?;

        Ok(())
    }
}

fn db_error(context: &str, err: surrealdb::Error) -> WardenError {
    WardenError::Database(format!("{context}: {err}"))
}

fn is_unique_violation(err: &surrealdb::Error) -> bool {
    let message = err.to_string();
    message.contains("already contains") || message.contains("already exists")
}

/// User record for SurrealDB
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    user_id: String,
    email: String,
    name: String,
    password_hash: String,
    secret: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.to_string(),
            email: normalize_email(&user.email),
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            secret: user.secret.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl TryFrom<UserRecord> for User {
    type Error = WardenError;

    fn try_from(record: UserRecord) -> Result<Self> {
        let id = Uuid::parse_str(&record.user_id)
            .map_err(|_| WardenError::Database(format!("Invalid user id: {}", record.user_id)))?;
        Ok(Self {
            id,
            email: record.email,
            name: record.name,
            password_hash: record.password_hash,
            secret: record.secret,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Refresh token record for SurrealDB
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RefreshTokenRecord {
    user_id: String,
    token_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RefreshTokenRecord> for RefreshToken {
    type Error = WardenError;

    fn try_from(record: RefreshTokenRecord) -> Result<Self> {
        let user_id = Uuid::parse_str(&record.user_id)
            .map_err(|_| WardenError::Database(format!("Invalid user id: {}", record.user_id)))?;
        Ok(Self {
            user_id,
            token_hash: record.token_hash,
            created_at: record.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UserIdRow {
    #[allow(dead_code)]
    user_id: String,
}

#[async_trait]
impl UserRepository for SurrealStore {
    async fn create(&self, user: User) -> Result<User> {
        let record = UserRecord::from(&user);

        let response = self
            .client
            .query("CREATE type::thing('users', $user_id) CONTENT $content")
            .bind(("user_id", record.user_id.clone()))
            .bind(("content", record.clone()))
            .await
            .map_err(|e| db_error("Failed to create user", e))?;

        response.check().map_err(|e| {
            if is_unique_violation(&e) {
                WardenError::Conflict(format!("email {} already registered", record.email))
            } else {
                db_error("Failed to create user", e)
            }
        })?;

        User::try_from(record)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut response = self
            .client
            .query("SELECT * OMIT id FROM users WHERE email = $email LIMIT 1")
            .bind(("email", normalize_email(email)))
            .await
            .map_err(|e| db_error("Failed to fetch user", e))?;

        let records: Vec<UserRecord> = response
            .take(0)
            .map_err(|e| db_error("Failed to decode user", e))?;

        records.into_iter().next().map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let mut response = self
            .client
            .query("SELECT * OMIT id FROM type::thing('users', $user_id)")
            .bind(("user_id", id.to_string()))
            .await
            .map_err(|e| db_error("Failed to fetch user", e))?;

        let records: Vec<UserRecord> = response
            .take(0)
            .map_err(|e| db_error("Failed to decode user", e))?;

        records.into_iter().next().map(User::try_from).transpose()
    }

    async fn update_secret(&self, id: Uuid, secret: &str) -> Result<bool> {
        let mut response = self
            .client
            .query(
                "UPDATE type::thing('users', $user_id) SET secret = $secret, updated_at = $now RETURN user_id",
            )
            .bind(("user_id", id.to_string()))
            .bind(("secret", secret.to_string()))
            .bind(("now", Utc::now()))
            .await
            .map_err(|e| db_error("Failed to update secret", e))?;

        let rows: Vec<UserIdRow> = response
            .take(0)
            .map_err(|e| db_error("Failed to update secret", e))?;

        Ok(!rows.is_empty())
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .health()
            .await
            .map_err(|e| db_error("SurrealDB health check failed", e))
    }
}

#[async_trait]
impl RefreshTokenRepository for SurrealStore {
    async fn upsert(&self, token: RefreshToken) -> Result<()> {
        let record = RefreshTokenRecord {
            user_id: token.user_id.to_string(),
            token_hash: token.token_hash,
            created_at: token.created_at,
        };

        self.client
            .query("UPSERT type::thing('refresh_tokens', $user_id) CONTENT $content")
            .bind(("user_id", record.user_id.clone()))
            .bind(("content", record))
            .await
            .and_then(|response| response.check())
            .map_err(|e| db_error("Failed to store refresh token", e))?;

        Ok(())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<RefreshToken>> {
        let mut response = self
            .client
            .query("SELECT * OMIT id FROM type::thing('refresh_tokens', $user_id)")
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(|e| db_error("Failed to fetch refresh token", e))?;

        let records: Vec<RefreshTokenRecord> = response
            .take(0)
            .map_err(|e| db_error("Failed to decode refresh token", e))?;

        records
            .into_iter()
            .next()
            .map(RefreshToken::try_from)
            .transpose()
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<bool> {
        let mut response = self
            .client
            .query("DELETE type::thing('refresh_tokens', $user_id) RETURN BEFORE")
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(|e| db_error("Failed to delete refresh token", e))?;

        let deleted: Vec<RefreshTokenRecord> = response
            .take(0)
            .map_err(|e| db_error("Failed to delete refresh token", e))?;

        Ok(!deleted.is_empty())
    }
}
