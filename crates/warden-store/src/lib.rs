//! Warden Store - storage backends
//!
//! Implements [`UserRepository`] and [`RefreshTokenRepository`] over an
//! in-process map (development and tests) and over SurrealDB.

pub mod memory;
pub mod surrealdb_store;

pub use memory::MemoryStore;
pub use surrealdb_store::SurrealStore;

use std::sync::Arc;
use warden_core::{DatabaseBackend, DatabaseConfig, RefreshTokenRepository, Result, UserRepository};

/// Repository handles shared by the services
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
}

impl Repositories {
    /// Both repositories backed by one store
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository + RefreshTokenRepository + 'static,
    {
        Self {
            users: store.clone(),
            refresh_tokens: store,
        }
    }

    /// Open the backend selected in configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        match config.backend {
            DatabaseBackend::Memory => {
                tracing::warn!("Using in-memory storage; users and tokens are lost on restart");
                Ok(Self::from_store(Arc::new(MemoryStore::new())))
            }
            DatabaseBackend::SurrealDb => {
                let store = SurrealStore::connect(config).await?;
                store.init_schema().await?;
                tracing::info!(url = %config.surrealdb_url, "Connected to SurrealDB");
                Ok(Self::from_store(Arc::new(store)))
            }
        }
    }
}
