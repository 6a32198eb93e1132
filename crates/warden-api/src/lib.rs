//! Warden API - authentication REST server
//!
//! Issues access and refresh tokens signed with a global secret combined
//! with a per-user secret, rotates refresh tokens on every use, and guards
//! protected routes.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

/// In-memory application wiring for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use crate::{create_router, AppState};
    use axum::{async_trait, Router};
    use std::sync::Arc;
    use uuid::Uuid;
    use warden_core::{
        AppConfig, AuthConfig, PasswordHashConfig, RefreshToken, RefreshTokenRepository,
        Result, User, UserRepository, WardenError,
    };
    use warden_store::{MemoryStore, Repositories};

    /// Router plus handles to the state and backing store
    pub struct TestApp {
        pub router: Router,
        pub state: Arc<AppState>,
        pub store: Arc<MemoryStore>,
    }

    /// Configuration with cheap Argon2 parameters
    pub fn test_config(rotate_secret_on_sign_out: bool) -> AppConfig {
        AppConfig {
            auth: AuthConfig {
                rotate_secret_on_sign_out,
                password: PasswordHashConfig {
                    memory_cost: 1024,
                    time_cost: 1,
                    parallelism: 1,
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Store whose every operation fails as if the backend were down
    #[derive(Debug, Default)]
    pub struct FailingStore;

    fn outage<T>() -> Result<T> {
        Err(WardenError::Database("connection refused".to_string()))
    }

    #[async_trait]
    impl UserRepository for FailingStore {
        async fn create(&self, _user: User) -> Result<User> {
            outage()
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<User>> {
            outage()
        }

        async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>> {
            outage()
        }

        async fn update_secret(&self, _id: Uuid, _secret: &str) -> Result<bool> {
            outage()
        }

        async fn ping(&self) -> Result<()> {
            outage()
        }
    }

    #[async_trait]
    impl RefreshTokenRepository for FailingStore {
        async fn upsert(&self, _token: RefreshToken) -> Result<()> {
            outage()
        }

        async fn find_by_user(&self, _user_id: Uuid) -> Result<Option<RefreshToken>> {
            outage()
        }

        async fn delete_by_user(&self, _user_id: Uuid) -> Result<bool> {
            outage()
        }
    }

    /// Router and state over arbitrary repositories
    pub fn test_router(config: AppConfig, repositories: Repositories) -> (Router, Arc<AppState>) {
        let state = Arc::new(
            AppState::new(config, repositories).expect("test configuration is valid"),
        );
        (create_router(state.clone()), state)
    }

    pub fn test_app_with(config: AppConfig) -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let (router, state) = test_router(config, Repositories::from_store(store.clone()));

        TestApp {
            router,
            state,
            store,
        }
    }

    pub fn test_app() -> TestApp {
        test_app_with(test_config(true))
    }
}
