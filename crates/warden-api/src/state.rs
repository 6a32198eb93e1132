//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::{AuthError, AuthService, Guard, TokenIssuer};
use std::sync::Arc;
use std::time::Instant;
use warden_core::AppConfig;
use warden_store::Repositories;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Storage handles
    pub repositories: Repositories,
    /// Sign-up, sign-in, sign-out, refresh
    pub auth: AuthService,
    /// Access token check for protected routes
    pub guard: Guard,
}

impl AppState {
    pub fn new(config: AppConfig, repositories: Repositories) -> Result<Self, AuthError> {
        let issuer = Arc::new(TokenIssuer::new(&config.auth));
        let auth = AuthService::new(&config.auth, &repositories, issuer.clone())?;
        let guard = Guard::new(issuer, repositories.users.clone());

        Ok(Self {
            config,
            start_time: Instant::now(),
            repositories,
            auth,
            guard,
        })
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
