//! Warden Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Signing secret used when none is configured. Never use in production.
pub const DEVELOPMENT_JWT_SECRET: &str = "development-secret-key-change-in-production";

/// Minimum accepted length of a configured signing secret, in bytes
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Longest accepted token lifetime (365 days), in seconds
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage backend
    pub database: DatabaseConfig,

    /// Token and credential settings
    pub auth: AuthConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|message| ConfigError::ParseError { path, message })
    }

    fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load the file named by `WARDEN_CONFIG` (if set), then apply env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var("WARDEN_CONFIG") {
            Ok(path) => Self::from_file(path)?.with_env_override()?,
            Err(_) => Self::from_env()?,
        };
        config.auth.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env("API_PORT")? {
            self.server.port = port;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Storage
        if let Some(backend) = parse_env("DATABASE_BACKEND")? {
            self.database.backend = backend;
        }
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            self.database.surrealdb_url = url;
        }
        if let Ok(user) = std::env::var("SURREALDB_USER") {
            self.database.surrealdb_user = user;
        }
        if let Ok(pass) = std::env::var("SURREALDB_PASS") {
            self.database.surrealdb_pass = pass;
        }
        if let Ok(ns) = std::env::var("SURREALDB_NAMESPACE") {
            self.database.surrealdb_namespace = ns;
        }
        if let Ok(db) = std::env::var("SURREALDB_DATABASE") {
            self.database.surrealdb_database = db;
        }

        // Tokens
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(issuer) = std::env::var("JWT_ISSUER") {
            self.auth.jwt_issuer = issuer;
        }
        if let Ok(audience) = std::env::var("JWT_AUDIENCE") {
            self.auth.jwt_audience = audience;
        }
        if let Some(secs) = parse_env("JWT_ACCESS_EXPIRATION_SECS")? {
            self.auth.access_expiration_secs = secs;
        }
        if let Some(secs) = parse_env("JWT_REFRESH_EXPIRATION_SECS")? {
            self.auth.refresh_expiration_secs = secs;
        }
        if let Some(rotate) = parse_bool_env("AUTH_ROTATE_SECRET_ON_SIGN_OUT")? {
            self.auth.rotate_secret_on_sign_out = rotate;
        }
        if let Some(secure) = parse_bool_env("AUTH_COOKIE_SECURE")? {
            self.auth.cookie_secure = secure;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_bool_env("LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(self)
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

fn parse_bool_env(key: &str) -> Result<Option<bool>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => parse_bool(&value)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Allowed origins for CORS (credentials are allowed, so no wildcard)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            // Empty by default for security - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// Process-local maps; data is lost on restart
    #[default]
    Memory,
    /// SurrealDB over WebSocket
    SurrealDb,
}

impl FromStr for DatabaseBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "surrealdb" | "surreal" => Ok(Self::SurrealDb),
            _ => Err(ConfigError::InvalidValue {
                key: "DATABASE_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Database connection configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Which backend stores users and refresh tokens
    pub backend: DatabaseBackend,

    /// SurrealDB WebSocket URL
    pub surrealdb_url: String,

    /// SurrealDB username
    pub surrealdb_user: String,

    /// SurrealDB password
    pub surrealdb_pass: String,

    /// SurrealDB namespace
    pub surrealdb_namespace: String,

    /// SurrealDB database name
    pub surrealdb_database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Memory,
            surrealdb_url: "ws://localhost:8000".to_string(),
            surrealdb_user: "root".to_string(),
            surrealdb_pass: "root".to_string(),
            surrealdb_namespace: "warden".to_string(),
            surrealdb_database: "auth".to_string(),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("surrealdb_url", &self.surrealdb_url)
            .field("surrealdb_user", &self.surrealdb_user)
            .field("surrealdb_pass", &"<redacted>")
            .field("surrealdb_namespace", &self.surrealdb_namespace)
            .field("surrealdb_database", &self.surrealdb_database)
            .finish()
    }
}

/// Token and credential configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Global half of every signing key
    pub jwt_secret: String,

    /// `iss` claim
    pub jwt_issuer: String,

    /// `aud` claim
    pub jwt_audience: String,

    /// Access token lifetime in seconds (default: 900 = 15 minutes)
    pub access_expiration_secs: u64,

    /// Refresh token lifetime in seconds (default: 604800 = 7 days)
    pub refresh_expiration_secs: u64,

    /// Rotate the user's secret on sign-out so outstanding access tokens die
    pub rotate_secret_on_sign_out: bool,

    /// Mark token cookies `Secure` (HTTPS only)
    pub cookie_secure: bool,

    /// Argon2id parameters
    pub password: PasswordHashConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
            jwt_issuer: "warden".to_string(),
            jwt_audience: "warden-clients".to_string(),
            access_expiration_secs: 900,
            refresh_expiration_secs: 7 * 24 * 3600,
            rotate_secret_on_sign_out: true,
            cookie_secure: false,
            password: PasswordHashConfig::default(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("access_expiration_secs", &self.access_expiration_secs)
            .field("refresh_expiration_secs", &self.refresh_expiration_secs)
            .field("rotate_secret_on_sign_out", &self.rotate_secret_on_sign_out)
            .field("cookie_secure", &self.cookie_secure)
            .field("password", &self.password)
            .finish()
    }
}

impl AuthConfig {
    /// Whether the built-in development secret is in use
    pub fn uses_development_secret(&self) -> bool {
        self.jwt_secret == DEVELOPMENT_JWT_SECRET
    }

    /// Reject configurations that cannot produce sound tokens
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if !self.uses_development_secret() && self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                key: "JWT_SECRET".to_string(),
                value: format!("<{} bytes, need {MIN_JWT_SECRET_LEN}>", self.jwt_secret.len()),
            });
        }
        if self.access_expiration_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "JWT_ACCESS_EXPIRATION_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.refresh_expiration_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                key: "JWT_REFRESH_EXPIRATION_SECS".to_string(),
                value: format!("{} (max {MAX_TOKEN_TTL_SECS})", self.refresh_expiration_secs),
            });
        }
        if self.refresh_expiration_secs <= self.access_expiration_secs {
            return Err(ConfigError::InvalidValue {
                key: "JWT_REFRESH_EXPIRATION_SECS".to_string(),
                value: self.refresh_expiration_secs.to_string(),
            });
        }
        Ok(())
    }
}

/// Argon2id parameters
///
/// Defaults follow OWASP: 64 MiB memory, 3 iterations, 4 lanes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordHashConfig {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    /// Lanes
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
