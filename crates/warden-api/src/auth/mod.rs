//! Authentication and authorization module
//!
//! - Password hashing with Argon2id
//! - Token signing with a global plus per-user secret
//! - Refresh token rotation
//! - Authentication service (sign-up, sign-in, sign-out, refresh, me)
//! - Guard middleware and the `ActiveIdentity` extractor

pub mod cookies;
pub mod guard;
pub mod models;
pub mod password;
pub mod refresh;
pub mod service;
pub mod token;

pub use crate::error::AuthError;
pub use guard::{auth_middleware, ActiveIdentity, Guard};
pub use models::{FieldError, PasswordBearing, RefreshRequest, SignInRequest, SignUpRequest};
pub use password::{validate_password_policy, CredentialHasher};
pub use refresh::RefreshTokenStore;
pub use service::{AuthService, TokenPair};
pub use token::{extract_payload, Claims, TokenIssuer, TokenKind, TokenPayload};
