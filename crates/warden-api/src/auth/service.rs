//! Authentication service layer
//!
//! Sign-up, sign-in, sign-out, token refresh and identity lookup. The service
//! owns no state besides its collaborators; every user and refresh token is
//! read from the repositories per call.

use super::models::{validate_request, SignInRequest, SignUpRequest};
use super::password::CredentialHasher;
use super::refresh::RefreshTokenStore;
use super::token::{extract_payload, generate_user_secret, TokenIssuer, TokenKind, TokenPayload};
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;
use warden_core::{normalize_email, AuthConfig, User, UserPublic, UserRepository, WardenError};
use warden_store::Repositories;

/// Password hashed once per process and compared against when the email is
/// unknown, so unknown-email and wrong-password sign-ins cost the same.
const TIMING_DUMMY_PASSWORD: &str = "timing-equalizer-0!";

/// Access and refresh token issued together
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    hasher: CredentialHasher,
    issuer: Arc<TokenIssuer>,
    refresh_tokens: RefreshTokenStore,
    rotate_secret_on_sign_out: bool,
    dummy_digest: OnceCell<String>,
}

impl AuthService {
    pub fn new(
        config: &AuthConfig,
        repositories: &Repositories,
        issuer: Arc<TokenIssuer>,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            users: repositories.users.clone(),
            hasher: CredentialHasher::new(&config.password)?,
            refresh_tokens: RefreshTokenStore::new(
                repositories.refresh_tokens.clone(),
                issuer.clone(),
            ),
            issuer,
            rotate_secret_on_sign_out: config.rotate_secret_on_sign_out,
            dummy_digest: OnceCell::new(),
        })
    }

    /// Register a new user and sign them in
    ///
    /// # Returns
    ///
    /// * `Ok(TokenPair)` - Tokens for the new account
    /// * `Err(AuthError::UserAlreadyExists)` - The email is taken
    /// * `Err(AuthError::Validation)` - Malformed email, name or password
    pub async fn sign_up(
        &self,
        request: SignUpRequest,
        context: &AuditContext,
    ) -> Result<TokenPair, AuthError> {
        // Validate input
        validate_request(&request)?;
        let email = normalize_email(&request.email);

        // Check if user already exists
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(self.sign_up_conflict(email, context));
        }

        // Hash password
        let password_hash = self
            .hasher
            .hash(&request.password, CredentialHasher::generate_salt())
            .await?;
        let user = User::new(&email, request.name, password_hash, generate_user_secret());

        // The repository enforces uniqueness as well; a concurrent sign-up
        // with the same email can slip past the check above.
        let user = match self.users.create(user).await {
            Ok(user) => user,
            Err(WardenError::Conflict(_)) => return Err(self.sign_up_conflict(email, context)),
            Err(e) => return Err(e.into()),
        };

        // Generate tokens
        let pair = self.issue_token_pair(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");
        audit_log(&AuditEvent::SignUpSuccess {
            user_id: user.id,
            email: user.email,
            context: context.clone(),
        });

        Ok(pair)
    }

    fn sign_up_conflict(&self, email: String, context: &AuditContext) -> AuthError {
        audit_log(&AuditEvent::SignUpFailure {
            email,
            reason: "email already registered".to_string(),
            context: context.clone(),
        });
        AuthError::UserAlreadyExists
    }

    /// Authenticate with email and password
    ///
    /// Unknown email and wrong password fail identically with
    /// [`AuthError::InvalidCredentials`].
    pub async fn sign_in(
        &self,
        request: SignInRequest,
        context: &AuditContext,
    ) -> Result<TokenPair, AuthError> {
        validate_request(&request)?;
        let email = normalize_email(&request.email);

        // Find user; burn one comparison when unknown
        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                let dummy = self.dummy_digest().await?;
                self.hasher.compare(&request.password, dummy).await?;
                return Err(self.sign_in_failure(email, "unknown email", context));
            }
        };

        // Verify password
        if !self
            .hasher
            .compare(&request.password, &user.password_hash)
            .await?
        {
            return Err(self.sign_in_failure(email, "wrong password", context));
        }

        // Supersedes any earlier refresh token
        let pair = self.issue_token_pair(&user).await?;

        audit_log(&AuditEvent::SignInSuccess {
            user_id: user.id,
            email: user.email,
            context: context.clone(),
        });

        Ok(pair)
    }

    async fn dummy_digest(&self) -> Result<&String, AuthError> {
        self.dummy_digest
            .get_or_try_init(|| async {
                self.hasher
                    .hash(TIMING_DUMMY_PASSWORD, CredentialHasher::generate_salt())
                    .await
            })
            .await
    }

    fn sign_in_failure(&self, email: String, reason: &str, context: &AuditContext) -> AuthError {
        tracing::debug!(reason, "Sign-in rejected");
        audit_log(&AuditEvent::SignInFailure {
            email,
            reason: reason.to_string(),
            context: context.clone(),
        });
        AuthError::InvalidCredentials
    }

    /// Sign a user out. Idempotent; an unknown user id is not an error.
    ///
    /// The refresh token is always dropped. With `rotate_secret_on_sign_out`
    /// the user's secret is replaced too, which kills every outstanding
    /// access token at once.
    pub async fn sign_out(&self, user_id: Uuid, context: &AuditContext) -> Result<(), AuthError> {
        self.refresh_tokens.invalidate(user_id).await?;

        let secret_rotated = if self.rotate_secret_on_sign_out {
            self.replace_secret(user_id).await?
        } else {
            false
        };

        audit_log(&AuditEvent::SignOut {
            user_id,
            secret_rotated,
            context: context.clone(),
        });

        Ok(())
    }

    /// Exchange a refresh token for a new pair
    ///
    /// Every rejection is [`AuthError::BadRequest`]: undecodable token,
    /// unknown user, superseded or expired token, wrong signature.
    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
        context: &AuditContext,
    ) -> Result<TokenPair, AuthError> {
        // Unverified decode, only to learn whose secret to verify with
        let payload = extract_payload(refresh_token)
            .map_err(|_| self.refresh_failure(None, "undecodable token", context))?;

        let user_id = Uuid::parse_str(&payload.sub)
            .map_err(|_| self.refresh_failure(None, "malformed subject", context))?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| self.refresh_failure(Some(user_id), "unknown user", context))?;

        // Must be the stored token and verify under the user's secret
        if !self
            .refresh_tokens
            .is_valid(refresh_token, user.id, &user.secret)
            .await?
        {
            return Err(self.refresh_failure(Some(user.id), "token not current", context));
        }

        // Rotate: the presented token is now superseded
        let pair = self.issue_token_pair(&user).await?;

        audit_log(&AuditEvent::TokenRefresh {
            user_id: user.id,
            email: user.email,
            context: context.clone(),
        });

        Ok(pair)
    }

    fn refresh_failure(
        &self,
        user_id: Option<Uuid>,
        reason: &str,
        context: &AuditContext,
    ) -> AuthError {
        tracing::debug!(user_id = ?user_id, reason, "Refresh rejected");
        audit_log(&AuditEvent::TokenRefreshFailure {
            user_id,
            reason: reason.to_string(),
            context: context.clone(),
        });
        AuthError::BadRequest
    }

    /// Public profile of the signed-in user
    pub async fn me(&self, user_id: Uuid) -> Result<UserPublic, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|user| user.to_public())
            .ok_or(AuthError::Unauthorized)
    }

    /// Replace the user's secret and drop their refresh token
    ///
    /// Every token signed with the old secret stops verifying. Returns
    /// whether the user exists.
    pub async fn rotate_secret(&self, user_id: Uuid) -> Result<bool, AuthError> {
        let rotated = self.replace_secret(user_id).await?;
        self.refresh_tokens.invalidate(user_id).await?;
        Ok(rotated)
    }

    async fn replace_secret(&self, user_id: Uuid) -> Result<bool, AuthError> {
        let rotated = self
            .users
            .update_secret(user_id, &generate_user_secret())
            .await?;

        if rotated {
            audit_log(&AuditEvent::SecretRotated { user_id });
        }
        Ok(rotated)
    }

    async fn issue_token_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let payload = TokenPayload {
            sub: user.id.to_string(),
            email: user.email.clone(),
        };

        let access_token = self
            .issuer
            .create_token(&payload, &user.secret, TokenKind::Access)
            .map_err(|e| AuthError::Token(e.to_string()))?;
        let refresh_token = self
            .issuer
            .create_token(&payload, &user.secret, TokenKind::Refresh)
            .map_err(|e| AuthError::Token(e.to_string()))?;

        // Store refresh token digest, replacing any previous one
        self.refresh_tokens.issue(user.id, &refresh_token).await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.issuer.ttl(TokenKind::Access),
        })
    }
}
