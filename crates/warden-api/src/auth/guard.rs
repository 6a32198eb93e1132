/// Authorization guard for protected routes
///
/// Resolves the caller of a request in four steps:
///
/// 1. take the access token from the `accessToken` cookie, or else from
///    `Authorization: Bearer <token>`
/// 2. decode the token payload without verifying it, to learn `sub`
/// 3. load that user
/// 4. verify the token with the user's secret
///
/// Only then is [`ActiveIdentity`] attached to the request. Every rejection
/// produces the same `401 Unauthorized` body; the failed step is logged and
/// audited. A repository outage while loading the user is reported as an
/// internal error, not as a rejection.
use super::cookies::{read_cookie, ACCESS_TOKEN_COOKIE};
use super::token::{extract_payload, TokenIssuer, TokenKind};
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::error::AuthError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use warden_core::{UserRepository, WardenError};

/// The authenticated caller of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveIdentity {
    pub id: Uuid,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for ActiveIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ActiveIdentity>()
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }
}

/// Last state a rejected request reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    NoToken,
    TokenPresent,
    PayloadExtracted,
    UserResolved,
}

impl GuardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardState::NoToken => "no_token",
            GuardState::TokenPresent => "token_present",
            GuardState::PayloadExtracted => "payload_extracted",
            GuardState::UserResolved => "user_resolved",
        }
    }
}

enum Denial {
    Rejected(GuardState),
    Repository(WardenError),
}

#[derive(Clone)]
pub struct Guard {
    issuer: Arc<TokenIssuer>,
    users: Arc<dyn UserRepository>,
}

impl Guard {
    pub fn new(issuer: Arc<TokenIssuer>, users: Arc<dyn UserRepository>) -> Self {
        Self { issuer, users }
    }

    /// Resolve the identity behind the request's access token
    pub async fn authorize(&self, headers: &HeaderMap) -> Result<ActiveIdentity, AuthError> {
        match self.resolve(headers).await {
            Ok(identity) => Ok(identity),
            Err(Denial::Rejected(state)) => {
                tracing::debug!(stage = state.as_str(), "Request rejected by guard");
                audit_log(&AuditEvent::GuardRejected {
                    stage: state.as_str().to_string(),
                    context: AuditContext::from_headers(headers),
                });
                Err(AuthError::Unauthorized)
            }
            Err(Denial::Repository(e)) => Err(AuthError::Repository(e)),
        }
    }

    async fn resolve(&self, headers: &HeaderMap) -> Result<ActiveIdentity, Denial> {
        // Extract token
        let token = access_token(headers).ok_or(Denial::Rejected(GuardState::NoToken))?;

        // Learn the subject without trusting it yet
        let payload =
            extract_payload(&token).map_err(|_| Denial::Rejected(GuardState::TokenPresent))?;

        let user_id = Uuid::parse_str(&payload.sub)
            .map_err(|_| Denial::Rejected(GuardState::PayloadExtracted))?;

        // Storage errors pass through as internal errors
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(Denial::Repository)?
            .ok_or(Denial::Rejected(GuardState::PayloadExtracted))?;

        // Verify with the user's current secret
        self.issuer
            .verify_token(&token, &user.secret, TokenKind::Access)
            .map_err(|_| Denial::Rejected(GuardState::UserResolved))?;

        Ok(ActiveIdentity {
            id: user.id,
            email: user.email,
        })
    }
}

/// Access token from the cookie, falling back to the bearer header
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    // Cookie first
    if let Some(token) = read_cookie(headers, ACCESS_TOKEN_COOKIE) {
        return Some(token);
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Middleware that rejects requests without a valid access token
///
/// # Usage
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
///
/// let protected = Router::new()
///     .route("/authentication/me", get(me_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
///
/// Handlers then take [`ActiveIdentity`] as a parameter.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = state.guard.authorize(request.headers()).await?;

    // Handlers read it back via the `ActiveIdentity` extractor
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::TokenPayload;
    use crate::test_utils::FailingStore;
    use axum::http::HeaderValue;
    use warden_core::{AuthConfig, User};
    use warden_store::MemoryStore;

    async fn setup() -> (Guard, Arc<TokenIssuer>, Arc<MemoryStore>, User) {
        let issuer = Arc::new(TokenIssuer::new(&AuthConfig::default()));
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create(User::new("alice@example.com", "Alice", "hash", "user-secret"))
            .await
            .unwrap();
        (Guard::new(issuer.clone(), store.clone()), issuer, store, user)
    }

    fn token_for(issuer: &TokenIssuer, user: &User, kind: TokenKind) -> String {
        let payload = TokenPayload {
            sub: user.id.to_string(),
            email: user.email.clone(),
        };
        issuer.create_token(&payload, &user.secret, kind).unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_storage_outage_is_not_a_rejection() {
        let (_, issuer, _, user) = setup().await;
        let token = token_for(&issuer, &user, TokenKind::Access);
        let guard = Guard::new(issuer, Arc::new(FailingStore));

        let result = guard.authorize(&bearer(&token)).await;
        assert!(matches!(result, Err(AuthError::Repository(_))));
    }

    #[tokio::test]
    async fn test_bearer_token_accepted() {
        let (guard, issuer, _, user) = setup().await;
        let token = token_for(&issuer, &user, TokenKind::Access);

        let identity = guard.authorize(&bearer(&token)).await.unwrap();
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_cookie_preferred_over_header() {
        let (guard, issuer, _, user) = setup().await;
        let token = token_for(&issuer, &user, TokenKind::Access);

        let mut headers = bearer("garbage");
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("accessToken={token}")).unwrap(),
        );

        assert!(guard.authorize(&headers).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let (guard, _, _, _) = setup().await;

        let result = guard.authorize(&HeaderMap::new()).await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(
            guard.authorize(&headers).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_every_failed_stage_is_unauthorized() {
        let (guard, issuer, _, user) = setup().await;

        // Undecodable
        assert!(matches!(
            guard.authorize(&bearer("not.a.token")).await,
            Err(AuthError::Unauthorized)
        ));

        // Unknown user
        let stranger = User::new("bob@example.com", "Bob", "hash", "other");
        let token = token_for(&issuer, &stranger, TokenKind::Access);
        assert!(matches!(
            guard.authorize(&bearer(&token)).await,
            Err(AuthError::Unauthorized)
        ));

        // Refresh token used as access token
        let token = token_for(&issuer, &user, TokenKind::Refresh);
        assert!(matches!(
            guard.authorize(&bearer(&token)).await,
            Err(AuthError::Unauthorized)
        ));

        // Signed with a different secret
        let mut forged = user.clone();
        forged.secret = "guessed".to_string();
        let token = token_for(&issuer, &forged, TokenKind::Access);
        assert!(matches!(
            guard.authorize(&bearer(&token)).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_rotated_secret_rejects_old_token() {
        let (guard, issuer, store, user) = setup().await;
        let token = token_for(&issuer, &user, TokenKind::Access);

        store.update_secret(user.id, "new-secret").await.unwrap();

        assert!(matches!(
            guard.authorize(&bearer(&token)).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn test_access_token_extraction() {
        assert_eq!(access_token(&bearer("abc")), Some("abc".to_string()));
        assert_eq!(access_token(&bearer("")), None);
        assert_eq!(access_token(&HeaderMap::new()), None);
    }
}
