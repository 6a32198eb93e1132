//! Authentication API handlers
//!
//! Token-issuing endpoints return the [`TokenPair`] as JSON and also set it
//! as `accessToken` / `refreshToken` cookies.
//!
//! Author: hephaex@gmail.com

use crate::audit::AuditContext;
use crate::auth::cookies::{
    read_cookie, SecureCookie, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, SESSION_COOKIE,
};
use crate::auth::models::{FieldError, MessageResponse};
use crate::auth::{ActiveIdentity, AuthError, RefreshRequest, SignInRequest, SignUpRequest, TokenPair};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use warden_core::{AuthConfig, UserPublic};

fn malformed_body(rejection: JsonRejection) -> AuthError {
    AuthError::Validation(vec![FieldError {
        field: "body".to_string(),
        message: rejection.body_text(),
    }])
}

fn token_response(config: &AuthConfig, pair: TokenPair) -> Response {
    let mut headers = HeaderMap::new();
    SecureCookie::new(
        ACCESS_TOKEN_COOKIE,
        pair.access_token.as_str(),
        config.access_expiration_secs,
    )
    .with_secure(config.cookie_secure)
    .append_to(&mut headers);
    SecureCookie::new(
        REFRESH_TOKEN_COOKIE,
        pair.refresh_token.as_str(),
        config.refresh_expiration_secs,
    )
    .with_secure(config.cookie_secure)
    .append_to(&mut headers);

    (headers, Json(pair)).into_response()
}

/// Register a new user account
///
/// # Responses
///
/// * `200 OK` - Account created, tokens issued
/// * `400 Bad Request` - Validation failed
/// * `409 Conflict` - Email already registered
pub async fn sign_up_handler(
    State(state): State<Arc<AppState>>,
    context: AuditContext,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let Json(request) = payload.map_err(malformed_body)?;
    let pair = state.auth.sign_up(request, &context).await?;

    Ok(token_response(&state.config.auth, pair))
}

/// Sign in with email and password
///
/// # Responses
///
/// * `200 OK` - Tokens issued; any earlier refresh token is superseded
/// * `400 Bad Request` - Validation failed
/// * `401 Unauthorized` - Unknown email or wrong password
pub async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
    context: AuditContext,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let Json(request) = payload.map_err(malformed_body)?;
    let pair = state.auth.sign_in(request, &context).await?;

    Ok(token_response(&state.config.auth, pair))
}

/// Sign out the current user and clear token cookies
pub async fn sign_out_handler(
    State(state): State<Arc<AppState>>,
    identity: ActiveIdentity,
    context: AuditContext,
) -> Result<Response, AuthError> {
    state.auth.sign_out(identity.id, &context).await?;

    let secure = state.config.auth.cookie_secure;
    let mut headers = HeaderMap::new();
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, SESSION_COOKIE] {
        SecureCookie::cleared(name)
            .with_secure(secure)
            .append_to(&mut headers);
    }

    let body = MessageResponse {
        message: "Signed out successfully".to_string(),
    };
    Ok((headers, Json(body)).into_response())
}

/// Exchange a refresh token for a new token pair
///
/// The token is read from the `refreshToken` cookie, or else from a JSON
/// body `{"refreshToken": "..."}`.
///
/// # Responses
///
/// * `200 OK` - New tokens issued; the presented refresh token is spent
/// * `400 Bad Request` - Missing, unknown, superseded or expired token
pub async fn refresh_tokens_handler(
    State(state): State<Arc<AppState>>,
    context: AuditContext,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AuthError> {
    let token = match read_cookie(&headers, REFRESH_TOKEN_COOKIE) {
        Some(token) => token,
        None if body.is_empty() => return Err(AuthError::BadRequest),
        None => {
            let request: RefreshRequest = serde_json::from_slice(&body).map_err(|e| {
                AuthError::Validation(vec![FieldError {
                    field: "body".to_string(),
                    message: e.to_string(),
                }])
            })?;
            request.refresh_token.ok_or(AuthError::BadRequest)?
        }
    };

    let pair = state.auth.refresh_tokens(&token, &context).await?;

    Ok(token_response(&state.config.auth, pair))
}

/// Profile of the current user
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    identity: ActiveIdentity,
) -> Result<Json<UserPublic>, AuthError> {
    let user = state.auth.me(identity.id).await?;
    Ok(Json(user))
}
