//! Security audit logging for authentication events
//!
//! Every sign-up, sign-in, sign-out, token refresh, secret rotation and
//! guard rejection is logged at INFO level with the "audit" target, so it
//! can be filtered and routed separately from application logs.
//!
//! Events never carry passwords, secrets or token values.
//!
//! # Example
//!
//! ```ignore
//! use warden_api::audit::{audit_log, AuditContext, AuditEvent};
//!
//! audit_log(&AuditEvent::SignInSuccess {
//!     user_id: user.id,
//!     email: user.email.clone(),
//!     context: AuditContext::default(),
//! });
//! ```
//!
//! Author: hephaex@gmail.com

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::info;
use uuid::Uuid;

/// Client information attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    /// Client IP address (from proxy headers)
    pub ip_address: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuditContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// New account created
    SignUpSuccess {
        user_id: Uuid,
        email: String,
        #[serde(flatten)]
        context: AuditContext,
    },

    /// Sign-up rejected (duplicate email)
    SignUpFailure {
        email: String,
        reason: String,
        #[serde(flatten)]
        context: AuditContext,
    },

    /// Credentials accepted
    SignInSuccess {
        user_id: Uuid,
        email: String,
        #[serde(flatten)]
        context: AuditContext,
    },

    /// Credentials rejected
    SignInFailure {
        email: String,
        reason: String,
        #[serde(flatten)]
        context: AuditContext,
    },

    /// User signed out
    SignOut {
        user_id: Uuid,
        secret_rotated: bool,
        #[serde(flatten)]
        context: AuditContext,
    },

    /// Token pair rotated with a refresh token
    TokenRefresh {
        user_id: Uuid,
        email: String,
        #[serde(flatten)]
        context: AuditContext,
    },

    /// Refresh token rejected
    TokenRefreshFailure {
        user_id: Option<Uuid>,
        reason: String,
        #[serde(flatten)]
        context: AuditContext,
    },

    /// User's signing secret replaced
    SecretRotated { user_id: Uuid },

    /// Request rejected by the authorization guard
    GuardRejected {
        stage: String,
        #[serde(flatten)]
        context: AuditContext,
    },
}

/// Log a security audit event with structured fields
///
/// The event is also serialized to JSON in the `event` field for log
/// aggregators.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::SignUpSuccess {
            user_id,
            email,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?context.ip_address,
                "Sign-up successful"
            );
        }
        AuditEvent::SignUpFailure {
            email,
            reason,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?context.ip_address,
                "Sign-up failed"
            );
        }
        AuditEvent::SignInSuccess {
            user_id,
            email,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?context.ip_address,
                "Sign-in successful"
            );
        }
        AuditEvent::SignInFailure {
            email,
            reason,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?context.ip_address,
                "Sign-in failed"
            );
        }
        AuditEvent::SignOut {
            user_id,
            secret_rotated,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                secret_rotated = %secret_rotated,
                ip_address = ?context.ip_address,
                "User signed out"
            );
        }
        AuditEvent::TokenRefresh {
            user_id,
            email,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?context.ip_address,
                "Token refresh"
            );
        }
        AuditEvent::TokenRefreshFailure {
            user_id,
            reason,
            context,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                reason = %reason,
                ip_address = ?context.ip_address,
                "Token refresh rejected"
            );
        }
        AuditEvent::SecretRotated { user_id } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                "User secret rotated"
            );
        }
        AuditEvent::GuardRejected { stage, context } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                stage = %stage,
                ip_address = ?context.ip_address,
                user_agent = ?context.user_agent,
                "Request rejected"
            );
        }
    }
}

/// Extract the client IP address from request headers
///
/// Checks X-Forwarded-For, then X-Real-IP.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    // Take the first IP in the chain (client IP)
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    // nginx
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

/// Extract the user agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
