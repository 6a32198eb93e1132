//! Request and response bodies of the authentication endpoints
//!
//! Requests are checked with `validator` before they reach
//! [`AuthService`](super::service::AuthService). Missing fields deserialize
//! to empty strings so they are reported as validation failures rather than
//! as parse errors.

use super::password::validate_password_policy;
use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

/// Sign-up request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SignUpRequest {
    #[validate(
        length(min = 1, message = "email should not be empty"),
        email(message = "email must be an email")
    )]
    pub email: String,

    #[validate(length(min = 1, message = "name should not be empty"))]
    pub name: String,

    /// Checked by [`validate_request`] against the password policy
    pub password: String,
}

/// Sign-in request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SignInRequest {
    #[validate(
        length(min = 1, message = "email should not be empty"),
        email(message = "email must be an email")
    )]
    pub email: String,

    /// Checked by [`validate_request`] against the password policy
    pub password: String,
}

/// Refresh request body, used when no `refreshToken` cookie is sent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Sign-out response
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// One failed validation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// A request carrying a password subject to the password policy
pub trait PasswordBearing: Validate {
    fn password(&self) -> &str;
}

impl PasswordBearing for SignUpRequest {
    fn password(&self) -> &str {
        &self.password
    }
}

impl PasswordBearing for SignInRequest {
    fn password(&self) -> &str {
        &self.password
    }
}

/// Flatten `validator` errors into field/message pairs, ordered by field
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid")),
            })
        })
        .collect();

    // Stable: messages of one field keep their declaration order
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

/// Run the derived field rules plus the password policy, mapping failures
/// to [`AuthError::Validation`]
pub fn validate_request<T: PasswordBearing>(request: &T) -> Result<(), AuthError> {
    let mut errors = request.validate().err().unwrap_or_else(ValidationErrors::new);

    if let Err(violations) = validate_password_policy(request.password()) {
        for message in violations {
            let mut err = ValidationError::new("password_policy");
            err.message = Some(Cow::Borrowed(message));
            errors.add("password", err);
        }
    }

    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(AuthError::Validation(field_errors(&errors)))
    }
}
