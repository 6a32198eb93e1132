/// Password hashing and verification using Argon2id
///
/// Digests are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so
/// the salt and the cost parameters travel with the digest and verification
/// needs nothing else.
///
/// Argon2 is deliberately slow. Both hashing and comparison run on the
/// blocking thread pool so request tasks keep making progress.
use crate::error::AuthError;
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use warden_core::PasswordHashConfig;

/// Minimum password length, in characters
pub const MIN_PASSWORD_LEN: usize = 8;

pub const PASSWORD_TOO_SHORT: &str = "password must be longer than or equal to 8 characters";
pub const PASSWORD_TOO_WEAK: &str =
    "Password must contain 1 letter, 1 number & 1 special character";

/// Argon2id hasher configured from [`PasswordHashConfig`]
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    /// Build a hasher, rejecting parameters Argon2 cannot use
    pub fn new(config: &PasswordHashConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            None,
        )
        .map_err(|e| AuthError::Hashing(format!("invalid Argon2 parameters: {e}")))?;

        Ok(Self { params })
    }

    /// Fresh random salt from the OS generator
    pub fn generate_salt() -> SaltString {
        SaltString::generate(&mut OsRng)
    }

    /// Hash `password` with `salt` into a PHC string
    pub async fn hash(&self, password: &str, salt: SaltString) -> Result<String, AuthError> {
        let params = self.params.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hash_blocking(&password, &salt, params))
            .await
            .map_err(|e| AuthError::Hashing(format!("hashing task failed: {e}")))?
    }

    /// Check `password` against a stored digest.
    ///
    /// A malformed digest compares as `false`. Only a failure of the blocking
    /// task itself is an error.
    pub async fn compare(&self, password: &str, digest: &str) -> Result<bool, AuthError> {
        let password = password.to_string();
        let digest = digest.to_string();

        tokio::task::spawn_blocking(move || compare_blocking(&password, &digest))
            .await
            .map_err(|e| AuthError::Hashing(format!("verification task failed: {e}")))
    }
}

fn hash_blocking(password: &str, salt: &SaltString, params: Params) -> Result<String, AuthError> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    argon2
        .hash_password(password.as_bytes(), salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

fn compare_blocking(password: &str, digest: &str) -> bool {
    let parsed = match PasswordHash::new(digest) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password digest is malformed");
            return false;
        }
    };

    // Parameters come from the digest itself
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => true,
        Err(argon2::password_hash::Error::Password) => false,
        Err(e) => {
            tracing::warn!(error = %e, "Password verification failed");
            false
        }
    }
}

/// Whether `password` has an ASCII letter, an ASCII digit and a special character
fn has_required_character_classes(password: &str) -> bool {
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_ascii_alphanumeric());

    has_letter && has_digit && has_special
}

/// Check a candidate password against the password policy
///
/// Returns every violated rule's message, in a stable order.
pub fn validate_password_policy(password: &str) -> Result<(), Vec<&'static str>> {
    let mut violations = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LEN {
        violations.push(PASSWORD_TOO_SHORT);
    }
    if !has_required_character_classes(password) {
        violations.push(PASSWORD_TOO_WEAK);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}
