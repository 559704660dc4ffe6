use crate::error::{AppError, AppResult};

const MIN_PASSWORD_LEN: usize = 6;

/// Validate registration credentials
pub fn validate_credentials(username: &str, password: &str) -> AppResult<()> {
    if username.trim().is_empty() {
        return Err(AppError::Validation("Username required".to_string()));
    }
    if username.len() > 64 {
        return Err(AppError::Validation("Username too long".to_string()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Hash a password with bcrypt at the default cost. The salt is embedded in
/// the returned string.
pub fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Message(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored bcrypt hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}
