use crate::auth;
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::User;
use crate::repositories::UserRepository;
use std::sync::Arc;
use tracing::{info, warn};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Registration and credential checks
pub struct UserService {
    user_repo: Arc<UserRepository>,
}

impl UserService {
    pub fn new(user_repo: Arc<UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Register a new user; the password is stored as a bcrypt hash
    pub async fn register_user(&self, username: &str, password: &str) -> AppResult<User> {
        auth::validate_credentials(username, password)?;

        // bcrypt is deliberately slow; keep it off the async workers
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
            .await
            .map_err(|e| AppError::Message(format!("Password hashing task failed: {}", e)))??;

        let user = self
            .user_repo
            .create(username.trim(), &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Duplicate(_) => {
                    AppError::BusinessLogic("Username already exists".to_string())
                }
                other => other.into(),
            })?;

        info!("Registered user {} ({})", user.id, user.username);
        Ok(user)
    }

    /// Verify a username/password pair
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<User> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let user = self
            .user_repo
            .find_by_username(username.trim())
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let password = password.to_string();
        let stored = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored))
            .await
            .map_err(|e| AppError::Message(format!("Password check task failed: {}", e)))?;

        if !matches {
            warn!("Failed login for user {}", user.id);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        info!("User {} logged in", user.id);
        Ok(user)
    }
}
