use chrono::{Duration, Utc};
use log::info;
use sqlx::SqlitePool;

use crate::auth;
use crate::config::Config;
use crate::error::{conflict_on_unique, AppError, Result};
use crate::models::{RegisterRequest, User};
use crate::notifier::Notifier;

pub const RESET_REQUESTED_MESSAGE: &str = "If this email exists, a reset code has been sent.";

pub async fn register(pool: &SqlitePool, config: &Config, req: &RegisterRequest) -> Result<i64> {
    let username = req.username.trim();
    let email = req.email.trim();
    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Username, email and password are required".to_string(),
        ));
    }

    let taken: Option<(String, String)> =
        sqlx::query_as("SELECT username, email FROM users WHERE username = ? OR email = ? LIMIT 1")
            .bind(username)
            .bind(email)
            .fetch_optional(pool)
            .await?;
    if let Some((existing_username, _)) = taken {
        return Err(if existing_username == username {
            AppError::Conflict("Username already exists".to_string())
        } else {
            AppError::Conflict("Email already registered".to_string())
        });
    }

    let hashed_password = auth::hash_password(&req.password, config.bcrypt_cost)?;
    let id = sqlx::query(
        "INSERT INTO users (username, email, password, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(email)
    .bind(&hashed_password)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "Username already exists"))?
    .last_insert_rowid();

    info!("Registered user {} ({})", username, id);
    Ok(id)
}

/// Unknown usernames and wrong passwords are indistinguishable to the caller,
/// in both the error and the time spent hashing.
pub async fn authenticate(
    pool: &SqlitePool,
    config: &Config,
    username: &str,
    password: &str,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username.trim())
        .fetch_optional(pool)
        .await?;

    match user {
        Some(user) if auth::verify_password(password, &user.password) => Ok(user),
        Some(_) => Err(AppError::InvalidCredentials),
        None => {
            auth::hash_password(password, config.bcrypt_cost)?;
            Err(AppError::InvalidCredentials)
        }
    }
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Always succeeds with the same message so callers cannot discover which emails have accounts.
pub async fn request_reset(
    pool: &SqlitePool,
    config: &Config,
    notifier: &dyn Notifier,
    email: &str,
) -> Result<&'static str> {
    let email = email.trim();
    let token = uuid::Uuid::new_v4().simple().to_string();
    let expires_at = (Utc::now() + Duration::minutes(config.reset_token_ttl_minutes)).naive_utc();

    let updated = sqlx::query(
        "UPDATE users SET reset_token = ?, reset_token_expires_at = ? WHERE email = ?",
    )
    .bind(&token)
    .bind(expires_at)
    .bind(email)
    .execute(pool)
    .await?;

    if updated.rows_affected() > 0 {
        notifier.send_reset_token(email, &token);
        info!("Issued password reset token for {}", email);
    }

    Ok(RESET_REQUESTED_MESSAGE)
}

pub async fn reset_password(
    pool: &SqlitePool,
    config: &Config,
    token: &str,
    new_password: &str,
) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::InvalidToken);
    }
    if new_password.is_empty() {
        return Err(AppError::Validation("New password cannot be empty".to_string()));
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE reset_token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::InvalidToken)?;

    let now = Utc::now().naive_utc();
    if user.reset_token_expires_at.map_or(true, |expires_at| expires_at < now) {
        return Err(AppError::InvalidToken);
    }

    let hashed_password = auth::hash_password(new_password, config.bcrypt_cost)?;
    // Matching on the token as well keeps a concurrent reset from reusing it.
    let updated = sqlx::query(
        "UPDATE users SET password = ?, reset_token = NULL, reset_token_expires_at = NULL \
         WHERE id = ? AND reset_token = ?",
    )
    .bind(&hashed_password)
    .bind(user.id)
    .bind(token)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::InvalidToken);
    }

    info!("Password reset for user {}", user.id);
    Ok(())
}
