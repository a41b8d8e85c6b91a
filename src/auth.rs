use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use sqlx::SqlitePool;

use crate::accounts;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Claims, User};

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    Ok(bcrypt::hash(password, cost)?)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn issue_token(user: &User, config: &Config) -> Result<String> {
    let claims = Claims {
        user_id: user.id,
        username: user.username.clone(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(config.token_ttl_hours)).timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )?;
    Ok(token)
}

pub fn decode_token(token: &str, config: &Config) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| debug!("Rejected bearer token: {}", e))
    .ok()
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub async fn resolve(pool: &SqlitePool, config: &Config, token: &str) -> Result<Option<User>> {
    let claims = match decode_token(token, config) {
        Some(claims) => claims,
        None => return Ok(None),
    };

    accounts::find_by_id(pool, claims.user_id).await
}

pub async fn require(pool: &SqlitePool, config: &Config, token: Option<&str>) -> Result<User> {
    let token = token.ok_or(AppError::Unauthorized)?;
    resolve(pool, config, token).await?.ok_or(AppError::Unauthorized)
}
