use std::env;
use std::path::PathBuf;

use log::warn;
use thiserror::Error;

const DEV_JWT_SECRET: &str = "insecure_development_jwt_secret";

const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;
const MAX_RESET_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a valid number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be between {min} and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub uploads_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub reset_token_ttl_minutes: i64,
    pub bcrypt_cost: u32,
    pub max_upload_bytes: u64,
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET is not set, falling back to an insecure development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:4200".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://videos.db".to_string()),
            uploads_dir: PathBuf::from(lookup("UPLOADS_DIR").unwrap_or_else(|| "./uploads".to_string())),
            jwt_secret,
            token_ttl_hours: in_range(
                "TOKEN_TTL_HOURS",
                parse_number(&lookup, "TOKEN_TTL_HOURS", 24)?,
                1,
                MAX_TOKEN_TTL_HOURS,
            )?,
            reset_token_ttl_minutes: in_range(
                "RESET_TOKEN_TTL_MINUTES",
                parse_number(&lookup, "RESET_TOKEN_TTL_MINUTES", 60)?,
                1,
                MAX_RESET_TOKEN_TTL_MINUTES,
            )?,
            bcrypt_cost: in_range(
                "BCRYPT_COST",
                parse_number(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST as i64)?,
                4,
                31,
            )? as u32,
            max_upload_bytes: parse_number(&lookup, "MAX_UPLOAD_BYTES", 2 * 1024 * 1024 * 1024)?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_number(&lookup, "PORT", 8000)?,
            cors_allowed_origins,
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}

fn in_range(key: &'static str, value: i64, min: i64, max: i64) -> Result<i64, ConfigError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange { key, value, min, max })
    }
}
