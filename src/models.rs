use serde::{Deserialize, Serialize};
use chrono::NaiveDateTime;
use sqlx::FromRow;

pub const DEFAULT_CATEGORY: &str = "Other";
pub const DEFAULT_DURATION: &str = "00:00";
pub const COMMENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub duration: String,
    pub file_path: String,
    pub user_id: i64,
    pub created_at: NaiveDateTime,
}

/// Fields collected from an upload form before the row is written.
#[derive(Debug, Default)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub duration: Option<String>,
}

/// Catalog entry as listed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VideoSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub duration: String,
    pub file_path: String,
    pub user_id: i64,
    #[sqlx(skip)]
    pub likes: Vec<i64>,
    pub uploader: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub video_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeStatus {
    pub liked: bool,
    pub likes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikedResponse {
    pub liked: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub video_id: i64,
    pub user_id: i64,
    pub comment: String,
    pub username: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub text: String,
    pub user_id: i64,
    pub username: String,
    pub video_id: i64,
    pub created_at: String,
}

impl From<CommentRow> for CommentView {
    fn from(row: CommentRow) -> Self {
        CommentView {
            id: row.id,
            text: row.comment,
            user_id: row.user_id,
            username: row.username,
            video_id: row.video_id,
            created_at: row.created_at.format(COMMENT_TIME_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentRequest {
    pub comment: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentCreated {
    pub message: String,
    pub comment: CommentView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        MessageResponse { message: message.into() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub exp: usize,
}
