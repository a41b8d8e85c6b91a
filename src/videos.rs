use std::collections::HashMap;

use chrono::Utc;
use log::{info, warn};
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::file_store::FileStore;
use crate::models::{NewVideo, User, Video, VideoSummary, DEFAULT_CATEGORY, DEFAULT_DURATION};

const SUMMARY_SELECT: &str = "SELECT v.id, v.title, v.description, v.category, v.duration, v.file_path, \
     v.user_id, u.username AS uploader, v.created_at \
     FROM videos v JOIN users u ON u.id = v.user_id";

pub fn validate(new_video: &NewVideo) -> Result<()> {
    if new_video.title.trim().is_empty() || new_video.description.trim().is_empty() {
        return Err(AppError::Validation(
            "Title and description cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn or_default(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

pub async fn create(
    pool: &SqlitePool,
    owner: &User,
    new_video: &NewVideo,
    storage_key: &str,
) -> Result<i64> {
    validate(new_video)?;

    let id = sqlx::query(
        "INSERT INTO videos (title, description, category, duration, file_path, user_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new_video.title)
    .bind(&new_video.description)
    .bind(or_default(&new_video.category, DEFAULT_CATEGORY))
    .bind(or_default(&new_video.duration, DEFAULT_DURATION))
    .bind(storage_key)
    .bind(owner.id)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!("User {} uploaded video {} as {}", owner.id, id, storage_key);
    Ok(id)
}

pub async fn find(pool: &SqlitePool, video_id: i64) -> Result<Option<Video>> {
    let video = sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE id = ?")
        .bind(video_id)
        .fetch_optional(pool)
        .await?;
    Ok(video)
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<VideoSummary>> {
    let mut videos = sqlx::query_as::<_, VideoSummary>(&format!(
        "{} ORDER BY v.created_at DESC, v.id DESC",
        SUMMARY_SELECT
    ))
    .fetch_all(pool)
    .await?;

    let likes: Vec<(i64, i64)> = sqlx::query_as("SELECT video_id, user_id FROM likes ORDER BY id")
        .fetch_all(pool)
        .await?;
    let mut likes_by_video: HashMap<i64, Vec<i64>> = HashMap::new();
    for (video_id, user_id) in likes {
        likes_by_video.entry(video_id).or_default().push(user_id);
    }

    for video in &mut videos {
        video.likes = likes_by_video.remove(&video.id).unwrap_or_default();
    }
    Ok(videos)
}

pub async fn get_summary(pool: &SqlitePool, video_id: i64) -> Result<VideoSummary> {
    let mut video = sqlx::query_as::<_, VideoSummary>(&format!("{} WHERE v.id = ?", SUMMARY_SELECT))
        .bind(video_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    video.likes = sqlx::query_scalar("SELECT user_id FROM likes WHERE video_id = ? ORDER BY id")
        .bind(video_id)
        .fetch_all(pool)
        .await?;
    Ok(video)
}

/// Owner-only delete. Comments, likes and the row go in one transaction; the
/// backing file is removed before commit so an I/O failure rolls everything back.
pub async fn delete(pool: &SqlitePool, store: &FileStore, video_id: i64, user: &User) -> Result<()> {
    let mut tx = pool.begin().await?;

    // Writing first takes the SQLite write lock before anything is read.
    // Both deletes only match when the caller owns the video.
    sqlx::query(
        "DELETE FROM comments WHERE video_id IN (SELECT id FROM videos WHERE id = ? AND user_id = ?)",
    )
    .bind(video_id)
    .bind(user.id)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "DELETE FROM likes WHERE video_id IN (SELECT id FROM videos WHERE id = ? AND user_id = ?)",
    )
    .bind(video_id)
    .bind(user.id)
    .execute(&mut *tx)
    .await?;

    let video = sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE id = ?")
        .bind(video_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    if video.user_id != user.id {
        warn!("User {} tried to delete video {} owned by {}", user.id, video_id, video.user_id);
        return Err(AppError::Forbidden(
            "You are not authorized to delete this video".to_string(),
        ));
    }

    sqlx::query("DELETE FROM videos WHERE id = ?")
        .bind(video_id)
        .execute(&mut *tx)
        .await?;

    store.remove(&video.file_path).await?;
    tx.commit().await?;

    info!("User {} deleted video {}", user.id, video_id);
    Ok(())
}
