use chrono::Utc;
use log::{error, info};
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::models::{LikeStatus, User};

/// Flips the like for (video, user). The transaction opens with the DELETE so
/// it holds the write lock from its first statement; the unique index on the
/// pair backs up the insert.
pub async fn toggle(pool: &SqlitePool, video_id: i64, user: &User) -> Result<LikeStatus> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM likes WHERE video_id = ? AND user_id = ?")
        .bind(video_id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let liked = removed == 0;
    if liked {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO likes (video_id, user_id, created_at) \
             SELECT ?, ?, ? WHERE EXISTS (SELECT 1 FROM videos WHERE id = ?)",
        )
        .bind(video_id)
        .bind(user.id)
        .bind(Utc::now().naive_utc())
        .bind(video_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(AppError::NotFound("Video not found".to_string()));
        }
    }

    let likes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE video_id = ?")
        .bind(video_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    info!("User {} {} video {}", user.id, if liked { "liked" } else { "unliked" }, video_id);
    Ok(LikeStatus { liked, likes })
}

/// Soft check for anonymous viewers: no user or a storage failure reads as "not liked".
pub async fn check(pool: &SqlitePool, video_id: i64, user: Option<&User>) -> bool {
    let user = match user {
        Some(user) => user,
        None => return false,
    };

    let result: std::result::Result<Option<i64>, sqlx::Error> =
        sqlx::query_scalar("SELECT id FROM likes WHERE video_id = ? AND user_id = ?")
            .bind(video_id)
            .bind(user.id)
            .fetch_optional(pool)
            .await;

    match result {
        Ok(found) => found.is_some(),
        Err(e) => {
            error!("Error checking like state for video {}: {:?}", video_id, e);
            false
        }
    }
}
