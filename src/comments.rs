use chrono::Utc;
use log::{info, warn};
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::models::{CommentRow, CommentView, User};

const COMMENT_SELECT: &str = "SELECT c.id, c.video_id, c.user_id, c.comment, u.username, c.created_at \
     FROM comments c JOIN users u ON u.id = c.user_id";

pub async fn list(pool: &SqlitePool, video_id: i64) -> Result<Vec<CommentView>> {
    let rows = sqlx::query_as::<_, CommentRow>(&format!(
        "{} WHERE c.video_id = ? ORDER BY c.created_at ASC, c.id ASC",
        COMMENT_SELECT
    ))
    .bind(video_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CommentView::from).collect())
}

pub async fn add(pool: &SqlitePool, video_id: i64, user: &User, text: &str) -> Result<CommentView> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("Comment cannot be empty".to_string()));
    }

    // The existence check rides on the insert itself, so no comment can outlive its video.
    let created_at = Utc::now().naive_utc();
    let inserted = sqlx::query(
        "INSERT INTO comments (video_id, user_id, comment, created_at) \
         SELECT ?, ?, ?, ? WHERE EXISTS (SELECT 1 FROM videos WHERE id = ?)",
    )
    .bind(video_id)
    .bind(user.id)
    .bind(text)
    .bind(created_at)
    .bind(video_id)
    .execute(pool)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(AppError::NotFound("Video not found".to_string()));
    }
    let id = inserted.last_insert_rowid();

    info!("User {} commented on video {} ({})", user.id, video_id, id);
    Ok(CommentView::from(CommentRow {
        id,
        video_id,
        user_id: user.id,
        comment: text.to_string(),
        username: user.username.clone(),
        created_at,
    }))
}

/// Deletes only the caller's own comment; a miss is then told apart as
/// "not found" or "forbidden".
pub async fn delete(pool: &SqlitePool, comment_id: i64, user: &User) -> Result<()> {
    let removed = sqlx::query("DELETE FROM comments WHERE id = ? AND user_id = ?")
        .bind(comment_id)
        .bind(user.id)
        .execute(pool)
        .await?
        .rows_affected();

    if removed == 0 {
        let owner: i64 = sqlx::query_scalar("SELECT user_id FROM comments WHERE id = ?")
            .bind(comment_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        warn!("User {} tried to delete comment {} owned by {}", user.id, comment_id, owner);
        return Err(AppError::Forbidden(
            "You are not authorized to delete this comment".to_string(),
        ));
    }

    info!("User {} deleted comment {}", user.id, comment_id);
    Ok(())
}
