use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{bad_request, AppResult};
use crate::models::{from_millis, new_id, now_millis, CommentRecord, ContentView};
use crate::pagination::{Page, PageRequest};
use crate::store::{ensure_visible_video, flag, owner_from_row, ownership_miss, window_total, OWNER_COLUMNS};

const RECORD_COLUMNS: &str = "id, owner_id, video_id, content, created_at, updated_at";

fn record_from_row(row: &SqliteRow) -> Result<CommentRecord, sqlx::Error> {
    Ok(CommentRecord {
        id: row.try_get("id")?,
        owner: row.try_get("owner_id")?,
        video: row.try_get("video_id")?,
        content: row.try_get("content")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

/// Content row shared by comment threads and post feeds.
pub(crate) fn content_from_row(row: &SqliteRow) -> Result<ContentView, sqlx::Error> {
    Ok(ContentView {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
        owner: owner_from_row(row)?,
        likes_count: row.try_get("likes_count")?,
        is_liked: flag(row, "is_liked")?,
    })
}

pub(crate) fn require_content(content: &str) -> AppResult<&str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(bad_request("content is required"));
    }
    Ok(trimmed)
}

/// Comments on a visible video, newest first.
pub async fn video_comments(
    pool: &SqlitePool,
    viewer_id: &str,
    video_id: &str,
    page: PageRequest,
) -> AppResult<Page<ContentView>> {
    ensure_visible_video(pool, viewer_id, video_id).await?;

    let sql = format!(
        r#"
        SELECT c.id, c.content, c.created_at, c.updated_at,
               {owner},
               COUNT(l.id) AS likes_count,
               COALESCE(MAX(l.liked_by = ?1), 0) AS is_liked,
               COUNT(*) OVER () AS total_docs
        FROM comments c
        LEFT JOIN users o ON o.id = c.owner_id
        LEFT JOIN likes l ON l.comment_id = c.id
        WHERE c.video_id = ?2
        GROUP BY c.id
        ORDER BY c.created_at DESC, c.rowid DESC
        LIMIT ?3 OFFSET ?4
        "#,
        owner = OWNER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(viewer_id)
        .bind(video_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

    let total = match window_total(&rows)? {
        Some(total) => total,
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE video_id = ?")
                .bind(video_id)
                .fetch_one(pool)
                .await?
        }
    };

    let docs = rows
        .iter()
        .map(content_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(docs, total, page))
}

pub async fn add_comment(
    pool: &SqlitePool,
    owner_id: &str,
    video_id: &str,
    content: &str,
) -> AppResult<CommentRecord> {
    let content = require_content(content)?;
    ensure_visible_video(pool, owner_id, video_id).await?;

    let now = now_millis();
    let sql = format!(
        "INSERT INTO comments (id, owner_id, video_id, content, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(new_id())
        .bind(owner_id)
        .bind(video_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;
    Ok(record_from_row(&row)?)
}

pub async fn update_comment(
    pool: &SqlitePool,
    owner_id: &str,
    comment_id: &str,
    content: &str,
) -> AppResult<CommentRecord> {
    let content = require_content(content)?;
    let sql = format!(
        "UPDATE comments SET content = ?, updated_at = ? WHERE id = ? AND owner_id = ? RETURNING {}",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(content)
        .bind(now_millis())
        .bind(comment_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(record_from_row(&row)?),
        None => Err(ownership_miss(pool, "comments", comment_id, "comment").await),
    }
}

pub async fn delete_comment(pool: &SqlitePool, owner_id: &str, comment_id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM comments WHERE id = ? AND owner_id = ?")
        .bind(comment_id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ownership_miss(pool, "comments", comment_id, "comment").await);
    }
    Ok(())
}
