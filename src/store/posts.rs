use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::AppResult;
use crate::models::{from_millis, new_id, now_millis, ContentView, PostRecord};
use crate::store::comments::{content_from_row, require_content};
use crate::store::{ownership_miss, user_list_rows, OWNER_COLUMNS};

const RECORD_COLUMNS: &str = "id, owner_id, content, created_at, updated_at";

fn record_from_row(row: &SqliteRow) -> Result<PostRecord, sqlx::Error> {
    Ok(PostRecord {
        id: row.try_get("id")?,
        owner: row.try_get("owner_id")?,
        content: row.try_get("content")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

pub async fn create_post(pool: &SqlitePool, owner_id: &str, content: &str) -> AppResult<PostRecord> {
    let content = require_content(content)?;
    let now = now_millis();
    let sql = format!(
        "INSERT INTO posts (id, owner_id, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?) RETURNING {}",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(new_id())
        .bind(owner_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;
    Ok(record_from_row(&row)?)
}

/// A user's posts, newest first, with like counts relative to `viewer_id`.
pub async fn user_posts(pool: &SqlitePool, viewer_id: &str, user_id: &str) -> AppResult<Vec<ContentView>> {
    let sql = format!(
        r#"
        SELECT p.id, p.content, p.created_at, p.updated_at,
               {owner},
               COUNT(l.id) AS likes_count,
               COALESCE(MAX(l.liked_by = ?1), 0) AS is_liked
        FROM users o
        LEFT JOIN posts p ON p.owner_id = o.id
        LEFT JOIN likes l ON l.post_id = p.id
        WHERE o.id = ?2
        GROUP BY p.id
        ORDER BY p.created_at DESC, p.rowid DESC
        "#,
        owner = OWNER_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(viewer_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(user_list_rows(&rows, "user")?
        .into_iter()
        .map(content_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

pub async fn update_post(
    pool: &SqlitePool,
    owner_id: &str,
    post_id: &str,
    content: &str,
) -> AppResult<PostRecord> {
    let content = require_content(content)?;
    let sql = format!(
        "UPDATE posts SET content = ?, updated_at = ? WHERE id = ? AND owner_id = ? RETURNING {}",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(content)
        .bind(now_millis())
        .bind(post_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(record_from_row(&row)?),
        None => Err(ownership_miss(pool, "posts", post_id, "post").await),
    }
}

pub async fn delete_post(pool: &SqlitePool, owner_id: &str, post_id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ? AND owner_id = ?")
        .bind(post_id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ownership_miss(pool, "posts", post_id, "post").await);
    }
    Ok(())
}
