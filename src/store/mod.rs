//! View-shaping aggregation layer.
//!
//! Every read in this module is one SQL statement per logical view. The
//! statements follow the same shape:
//!
//! 1. select the parent rows (filter, sort, paginate),
//! 2. LEFT JOIN the owning user and collapse it into one embedded object,
//! 3. LEFT JOIN edge tables (likes, subscriptions) and fold them with
//!    `GROUP BY` into counts and `MAX(actor = viewer)` membership flags,
//! 4. project only the declared output columns.
//!
//! Totals for paginated lists come from a `COUNT(*) OVER ()` window in the
//! same statement.
//!
//! Ownership-gated mutations carry the owner match in the mutating statement
//! itself (`WHERE id = ? AND owner_id = ?`). Only when nothing matched does
//! [`ownership_miss`] probe the table, to tell "absent" (404) from "not
//! yours" (403).
//!
//! | Module | Views and mutations |
//! |--------|---------------------|
//! | [`users`] | accounts, channel profile, watch history |
//! | [`videos`] | search feed, detail + view side effects, owner edits |
//! | [`comments`] | comment threads, owner edits |
//! | [`posts`] | user post feeds, owner edits |
//! | [`likes`] | like toggles, liked videos |
//! | [`subscriptions`] | subscription toggle, subscriber lists |
//! | [`playlists`] | playlist lists and detail, membership |
//! | [`dashboard`] | channel stats and the owner's video list |

pub mod comments;
pub mod dashboard;
pub mod likes;
pub mod playlists;
pub mod posts;
pub mod subscriptions;
pub mod users;
pub mod videos;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{forbidden, not_found, AppError};
use crate::models::OwnerSummary;

/// Owner projection for queries that alias the users table as `o`.
pub(crate) const OWNER_COLUMNS: &str =
    "o.id AS owner_id, o.username AS owner_username, o.full_name AS owner_full_name, o.avatar AS owner_avatar";

/// Collapses the aliased owner columns into one embedded object. A missing
/// owner (no joined row) yields `None`.
pub(crate) fn owner_from_row(row: &SqliteRow) -> Result<Option<OwnerSummary>, sqlx::Error> {
    let id: Option<String> = row.try_get("owner_id")?;
    let Some(id) = id else {
        return Ok(None);
    };
    Ok(Some(OwnerSummary {
        id,
        username: row.try_get("owner_username")?,
        full_name: row.try_get("owner_full_name")?,
        avatar: row.try_get("owner_avatar")?,
    }))
}

/// Reads a 0/1 aggregate column as a boolean.
pub(crate) fn flag(row: &SqliteRow, column: &str) -> Result<bool, sqlx::Error> {
    let value: Option<i64> = row.try_get(column)?;
    Ok(value.unwrap_or(0) != 0)
}

/// Reads the `total_docs` window column from the first row of a page.
pub(crate) fn window_total(rows: &[SqliteRow]) -> Result<Option<i64>, sqlx::Error> {
    match rows.first() {
        Some(row) => Ok(Some(row.try_get("total_docs")?)),
        None => Ok(None),
    }
}

/// Classifies an ownership-gated statement that matched nothing.
///
/// `table` is always a compile-time table name.
pub(crate) async fn ownership_miss(
    pool: &SqlitePool,
    table: &'static str,
    id: &str,
    label: &str,
) -> AppError {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table);
    match sqlx::query_scalar::<_, i64>(&sql)
        .bind(id)
        .fetch_one(pool)
        .await
    {
        Ok(0) => not_found(format!("{} not found", label)),
        Ok(_) => forbidden(format!("only the owner can modify this {}", label)),
        Err(err) => err.into(),
    }
}

/// Rows of a list view driven `FROM users ... LEFT JOIN` the listed items.
///
/// No rows means the user does not exist. A row whose `id` is NULL is the
/// placeholder an item-less user produces and is dropped.
pub(crate) fn user_list_rows<'r>(rows: &'r [SqliteRow], label: &str) -> Result<Vec<&'r SqliteRow>, AppError> {
    if rows.is_empty() {
        return Err(not_found(format!("{} not found", label)));
    }
    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Option<String> = row.try_get("id")?;
        if id.is_some() {
            items.push(row);
        }
    }
    Ok(items)
}

/// Returns 404 unless a row with `id` exists in `table`.
pub(crate) async fn ensure_exists(
    pool: &SqlitePool,
    table: &'static str,
    id: &str,
    label: &str,
) -> Result<(), AppError> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table);
    let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(pool).await?;
    if count == 0 {
        return Err(not_found(format!("{} not found", label)));
    }
    Ok(())
}

/// Returns 404 unless the video exists and `viewer_id` may see it
/// (published, or owned by the viewer).
pub(crate) async fn ensure_visible_video(
    pool: &SqlitePool,
    viewer_id: &str,
    video_id: &str,
) -> Result<(), AppError> {
    let visible: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM videos WHERE id = ?1 AND (is_published = 1 OR owner_id = ?2)",
    )
    .bind(video_id)
    .bind(viewer_id)
    .fetch_one(pool)
    .await?;
    if visible == 0 {
        return Err(not_found("video not found"));
    }
    Ok(())
}
