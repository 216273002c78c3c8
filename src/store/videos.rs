//! Video feeds, the video page, and owner edits.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{bad_request, not_found, AppResult};
use crate::models::{
    from_millis, new_id, now_millis, VideoCard, VideoChannel, VideoDetail, VideoRecord,
    VideoSummary,
};
use crate::pagination::{Page, PageRequest, VideoSort};
use crate::store::{flag, owner_from_row, ownership_miss, users, window_total, OWNER_COLUMNS};

const RECORD_COLUMNS: &str = "id, owner_id, video_file, thumbnail, title, description, duration, views, is_published, created_at, updated_at";

/// Compact video projection for queries that alias videos as `v`.
pub(crate) const SUMMARY_COLUMNS: &str =
    "v.id, v.title, v.description, v.thumbnail, v.duration, v.views, v.created_at";

pub(crate) fn summary_from_row(row: &SqliteRow) -> Result<VideoSummary, sqlx::Error> {
    Ok(VideoSummary {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        thumbnail: row.try_get("thumbnail")?,
        duration: row.try_get("duration")?,
        views: row.try_get("views")?,
        created_at: from_millis(row.try_get("created_at")?),
        owner: owner_from_row(row)?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<VideoRecord, sqlx::Error> {
    Ok(VideoRecord {
        id: row.try_get("id")?,
        owner: row.try_get("owner_id")?,
        video_file: row.try_get("video_file")?,
        thumbnail: row.try_get("thumbnail")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        duration: row.try_get("duration")?,
        views: row.try_get("views")?,
        is_published: flag(row, "is_published")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub owner_id: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub is_published: bool,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct VideoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

impl VideoUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.thumbnail.is_none()
    }
}

/// Case-folded text that `search` matches against. Folding happens here
/// rather than in SQLite, whose `lower()` only knows ASCII.
pub(crate) fn search_text(title: &str, description: &str) -> String {
    format!("{}\n{}", title, description).to_lowercase()
}

pub async fn insert_video(pool: &SqlitePool, new: NewVideo) -> AppResult<VideoRecord> {
    let now = now_millis();
    let title = new.title.trim();
    let description = new.description.trim();
    let sql = format!(
        "INSERT INTO videos (id, owner_id, video_file, thumbnail, title, description, search_text, duration, views, is_published, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?) RETURNING {}",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(new_id())
        .bind(&new.owner_id)
        .bind(&new.video_file)
        .bind(&new.thumbnail)
        .bind(title)
        .bind(description)
        .bind(search_text(title, description))
        .bind(new.duration)
        .bind(new.is_published)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;
    Ok(record_from_row(&row)?)
}

/// Published videos whose title or description contains `query`
/// (case-insensitive substring), owner inlined, with like counts.
pub async fn search(
    pool: &SqlitePool,
    query: &str,
    sort: VideoSort,
    page: PageRequest,
) -> AppResult<Page<VideoCard>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Err(bad_request("search query is missing"));
    }

    let sql = format!(
        r#"
        SELECT v.id, v.video_file, v.thumbnail, v.title, v.description, v.duration, v.views, v.created_at,
               {owner},
               COUNT(l.id) AS likes_count,
               COUNT(*) OVER () AS total_docs
        FROM videos v
        LEFT JOIN users o ON o.id = v.owner_id
        LEFT JOIN likes l ON l.video_id = v.id
        WHERE v.is_published = 1
          AND instr(v.search_text, ?1) > 0
        GROUP BY v.id
        ORDER BY {order}
        LIMIT ?2 OFFSET ?3
        "#,
        owner = OWNER_COLUMNS,
        order = sort.order_by()
    );

    let rows = sqlx::query(&sql)
        .bind(&needle)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

    let total = match window_total(&rows)? {
        Some(total) => total,
        None => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM videos v WHERE v.is_published = 1 AND instr(v.search_text, ?1) > 0",
            )
            .bind(&needle)
            .fetch_one(pool)
            .await?
        }
    };

    let docs = rows
        .iter()
        .map(|row| {
            Ok(VideoCard {
                id: row.try_get("id")?,
                video_file: row.try_get("video_file")?,
                thumbnail: row.try_get("thumbnail")?,
                title: row.try_get("title")?,
                description: row.try_get("description")?,
                duration: row.try_get("duration")?,
                views: row.try_get("views")?,
                created_at: from_millis(row.try_get("created_at")?),
                owner: owner_from_row(row)?,
                likes_count: row.try_get("likes_count")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(Page::new(docs, total, page))
}

/// The video page as seen by `viewer_id`. Unpublished videos are only
/// visible to their owner.
pub async fn video_detail(pool: &SqlitePool, viewer_id: &str, video_id: &str) -> AppResult<VideoDetail> {
    let row = sqlx::query(
        r#"
        SELECT v.id, v.video_file, v.thumbnail, v.title, v.description, v.duration, v.views,
               v.is_published, v.created_at,
               o.id AS owner_id, o.username AS owner_username,
               o.full_name AS owner_full_name, o.avatar AS owner_avatar,
               COUNT(DISTINCT l.id) AS likes_count,
               COALESCE(MAX(l.liked_by = ?1), 0) AS is_liked,
               COUNT(DISTINCT s.id) AS subscribers_count,
               COALESCE(MAX(s.subscriber_id = ?1), 0) AS is_subscribed
        FROM videos v
        LEFT JOIN users o ON o.id = v.owner_id
        LEFT JOIN likes l ON l.video_id = v.id
        LEFT JOIN subscriptions s ON s.channel_id = v.owner_id
        WHERE v.id = ?2 AND (v.is_published = 1 OR v.owner_id = ?1)
        GROUP BY v.id
        "#,
    )
    .bind(viewer_id)
    .bind(video_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(not_found("video not found"));
    };

    let owner = owner_from_row(&row)?
        .map(|o| -> Result<VideoChannel, sqlx::Error> {
            Ok(VideoChannel {
                id: o.id,
                username: o.username,
                full_name: o.full_name,
                avatar: o.avatar,
                subscribers_count: row.try_get("subscribers_count")?,
                is_subscribed: flag(&row, "is_subscribed")?,
            })
        })
        .transpose()?;

    Ok(VideoDetail {
        id: row.try_get("id")?,
        video_file: row.try_get("video_file")?,
        thumbnail: row.try_get("thumbnail")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        duration: row.try_get("duration")?,
        views: row.try_get("views")?,
        is_published: flag(&row, "is_published")?,
        created_at: from_millis(row.try_get("created_at")?),
        owner,
        likes_count: row.try_get("likes_count")?,
        is_liked: flag(&row, "is_liked")?,
    })
}

pub async fn increment_views(pool: &SqlitePool, video_id: &str) -> AppResult<()> {
    sqlx::query("UPDATE videos SET views = views + 1 WHERE id = ?")
        .bind(video_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Fetches the video page and records the view.
///
/// The view counter increment and the history insert run concurrently and
/// independently: either may fail without undoing the other, and neither
/// failure fails the fetch. The returned `views` includes this view when
/// the increment succeeded.
pub async fn watch_video(pool: &SqlitePool, viewer_id: &str, video_id: &str) -> AppResult<VideoDetail> {
    let mut detail = video_detail(pool, viewer_id, video_id).await?;

    let (views, history) = tokio::join!(
        increment_views(pool, video_id),
        users::add_to_watch_history(pool, viewer_id, video_id)
    );

    match views {
        Ok(()) => detail.views += 1,
        Err(err) => tracing::warn!(video_id, error = %err, "view count increment failed"),
    }
    if let Err(err) = history {
        tracing::warn!(video_id, viewer_id, error = %err, "watch history insert failed");
    }

    Ok(detail)
}

/// Applies an owner edit. Returns the updated record and, when the
/// thumbnail was replaced, the previous thumbnail URL.
pub async fn update_video(
    pool: &SqlitePool,
    owner_id: &str,
    video_id: &str,
    update: &VideoUpdate,
) -> AppResult<(VideoRecord, Option<String>)> {
    if update.is_empty() {
        return Err(bad_request("nothing to update: provide title, description, or thumbnail"));
    }

    let mut tx = pool.begin().await?;

    let current = sqlx::query(
        "SELECT title, description, thumbnail FROM videos WHERE id = ? AND owner_id = ?",
    )
    .bind(video_id)
    .bind(owner_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(current) = current else {
        tx.rollback().await?;
        return Err(ownership_miss(pool, "videos", video_id, "video").await);
    };
    let previous_thumbnail: String = current.try_get("thumbnail")?;
    let title = match update.title.as_deref() {
        Some(title) => title.trim().to_string(),
        None => current.try_get("title")?,
    };
    let description = match update.description.as_deref() {
        Some(description) => description.trim().to_string(),
        None => current.try_get("description")?,
    };

    let sql = format!(
        "UPDATE videos SET title = ?, description = ?, search_text = ?, \
         thumbnail = COALESCE(?, thumbnail), updated_at = ? WHERE id = ? RETURNING {}",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(&title)
        .bind(&description)
        .bind(search_text(&title, &description))
        .bind(update.thumbnail.as_deref())
        .bind(now_millis())
        .bind(video_id)
        .fetch_one(&mut *tx)
        .await?;
    let record = record_from_row(&row)?;

    tx.commit().await?;

    let replaced = update
        .thumbnail
        .as_ref()
        .map(|_| previous_thumbnail)
        .filter(|old| old != &record.thumbnail);
    Ok((record, replaced))
}

/// Deletes an owned video; likes, comments, playlist entries and history
/// rows cascade. Returns the deleted record so its media can be removed.
pub async fn delete_video(pool: &SqlitePool, owner_id: &str, video_id: &str) -> AppResult<VideoRecord> {
    let sql = format!(
        "DELETE FROM videos WHERE id = ? AND owner_id = ? RETURNING {}",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(video_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(record_from_row(&row)?),
        None => Err(ownership_miss(pool, "videos", video_id, "video").await),
    }
}

pub async fn toggle_publish(pool: &SqlitePool, owner_id: &str, video_id: &str) -> AppResult<VideoRecord> {
    let sql = format!(
        "UPDATE videos SET is_published = 1 - is_published, updated_at = ? \
         WHERE id = ? AND owner_id = ? RETURNING {}",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(now_millis())
        .bind(video_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(record_from_row(&row)?),
        None => Err(ownership_miss(pool, "videos", video_id, "video").await),
    }
}
