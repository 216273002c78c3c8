use sqlx::{Row, SqlitePool};

use crate::error::AppResult;
use crate::models::{from_millis, ChannelStats, DashboardVideo};
use crate::pagination::{Page, PageRequest};
use crate::store::{flag, window_total};

/// Aggregate totals for one channel. Each total is its own scalar subquery
/// so the edge joins never multiply each other.
pub async fn channel_stats(pool: &SqlitePool, channel_id: &str) -> AppResult<ChannelStats> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1) AS total_subscribers,
            (SELECT COUNT(*) FROM videos WHERE owner_id = ?1) AS total_videos,
            (SELECT COALESCE(SUM(views), 0) FROM videos WHERE owner_id = ?1) AS total_views,
            (SELECT COUNT(*) FROM likes l JOIN videos v ON v.id = l.video_id
              WHERE v.owner_id = ?1) AS total_likes
        "#,
    )
    .bind(channel_id)
    .fetch_one(pool)
    .await?;

    Ok(ChannelStats {
        total_subscribers: row.try_get("total_subscribers")?,
        total_videos: row.try_get("total_videos")?,
        total_views: row.try_get("total_views")?,
        total_likes: row.try_get("total_likes")?,
    })
}

/// The channel's own videos, published or not, newest first.
pub async fn channel_videos(
    pool: &SqlitePool,
    channel_id: &str,
    page: PageRequest,
) -> AppResult<Page<DashboardVideo>> {
    let rows = sqlx::query(
        r#"
        SELECT v.id, v.video_file, v.thumbnail, v.title, v.description, v.duration, v.views,
               v.is_published, v.created_at,
               COUNT(l.id) AS likes_count,
               COUNT(*) OVER () AS total_docs
        FROM videos v
        LEFT JOIN likes l ON l.video_id = v.id
        WHERE v.owner_id = ?1
        GROUP BY v.id
        ORDER BY v.created_at DESC, v.rowid DESC
        LIMIT ?2 OFFSET ?3
        "#,
    )
    .bind(channel_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total = match window_total(&rows)? {
        Some(total) => total,
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM videos WHERE owner_id = ?")
                .bind(channel_id)
                .fetch_one(pool)
                .await?
        }
    };

    let docs = rows
        .iter()
        .map(|row| {
            Ok(DashboardVideo {
                id: row.try_get("id")?,
                video_file: row.try_get("video_file")?,
                thumbnail: row.try_get("thumbnail")?,
                title: row.try_get("title")?,
                description: row.try_get("description")?,
                duration: row.try_get("duration")?,
                views: row.try_get("views")?,
                is_published: flag(row, "is_published")?,
                created_at: from_millis(row.try_get("created_at")?),
                likes_count: row.try_get("likes_count")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(Page::new(docs, total, page))
}
