use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{bad_request, conflict_on_unique, internal, not_found, AppResult};
use crate::models::{
    from_millis, new_id, now_millis, OwnerSummary, PlaylistDetail, PlaylistRecord, PlaylistSummary,
    VideoSummary,
};
use crate::store::{ensure_visible_video, owner_from_row, ownership_miss, user_list_rows, OWNER_COLUMNS};

const RECORD_COLUMNS: &str = "id, owner_id, name, description, created_at, updated_at";

/// Playlist video as embedded by `json_group_array`. Timestamps arrive as
/// raw milliseconds.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddedVideo {
    id: String,
    title: String,
    description: String,
    thumbnail: String,
    duration: f64,
    views: i64,
    created_at: i64,
    owner_id: Option<String>,
    owner_username: Option<String>,
    owner_full_name: Option<String>,
    owner_avatar: Option<String>,
}

impl From<EmbeddedVideo> for VideoSummary {
    fn from(v: EmbeddedVideo) -> Self {
        let owner = v.owner_id.map(|id| OwnerSummary {
            id,
            username: v.owner_username.unwrap_or_default(),
            full_name: v.owner_full_name.unwrap_or_default(),
            avatar: v.owner_avatar.unwrap_or_default(),
        });
        VideoSummary {
            id: v.id,
            title: v.title,
            description: v.description,
            thumbnail: v.thumbnail,
            duration: v.duration,
            views: v.views,
            created_at: from_millis(v.created_at),
            owner,
        }
    }
}

/// Decodes the embedded array. A playlist with no visible videos still
/// yields one all-null element from the LEFT JOIN; those are dropped.
fn embedded_videos(raw: &str) -> AppResult<Vec<VideoSummary>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| internal(format!("malformed playlist videos: {}", e)))?;
    values
        .into_iter()
        .filter(|v| !v["id"].is_null())
        .map(|v| {
            serde_json::from_value::<EmbeddedVideo>(v)
                .map(VideoSummary::from)
                .map_err(|e| internal(format!("malformed playlist video: {}", e)))
        })
        .collect()
}

fn record_from_row(row: &SqliteRow) -> Result<PlaylistRecord, sqlx::Error> {
    Ok(PlaylistRecord {
        id: row.try_get("id")?,
        owner: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<PlaylistSummary, sqlx::Error> {
    Ok(PlaylistSummary {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: from_millis(row.try_get("created_at")?),
        updated_at: from_millis(row.try_get("updated_at")?),
        owner: owner_from_row(row)?,
        total_videos: row.try_get("total_videos")?,
        total_views: row.try_get("total_views")?,
    })
}

pub async fn create_playlist(
    pool: &SqlitePool,
    owner_id: &str,
    name: &str,
    description: &str,
) -> AppResult<PlaylistRecord> {
    let (name, description) = (name.trim(), description.trim());
    if name.is_empty() || description.is_empty() {
        return Err(bad_request("name and description are required"));
    }

    let now = now_millis();
    let sql = format!(
        "INSERT INTO playlists (id, owner_id, name, description, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(new_id())
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;
    Ok(record_from_row(&row)?)
}

/// A user's playlists, newest first. Totals count only videos the viewer
/// may see.
pub async fn user_playlists(
    pool: &SqlitePool,
    viewer_id: &str,
    user_id: &str,
) -> AppResult<Vec<PlaylistSummary>> {
    let sql = format!(
        r#"
        SELECT p.id, p.name, p.description, p.created_at, p.updated_at,
               {owner},
               COUNT(v.id) AS total_videos,
               COALESCE(SUM(v.views), 0) AS total_views
        FROM users o
        LEFT JOIN playlists p ON p.owner_id = o.id
        LEFT JOIN playlist_videos pv ON pv.playlist_id = p.id
        LEFT JOIN videos v ON v.id = pv.video_id AND (v.is_published = 1 OR v.owner_id = ?1)
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
        .map(summary_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

/// One playlist with its videos in insertion order. Unpublished videos are
/// hidden unless the viewer owns them.
pub async fn playlist_detail(
    pool: &SqlitePool,
    viewer_id: &str,
    playlist_id: &str,
) -> AppResult<PlaylistDetail> {
    let sql = format!(
        r#"
        SELECT p.id, p.name, p.description, p.created_at, p.updated_at,
               {owner},
               COUNT(v.id) AS total_videos,
               COALESCE(SUM(v.views), 0) AS total_views,
               json_group_array(json_object(
                   'id', v.id,
                   'title', v.title,
                   'description', v.description,
                   'thumbnail', v.thumbnail,
                   'duration', v.duration,
                   'views', v.views,
                   'createdAt', v.created_at,
                   'ownerId', vo.id,
                   'ownerUsername', vo.username,
                   'ownerFullName', vo.full_name,
                   'ownerAvatar', vo.avatar
               ) ORDER BY pv.added_at, pv.rowid) AS videos
        FROM playlists p
        LEFT JOIN users o ON o.id = p.owner_id
        LEFT JOIN playlist_videos pv ON pv.playlist_id = p.id
        LEFT JOIN videos v ON v.id = pv.video_id AND (v.is_published = 1 OR v.owner_id = ?1)
        LEFT JOIN users vo ON vo.id = v.owner_id
        WHERE p.id = ?2
        GROUP BY p.id
        "#,
        owner = OWNER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(viewer_id)
        .bind(playlist_id)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Err(not_found("playlist not found"));
    };

    let raw: String = row.try_get("videos")?;
    Ok(PlaylistDetail {
        summary: summary_from_row(&row)?,
        videos: embedded_videos(&raw)?,
    })
}

pub async fn update_playlist(
    pool: &SqlitePool,
    owner_id: &str,
    playlist_id: &str,
    name: Option<&str>,
    description: Option<&str>,
) -> AppResult<PlaylistRecord> {
    let name = name.map(str::trim).filter(|s| !s.is_empty());
    let description = description.map(str::trim).filter(|s| !s.is_empty());
    if name.is_none() && description.is_none() {
        return Err(bad_request("nothing to update: provide name or description"));
    }

    let sql = format!(
        "UPDATE playlists SET name = COALESCE(?, name), description = COALESCE(?, description), \
         updated_at = ? WHERE id = ? AND owner_id = ? RETURNING {}",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(name)
        .bind(description)
        .bind(now_millis())
        .bind(playlist_id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(record_from_row(&row)?),
        None => Err(ownership_miss(pool, "playlists", playlist_id, "playlist").await),
    }
}

pub async fn delete_playlist(pool: &SqlitePool, owner_id: &str, playlist_id: &str) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM playlists WHERE id = ? AND owner_id = ?")
        .bind(playlist_id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ownership_miss(pool, "playlists", playlist_id, "playlist").await);
    }
    Ok(())
}

/// Appends a video to an owned playlist. A video already present is a
/// conflict.
pub async fn add_video(
    pool: &SqlitePool,
    owner_id: &str,
    playlist_id: &str,
    video_id: &str,
) -> AppResult<()> {
    ensure_visible_video(pool, owner_id, video_id).await?;

    let inserted = sqlx::query(
        "INSERT INTO playlist_videos (playlist_id, video_id, added_at) \
         SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM playlists WHERE id = ?1 AND owner_id = ?4)",
    )
    .bind(playlist_id)
    .bind(video_id)
    .bind(now_millis())
    .bind(owner_id)
    .execute(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "video is already in this playlist"))?
    .rows_affected();

    if inserted == 0 {
        return Err(ownership_miss(pool, "playlists", playlist_id, "playlist").await);
    }
    Ok(())
}

pub async fn remove_video(
    pool: &SqlitePool,
    owner_id: &str,
    playlist_id: &str,
    video_id: &str,
) -> AppResult<()> {
    let removed = sqlx::query(
        "DELETE FROM playlist_videos WHERE playlist_id = ?1 AND video_id = ?2 \
         AND EXISTS (SELECT 1 FROM playlists WHERE id = ?1 AND owner_id = ?3)",
    )
    .bind(playlist_id)
    .bind(video_id)
    .bind(owner_id)
    .execute(pool)
    .await?
    .rows_affected();

    if removed > 0 {
        return Ok(());
    }

    let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playlists WHERE id = ? AND owner_id = ?")
        .bind(playlist_id)
        .bind(owner_id)
        .fetch_one(pool)
        .await?;
    if owned > 0 {
        return Err(not_found("video is not in this playlist"));
    }
    Err(ownership_miss(pool, "playlists", playlist_id, "playlist").await)
}
