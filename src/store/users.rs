//! Accounts, channel profiles, and watch history.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{conflict_on_unique, not_found, AppResult};
use crate::models::{new_id, now_millis, ChannelProfile, UserRecord, VideoSummary};
use crate::store::{flag, videos, OWNER_COLUMNS};

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, password_hash, refresh_token, google_id, created_at, updated_at";

/// Fields for a new account. Username and email are normalized on insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
}

/// Which profile image column to replace.
#[derive(Debug, Clone, Copy)]
pub enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    fn column(&self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::CoverImage => "cover_image",
        }
    }
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord, sqlx::Error> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        avatar: row.try_get("avatar")?,
        cover_image: row.try_get("cover_image")?,
        password_hash: row.try_get("password_hash")?,
        refresh_token: row.try_get("refresh_token")?,
        google_id: row.try_get("google_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub async fn create_user(pool: &SqlitePool, new: NewUser) -> AppResult<UserRecord> {
    let now = now_millis();
    let sql = format!(
        "INSERT INTO users (id, username, email, full_name, avatar, cover_image, password_hash, google_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(new_id())
        .bind(normalize_username(&new.username))
        .bind(normalize_email(&new.email))
        .bind(new.full_name.trim())
        .bind(&new.avatar)
        .bind(&new.cover_image)
        .bind(&new.password_hash)
        .bind(&new.google_id)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| conflict_on_unique(e, "username or email is already in use"))?;

    Ok(user_from_row(&row)?)
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<UserRecord>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(user_from_row).transpose()?)
}

/// Looks a user up by username or email, whichever is given.
pub async fn find_by_login(
    pool: &SqlitePool,
    username: Option<&str>,
    email: Option<&str>,
) -> AppResult<Option<UserRecord>> {
    let sql = format!(
        "SELECT {} FROM users WHERE username = ? OR email = ? LIMIT 1",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(username.map(normalize_username))
        .bind(email.map(normalize_email))
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row).transpose()?)
}

pub async fn find_by_google_id(pool: &SqlitePool, google_id: &str) -> AppResult<Option<UserRecord>> {
    let sql = format!("SELECT {} FROM users WHERE google_id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql).bind(google_id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(user_from_row).transpose()?)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<UserRecord>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row).transpose()?)
}

pub async fn username_taken(pool: &SqlitePool, username: &str) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(normalize_username(username))
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn link_google_id(pool: &SqlitePool, id: &str, google_id: &str) -> AppResult<UserRecord> {
    let sql = format!(
        "UPDATE users SET google_id = ?, updated_at = ? WHERE id = ? RETURNING {}",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(google_id)
        .bind(now_millis())
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| conflict_on_unique(e, "identity already linked to another account"))?;
    row.as_ref()
        .map(user_from_row)
        .transpose()?
        .ok_or_else(|| not_found("user not found"))
}

/// Stores (or clears, with `None`) the single active refresh token.
pub async fn set_refresh_token(pool: &SqlitePool, id: &str, token: Option<&str>) -> AppResult<()> {
    sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ?")
        .bind(token)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_password(pool: &SqlitePool, id: &str, password_hash: &str) -> AppResult<()> {
    let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(now_millis())
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(not_found("user not found"));
    }
    Ok(())
}

pub async fn update_details(
    pool: &SqlitePool,
    id: &str,
    email: &str,
    full_name: &str,
) -> AppResult<UserRecord> {
    let sql = format!(
        "UPDATE users SET email = ?, full_name = ?, updated_at = ? WHERE id = ? RETURNING {}",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(normalize_email(email))
        .bind(full_name.trim())
        .bind(now_millis())
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email is already in use"))?;
    row.as_ref()
        .map(user_from_row)
        .transpose()?
        .ok_or_else(|| not_found("user not found"))
}

pub async fn update_image(
    pool: &SqlitePool,
    id: &str,
    image: ProfileImage,
    url: &str,
) -> AppResult<UserRecord> {
    let sql = format!(
        "UPDATE users SET {} = ?, updated_at = ? WHERE id = ? RETURNING {}",
        image.column(),
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(url)
        .bind(now_millis())
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref()
        .map(user_from_row)
        .transpose()?
        .ok_or_else(|| not_found("user not found"))
}

/// Channel profile with subscriber counts and the viewer's subscription flag.
pub async fn channel_profile(
    pool: &SqlitePool,
    viewer_id: &str,
    username: &str,
) -> AppResult<ChannelProfile> {
    let row = sqlx::query(
        r#"
        SELECT u.id, u.username, u.full_name, u.email, u.avatar, u.cover_image,
               COUNT(DISTINCT s_in.id) AS subscribers_count,
               COUNT(DISTINCT s_out.id) AS subscribed_to_count,
               COALESCE(MAX(s_in.subscriber_id = ?1), 0) AS is_subscribed
        FROM users u
        LEFT JOIN subscriptions s_in ON s_in.channel_id = u.id
        LEFT JOIN subscriptions s_out ON s_out.subscriber_id = u.id
        WHERE u.username = ?2
        GROUP BY u.id
        "#,
    )
    .bind(viewer_id)
    .bind(normalize_username(username))
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(not_found("channel does not exist"));
    };

    Ok(ChannelProfile {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        avatar: row.try_get("avatar")?,
        cover_image: row.try_get("cover_image")?,
        subscribers_count: row.try_get("subscribers_count")?,
        channels_subscribed_to_count: row.try_get("subscribed_to_count")?,
        is_subscribed: flag(&row, "is_subscribed")?,
    })
}

/// Inserts a video into the viewer's history; repeat views are ignored so
/// each video appears at most once, at its first-watch position.
pub async fn add_to_watch_history(pool: &SqlitePool, user_id: &str, video_id: &str) -> AppResult<()> {
    sqlx::query("INSERT OR IGNORE INTO watch_history (user_id, video_id, watched_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(video_id)
        .bind(now_millis())
        .execute(pool)
        .await?;
    Ok(())
}

/// Watched videos in first-watch order, owner inlined. Videos unpublished
/// since being watched stay visible only to their owner.
pub async fn watch_history(pool: &SqlitePool, viewer_id: &str) -> AppResult<Vec<VideoSummary>> {
    let sql = format!(
        r#"
        SELECT {video}, {owner}
        FROM watch_history h
        JOIN videos v ON v.id = h.video_id
        LEFT JOIN users o ON o.id = v.owner_id
        WHERE h.user_id = ?1 AND (v.is_published = 1 OR v.owner_id = ?1)
        ORDER BY h.watched_at ASC, h.rowid ASC
        "#,
        video = videos::SUMMARY_COLUMNS,
        owner = OWNER_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(viewer_id).fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(videos::summary_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}
