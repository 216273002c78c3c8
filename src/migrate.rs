use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Creates the database file (if needed) and applies the schema.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation against an open pool.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Users. `password_hash` is NULL for federated accounts.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            avatar TEXT NOT NULL,
            cover_image TEXT NOT NULL DEFAULT '',
            password_hash TEXT,
            refresh_token TEXT,
            google_id TEXT UNIQUE,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Videos. `search_text` holds the case-folded title and description.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            video_file TEXT NOT NULL,
            thumbnail TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            search_text TEXT NOT NULL DEFAULT '',
            duration REAL NOT NULL DEFAULT 0,
            views INTEGER NOT NULL DEFAULT 0,
            is_published INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            video_id TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Likes: exactly one target column is set.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS likes (
            id TEXT PRIMARY KEY,
            video_id TEXT,
            comment_id TEXT,
            post_id TEXT,
            liked_by TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            CHECK ((video_id IS NOT NULL) + (comment_id IS NOT NULL) + (post_id IS NOT NULL) = 1),
            FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE,
            FOREIGN KEY (comment_id) REFERENCES comments(id) ON DELETE CASCADE,
            FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
            FOREIGN KEY (liked_by) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            subscriber_id TEXT NOT NULL,
            channel_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(subscriber_id, channel_id),
            FOREIGN KEY (subscriber_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (channel_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlists (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlist_videos (
            playlist_id TEXT NOT NULL,
            video_id TEXT NOT NULL,
            added_at INTEGER NOT NULL,
            PRIMARY KEY (playlist_id, video_id),
            FOREIGN KEY (playlist_id) REFERENCES playlists(id) ON DELETE CASCADE,
            FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Ordered, de-duplicated set: first watch wins.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS watch_history (
            user_id TEXT NOT NULL,
            video_id TEXT NOT NULL,
            watched_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, video_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes for the edge lookups every view performs
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_videos_owner ON videos(owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_posts_owner ON posts(owner_id, created_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_comments_video ON comments(video_id, created_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_likes_video ON likes(video_id, liked_by)",
        "CREATE INDEX IF NOT EXISTS idx_likes_comment ON likes(comment_id, liked_by)",
        "CREATE INDEX IF NOT EXISTS idx_likes_post ON likes(post_id, liked_by)",
        "CREATE INDEX IF NOT EXISTS idx_likes_liked_by ON likes(liked_by, created_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_channel ON subscriptions(channel_id)",
        "CREATE INDEX IF NOT EXISTS idx_playlists_owner ON playlists(owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_watch_history_user ON watch_history(user_id, watched_at)",
    ];
    for ddl in indexes {
        sqlx::query(ddl).execute(pool).await?;
    }

    Ok(())
}
