use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{bad_request, AppResult};
use crate::models::{new_id, now_millis, ChannelCard, ToggleOutcome, ToggleState};
use crate::store::{ensure_exists, flag, user_list_rows};

/// Subscribes `actor_id` to `channel_id`, or unsubscribes if already
/// subscribed. Subscribing to yourself is rejected.
pub async fn toggle_subscription(
    pool: &SqlitePool,
    actor_id: &str,
    channel_id: &str,
) -> AppResult<ToggleOutcome> {
    if actor_id == channel_id {
        return Err(bad_request("cannot subscribe to your own channel"));
    }

    let removed = sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?")
        .bind(actor_id)
        .bind(channel_id)
        .execute(pool)
        .await?
        .rows_affected();
    if removed > 0 {
        return Ok(ToggleOutcome {
            state: ToggleState::Removed,
        });
    }

    let inserted = sqlx::query(
        "INSERT INTO subscriptions (id, subscriber_id, channel_id, created_at) \
         SELECT ?1, ?2, ?3, ?4 WHERE EXISTS (SELECT 1 FROM users WHERE id = ?3) \
         ON CONFLICT (subscriber_id, channel_id) DO NOTHING",
    )
    .bind(new_id())
    .bind(actor_id)
    .bind(channel_id)
    .bind(now_millis())
    .execute(pool)
    .await?
    .rows_affected();
    if inserted == 0 {
        ensure_exists(pool, "users", channel_id, "channel").await?;
    }

    Ok(ToggleOutcome {
        state: ToggleState::Added,
    })
}

fn card_from_row(row: &SqliteRow) -> Result<ChannelCard, sqlx::Error> {
    Ok(ChannelCard {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        avatar: row.try_get("avatar")?,
        subscribers_count: row.try_get("subscribers_count")?,
        is_subscribed: flag(row, "is_subscribed")?,
    })
}

/// Users subscribed to `channel_id`, each with its own subscriber count and
/// whether the viewer follows it.
pub async fn channel_subscribers(
    pool: &SqlitePool,
    viewer_id: &str,
    channel_id: &str,
) -> AppResult<Vec<ChannelCard>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, u.full_name, u.avatar,
               COUNT(f.id) AS subscribers_count,
               COALESCE(MAX(f.subscriber_id = ?1), 0) AS is_subscribed
        FROM users c
        LEFT JOIN subscriptions s ON s.channel_id = c.id
        LEFT JOIN users u ON u.id = s.subscriber_id
        LEFT JOIN subscriptions f ON f.channel_id = u.id
        WHERE c.id = ?2
        GROUP BY s.id
        ORDER BY s.created_at DESC, s.rowid DESC
        "#,
    )
    .bind(viewer_id)
    .bind(channel_id)
    .fetch_all(pool)
    .await?;

    Ok(user_list_rows(&rows, "channel")?
        .into_iter()
        .map(card_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

/// Channels `subscriber_id` follows, viewer-relative.
pub async fn subscribed_channels(
    pool: &SqlitePool,
    viewer_id: &str,
    subscriber_id: &str,
) -> AppResult<Vec<ChannelCard>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, u.full_name, u.avatar,
               COUNT(f.id) AS subscribers_count,
               COALESCE(MAX(f.subscriber_id = ?1), 0) AS is_subscribed
        FROM users c
        LEFT JOIN subscriptions s ON s.subscriber_id = c.id
        LEFT JOIN users u ON u.id = s.channel_id
        LEFT JOIN subscriptions f ON f.channel_id = u.id
        WHERE c.id = ?2
        GROUP BY s.id
        ORDER BY s.created_at DESC, s.rowid DESC
        "#,
    )
    .bind(viewer_id)
    .bind(subscriber_id)
    .fetch_all(pool)
    .await?;

    Ok(user_list_rows(&rows, "user")?
        .into_iter()
        .map(card_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}
