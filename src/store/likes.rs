use sqlx::SqlitePool;

use crate::error::{not_found, AppResult};
use crate::models::{new_id, now_millis, LikeTarget, ToggleOutcome, ToggleState, VideoSummary};
use crate::store::{videos, OWNER_COLUMNS};

/// Flips the actor's like on `target`.
///
/// Deletes any matching edge first; if one existed the like is removed.
/// Otherwise a new edge is inserted, guarded by an existence check on the
/// target in the same statement. A video must also be visible to the actor. Two concurrent toggles on the same pair
/// can both observe "absent" and insert twice.
pub async fn toggle_like(pool: &SqlitePool, actor_id: &str, target: &LikeTarget) -> AppResult<ToggleOutcome> {
    let (column, table, label) = target.columns();

    let delete = format!("DELETE FROM likes WHERE {} = ? AND liked_by = ?", column);
    let removed = sqlx::query(&delete)
        .bind(target.id())
        .bind(actor_id)
        .execute(pool)
        .await?
        .rows_affected();
    if removed > 0 {
        return Ok(ToggleOutcome {
            state: ToggleState::Removed,
        });
    }

    // Drafts are invisible to everyone but their owner.
    let visibility = match target {
        LikeTarget::Video(_) => " AND (is_published = 1 OR owner_id = ?3)",
        _ => "",
    };
    let insert = format!(
        "INSERT INTO likes (id, {column}, liked_by, created_at) \
         SELECT ?1, ?2, ?3, ?4 WHERE EXISTS (SELECT 1 FROM {table} WHERE id = ?2{visibility})",
        column = column,
        table = table,
        visibility = visibility
    );
    let inserted = sqlx::query(&insert)
        .bind(new_id())
        .bind(target.id())
        .bind(actor_id)
        .bind(now_millis())
        .execute(pool)
        .await?
        .rows_affected();
    if inserted == 0 {
        return Err(not_found(format!("{} not found", label)));
    }

    Ok(ToggleOutcome {
        state: ToggleState::Added,
    })
}

/// Videos the viewer liked, most recent like first.
pub async fn liked_videos(pool: &SqlitePool, viewer_id: &str) -> AppResult<Vec<VideoSummary>> {
    let sql = format!(
        r#"
        SELECT {video}, {owner}
        FROM likes l
        JOIN videos v ON v.id = l.video_id
        LEFT JOIN users o ON o.id = v.owner_id
        WHERE l.liked_by = ?1 AND (v.is_published = 1 OR v.owner_id = ?1)
        ORDER BY l.created_at DESC, l.rowid DESC
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
