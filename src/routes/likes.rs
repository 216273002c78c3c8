use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{parse_id, LikeTarget, ToggleOutcome, VideoSummary};
use crate::server::{ApiResponse, AppState};
use crate::store::likes;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/toggle/v/{videoId}", post(toggle_video_like))
        .route("/toggle/c/{commentId}", post(toggle_comment_like))
        .route("/toggle/p/{postId}", post(toggle_post_like))
        .route("/videos", get(liked_videos))
}

async fn toggle(state: &AppState, actor_id: &str, target: LikeTarget) -> AppResult<ApiResponse<ToggleOutcome>> {
    let outcome = likes::toggle_like(&state.pool, actor_id, &target).await?;
    let (_, _, label) = target.columns();
    Ok(ApiResponse::ok(outcome, format!("{} like toggled", label)))
}

async fn toggle_video_like(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<String>,
) -> AppResult<ApiResponse<ToggleOutcome>> {
    let id = parse_id("videoId", &video_id)?;
    toggle(&state, &user.id, LikeTarget::Video(id)).await
}

async fn toggle_comment_like(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(comment_id): Path<String>,
) -> AppResult<ApiResponse<ToggleOutcome>> {
    let id = parse_id("commentId", &comment_id)?;
    toggle(&state, &user.id, LikeTarget::Comment(id)).await
}

async fn toggle_post_like(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<ToggleOutcome>> {
    let id = parse_id("postId", &post_id)?;
    toggle(&state, &user.id, LikeTarget::Post(id)).await
}

async fn liked_videos(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
) -> AppResult<ApiResponse<Vec<VideoSummary>>> {
    let videos = likes::liked_videos(&state.pool, &viewer.id).await?;
    Ok(ApiResponse::ok(videos, "liked videos fetched"))
}
