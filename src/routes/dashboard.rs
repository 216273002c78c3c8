use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{ChannelStats, DashboardVideo};
use crate::pagination::{Page, PageQuery, PageRequest};
use crate::server::{ApiResponse, AppState};
use crate::store::dashboard;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(channel_stats))
        .route("/videos", get(channel_videos))
}

async fn channel_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<ApiResponse<ChannelStats>> {
    let stats = dashboard::channel_stats(&state.pool, &user.id).await?;
    Ok(ApiResponse::ok(stats, "channel stats fetched"))
}

async fn channel_videos(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<Page<DashboardVideo>>> {
    let page = PageRequest::parse(&query, &state.config.pagination)?;
    let videos = dashboard::channel_videos(&state.pool, &user.id, page).await?;
    Ok(ApiResponse::ok(videos, "channel videos fetched"))
}
