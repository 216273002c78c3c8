use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{parse_id, ChannelCard, ToggleOutcome};
use crate::server::{ApiResponse, AppState};
use crate::store::subscriptions;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/c/{channelId}", post(toggle_subscription).get(channel_subscribers))
        .route("/u/{subscriberId}", get(subscribed_channels))
}

async fn toggle_subscription(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(channel_id): Path<String>,
) -> AppResult<ApiResponse<ToggleOutcome>> {
    let channel_id = parse_id("channelId", &channel_id)?;
    let outcome = subscriptions::toggle_subscription(&state.pool, &user.id, &channel_id).await?;
    Ok(ApiResponse::ok(outcome, "subscription toggled"))
}

async fn channel_subscribers(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(channel_id): Path<String>,
) -> AppResult<ApiResponse<Vec<ChannelCard>>> {
    let channel_id = parse_id("channelId", &channel_id)?;
    let subscribers = subscriptions::channel_subscribers(&state.pool, &viewer.id, &channel_id).await?;
    Ok(ApiResponse::ok(subscribers, "subscribers fetched"))
}

async fn subscribed_channels(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(subscriber_id): Path<String>,
) -> AppResult<ApiResponse<Vec<ChannelCard>>> {
    let subscriber_id = parse_id("subscriberId", &subscriber_id)?;
    let channels = subscriptions::subscribed_channels(&state.pool, &viewer.id, &subscriber_id).await?;
    Ok(ApiResponse::ok(channels, "subscribed channels fetched"))
}
