use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Router;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{parse_id, ContentView, PostRecord};
use crate::routes::comments::ContentBody;
use crate::routes::{required, JsonBody};
use crate::server::{ApiResponse, AppState};
use crate::store::posts;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_post))
        .route("/user/{userId}", get(user_posts))
        .route("/{postId}", patch(update_post).delete(delete_post))
}

async fn create_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<ContentBody>,
) -> AppResult<ApiResponse<PostRecord>> {
    let content = required(body.content.as_deref(), "content")?;
    let post = posts::create_post(&state.pool, &user.id, content).await?;
    Ok(ApiResponse::created(post, "post created"))
}

async fn user_posts(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<Vec<ContentView>>> {
    let user_id = parse_id("userId", &user_id)?;
    let feed = posts::user_posts(&state.pool, &viewer.id, &user_id).await?;
    Ok(ApiResponse::ok(feed, "posts fetched"))
}

async fn update_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<String>,
    JsonBody(body): JsonBody<ContentBody>,
) -> AppResult<ApiResponse<PostRecord>> {
    let post_id = parse_id("postId", &post_id)?;
    let content = required(body.content.as_deref(), "content")?;
    let post = posts::update_post(&state.pool, &user.id, &post_id, content).await?;
    Ok(ApiResponse::ok(post, "post updated"))
}

async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    let post_id = parse_id("postId", &post_id)?;
    posts::delete_post(&state.pool, &user.id, &post_id).await?;
    Ok(ApiResponse::ok(json!({ "_id": post_id }), "post deleted"))
}
