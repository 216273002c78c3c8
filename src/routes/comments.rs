use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{parse_id, CommentRecord, ContentView};
use crate::pagination::{Page, PageQuery, PageRequest};
use crate::routes::{required, JsonBody};
use crate::server::{ApiResponse, AppState};
use crate::store::comments;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{videoId}", get(video_comments).post(add_comment))
        .route("/c/{commentId}", patch(update_comment).delete(delete_comment))
}

#[derive(Debug, Deserialize)]
pub struct ContentBody {
    pub content: Option<String>,
}

async fn video_comments(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(video_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<Page<ContentView>>> {
    let video_id = parse_id("videoId", &video_id)?;
    let page = PageRequest::parse(&query, &state.config.pagination)?;
    let thread = comments::video_comments(&state.pool, &viewer.id, &video_id, page).await?;
    Ok(ApiResponse::ok(thread, "comments fetched"))
}

async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<String>,
    JsonBody(body): JsonBody<ContentBody>,
) -> AppResult<ApiResponse<CommentRecord>> {
    let video_id = parse_id("videoId", &video_id)?;
    let content = required(body.content.as_deref(), "content")?;
    let comment = comments::add_comment(&state.pool, &user.id, &video_id, content).await?;
    Ok(ApiResponse::created(comment, "comment added"))
}

async fn update_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(comment_id): Path<String>,
    JsonBody(body): JsonBody<ContentBody>,
) -> AppResult<ApiResponse<CommentRecord>> {
    let comment_id = parse_id("commentId", &comment_id)?;
    let content = required(body.content.as_deref(), "content")?;
    let comment = comments::update_comment(&state.pool, &user.id, &comment_id, content).await?;
    Ok(ApiResponse::ok(comment, "comment updated"))
}

async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(comment_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    let comment_id = parse_id("commentId", &comment_id)?;
    comments::delete_comment(&state.pool, &user.id, &comment_id).await?;
    Ok(ApiResponse::ok(json!({ "_id": comment_id }), "comment deleted"))
}
