use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{parse_id, PlaylistDetail, PlaylistRecord, PlaylistSummary};
use crate::routes::{required, JsonBody};
use crate::server::{ApiResponse, AppState};
use crate::store::playlists;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_playlist))
        .route("/user/{userId}", get(user_playlists))
        .route(
            "/{playlistId}",
            get(playlist_detail)
                .patch(update_playlist)
                .delete(delete_playlist),
        )
        .route("/add/{videoId}/{playlistId}", patch(add_video))
        .route("/remove/{videoId}/{playlistId}", patch(remove_video))
}

#[derive(Debug, Deserialize)]
pub struct PlaylistBody {
    pub name: Option<String>,
    pub description: Option<String>,
}

async fn create_playlist(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<PlaylistBody>,
) -> AppResult<ApiResponse<PlaylistRecord>> {
    let name = required(body.name.as_deref(), "name")?;
    let description = required(body.description.as_deref(), "description")?;
    let playlist = playlists::create_playlist(&state.pool, &user.id, name, description).await?;
    Ok(ApiResponse::created(playlist, "playlist created"))
}

async fn user_playlists(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<Vec<PlaylistSummary>>> {
    let user_id = parse_id("userId", &user_id)?;
    let lists = playlists::user_playlists(&state.pool, &viewer.id, &user_id).await?;
    Ok(ApiResponse::ok(lists, "playlists fetched"))
}

async fn playlist_detail(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(playlist_id): Path<String>,
) -> AppResult<ApiResponse<PlaylistDetail>> {
    let playlist_id = parse_id("playlistId", &playlist_id)?;
    let detail = playlists::playlist_detail(&state.pool, &viewer.id, &playlist_id).await?;
    Ok(ApiResponse::ok(detail, "playlist fetched"))
}

async fn update_playlist(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(playlist_id): Path<String>,
    JsonBody(body): JsonBody<PlaylistBody>,
) -> AppResult<ApiResponse<PlaylistRecord>> {
    let playlist_id = parse_id("playlistId", &playlist_id)?;
    let playlist = playlists::update_playlist(
        &state.pool,
        &user.id,
        &playlist_id,
        body.name.as_deref(),
        body.description.as_deref(),
    )
    .await?;
    Ok(ApiResponse::ok(playlist, "playlist updated"))
}

async fn delete_playlist(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(playlist_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    let playlist_id = parse_id("playlistId", &playlist_id)?;
    playlists::delete_playlist(&state.pool, &user.id, &playlist_id).await?;
    Ok(ApiResponse::ok(json!({ "_id": playlist_id }), "playlist deleted"))
}

async fn add_video(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<PlaylistDetail>> {
    let video_id = parse_id("videoId", &video_id)?;
    let playlist_id = parse_id("playlistId", &playlist_id)?;
    playlists::add_video(&state.pool, &user.id, &playlist_id, &video_id).await?;
    let detail = playlists::playlist_detail(&state.pool, &user.id, &playlist_id).await?;
    Ok(ApiResponse::ok(detail, "video added to playlist"))
}

async fn remove_video(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<PlaylistDetail>> {
    let video_id = parse_id("videoId", &video_id)?;
    let playlist_id = parse_id("playlistId", &playlist_id)?;
    playlists::remove_video(&state.pool, &user.id, &playlist_id, &video_id).await?;
    let detail = playlists::playlist_detail(&state.pool, &user.id, &playlist_id).await?;
    Ok(ApiResponse::ok(detail, "video removed from playlist"))
}
