use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{get, patch};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::{bad_request, AppResult};
use crate::media::{self, MediaKind, UploadBatch};
use crate::models::{parse_id, VideoCard, VideoDetail, VideoRecord};
use crate::pagination::{Page, PageQuery, PageRequest, VideoSort};
use crate::routes::MultipartForm;
use crate::server::{ApiResponse, AppState};
use crate::store::videos::{self, NewVideo, VideoUpdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(search).post(publish))
        .route(
            "/{videoId}",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/toggle/publish/{videoId}", patch(toggle_publish))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    _viewer: AuthUser,
    Query(params): Query<SearchQuery>,
) -> AppResult<ApiResponse<Page<VideoCard>>> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| bad_request("search query is missing"))?;
    let sort = VideoSort::parse(params.sort_by.as_deref(), params.sort_type.as_deref())?;
    let page = PageRequest::parse(
        &PageQuery {
            page: params.page.clone(),
            limit: params.limit.clone(),
        },
        &state.config.pagination,
    )?;

    let results = videos::search(&state.pool, query, sort, page).await?;
    Ok(ApiResponse::ok(results, "videos fetched"))
}

fn parse_published(raw: Option<&str>) -> AppResult<bool> {
    match raw {
        None => Ok(true),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(bad_request(format!("invalid isPublished '{}'", other))),
    }
}

async fn publish(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> AppResult<ApiResponse<VideoRecord>> {
    let form = MultipartForm::read(multipart).await?;
    let title = form.require_text("title")?;
    let description = form.require_text("description")?;
    let is_published = parse_published(form.text("isPublished"))?;
    let video_file = form.require_file("videoFile")?;
    let thumbnail = form.require_file("thumbnail")?;

    let mut batch = UploadBatch::new(state.media.as_ref());
    let video = batch.upload(video_file.path(), MediaKind::Video).await?;
    let thumb = batch.upload(thumbnail.path(), MediaKind::Image).await?;

    let inserted = videos::insert_video(
        &state.pool,
        NewVideo {
            owner_id: user.id.clone(),
            video_file: video.url,
            thumbnail: thumb.url,
            title: title.to_string(),
            description: description.to_string(),
            duration: video.duration,
            is_published,
        },
    )
    .await;

    match inserted {
        Ok(record) => {
            tracing::info!(video_id = %record.id, owner_id = %user.id, "video published");
            Ok(ApiResponse::created(record, "video published"))
        }
        Err(err) => {
            batch.rollback().await;
            Err(err)
        }
    }
}

async fn get_video(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(video_id): Path<String>,
) -> AppResult<ApiResponse<VideoDetail>> {
    let video_id = parse_id("videoId", &video_id)?;
    let detail = videos::watch_video(&state.pool, &viewer.id, &video_id).await?;
    Ok(ApiResponse::ok(detail, "video fetched"))
}

async fn update_video(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<String>,
    multipart: Multipart,
) -> AppResult<ApiResponse<VideoRecord>> {
    let video_id = parse_id("videoId", &video_id)?;
    let form = MultipartForm::read(multipart).await?;

    let mut update = VideoUpdate {
        title: form.text("title").map(str::to_string),
        description: form.text("description").map(str::to_string),
        thumbnail: None,
    };
    if update.is_empty() && form.file("thumbnail").is_none() {
        return Err(bad_request(
            "nothing to update: provide title, description, or thumbnail",
        ));
    }

    let mut batch = UploadBatch::new(state.media.as_ref());
    if let Some(file) = form.file("thumbnail") {
        update.thumbnail = Some(batch.upload(file.path(), MediaKind::Image).await?.url);
    }

    let (record, replaced) = match videos::update_video(&state.pool, &user.id, &video_id, &update).await {
        Ok(result) => result,
        Err(err) => {
            batch.rollback().await;
            return Err(err);
        }
    };

    if let Some(old) = replaced {
        state.media.delete(&old).await?;
    }
    Ok(ApiResponse::ok(record, "video updated"))
}

async fn delete_video(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    let video_id = parse_id("videoId", &video_id)?;
    let deleted = videos::delete_video(&state.pool, &user.id, &video_id).await?;

    media::delete_all(
        state.media.as_ref(),
        &[deleted.video_file.as_str(), deleted.thumbnail.as_str()],
    )
    .await?;

    tracing::info!(video_id = %deleted.id, "video deleted");
    Ok(ApiResponse::ok(json!({ "_id": deleted.id }), "video deleted"))
}

async fn toggle_publish(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<String>,
) -> AppResult<ApiResponse<VideoRecord>> {
    let video_id = parse_id("videoId", &video_id)?;
    let record = videos::toggle_publish(&state.pool, &user.id, &video_id).await?;
    Ok(ApiResponse::ok(record, "publish status toggled"))
}
