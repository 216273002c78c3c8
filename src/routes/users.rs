use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::routing::{get, patch, post};
use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::{self, AuthUser, REFRESH_COOKIE};
use crate::error::{bad_request, conflict, unauthorized, AppResult};
use crate::media::{MediaKind, UploadBatch};
use crate::models::{ChannelProfile, UserProfile, VideoSummary};
use crate::routes::{required, JsonBody, MultipartForm};
use crate::server::{ApiResponse, AppState};
use crate::store::users::{self, NewUser, ProfileImage};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .route("/password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/details", patch(update_details))
        .route("/avatar", patch(update_avatar))
        .route("/cover-image", patch(update_cover_image))
        .route("/c/{username}", get(channel_profile))
        .route("/history", get(watch_history))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
}

const MIN_PASSWORD_LEN: usize = 8;

async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<UserProfile>> {
    let form = MultipartForm::read(multipart).await?;
    let full_name = form.require_text("fullName")?;
    let email = form.require_text("email")?;
    let username = form.require_text("username")?;
    let password = form.require_text("password")?;
    if !email.contains('@') {
        return Err(bad_request("email is not valid"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(bad_request(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let avatar = form.require_file("avatar")?;

    if users::find_by_login(&state.pool, Some(username), Some(email))
        .await?
        .is_some()
    {
        return Err(conflict("username or email is already in use"));
    }

    let password_hash = auth::hash_password(password)?;

    let mut batch = UploadBatch::new(state.media.as_ref());
    let avatar = batch.upload(avatar.path(), MediaKind::Image).await?;
    let cover_image = match form.file("coverImage") {
        Some(file) => batch.upload(file.path(), MediaKind::Image).await?.url,
        None => String::new(),
    };

    let created = users::create_user(
        &state.pool,
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            avatar: avatar.url,
            cover_image,
            password_hash: Some(password_hash),
            google_id: None,
        },
    )
    .await;

    match created {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "user registered");
            Ok(ApiResponse::created(
                UserProfile::from(&user),
                "user registered successfully",
            ))
        }
        Err(err) => {
            batch.rollback().await;
            Err(err)
        }
    }
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(body): JsonBody<LoginRequest>,
) -> AppResult<(CookieJar, ApiResponse<SessionData>)> {
    let username = body.username.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let email = body.email.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if username.is_none() && email.is_none() {
        return Err(bad_request("username or email is required"));
    }
    let password = required(body.password.as_deref(), "password")?;

    let user = users::find_by_login(&state.pool, username, email)
        .await?
        .ok_or_else(|| unauthorized("user does not exist"))?;
    let Some(stored) = user.password_hash.as_deref() else {
        return Err(unauthorized("this account signs in with Google"));
    };
    if !auth::verify_password(password, stored)? {
        return Err(unauthorized("invalid credentials"));
    }

    let pair = auth::start_session(&state.pool, &user, &state.config.auth).await?;
    let jar = auth::set_session_cookies(jar, &pair, &state.config.auth);
    Ok((
        jar,
        ApiResponse::ok(
            SessionData {
                user: UserProfile::from(&user),
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
            "user logged in successfully",
        ),
    ))
}

async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, ApiResponse<Value>)> {
    users::set_refresh_token(&state.pool, &user.id, None).await?;
    Ok((
        auth::clear_session_cookies(jar),
        ApiResponse::ok(json!({}), "user logged out"),
    ))
}

async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<(CookieJar, ApiResponse<auth::TokenPair>)> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|e| bad_request(format!("invalid request body: {}", e)))?
            .refresh_token
    };
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or(from_body)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| unauthorized("unauthorized request"))?;

    let (_, pair) = auth::rotate_session(&state.pool, &token, &state.config.auth).await?;
    let jar = auth::set_session_cookies(jar, &pair, &state.config.auth);
    Ok((jar, ApiResponse::ok(pair, "access token refreshed")))
}

async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<PasswordChange>,
) -> AppResult<ApiResponse<Value>> {
    let old_password = required(body.old_password.as_deref(), "oldPassword")?;
    let new_password = required(body.new_password.as_deref(), "newPassword")?;
    if new_password.len() < MIN_PASSWORD_LEN {
        return Err(bad_request(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let Some(stored) = user.password_hash.as_deref() else {
        return Err(bad_request("this account has no password to change"));
    };
    if !auth::verify_password(old_password, stored)? {
        return Err(unauthorized("incorrect old password"));
    }

    let hash = auth::hash_password(new_password)?;
    users::update_password(&state.pool, &user.id, &hash).await?;
    Ok(ApiResponse::ok(json!({}), "password updated"))
}

async fn current_user(AuthUser(user): AuthUser) -> ApiResponse<UserProfile> {
    ApiResponse::ok(UserProfile::from(&user), "current user fetched")
}

async fn update_details(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<DetailsUpdate>,
) -> AppResult<ApiResponse<UserProfile>> {
    let full_name = required(body.full_name.as_deref(), "fullName")?;
    let email = required(body.email.as_deref(), "email")?;
    if !email.contains('@') {
        return Err(bad_request("email is not valid"));
    }
    let updated = users::update_details(&state.pool, &user.id, email, full_name).await?;
    Ok(ApiResponse::ok(UserProfile::from(&updated), "account details updated"))
}

/// Uploads the new image, points the user row at it, then removes the
/// previous object.
async fn replace_image(
    state: &AppState,
    user_id: &str,
    previous: &str,
    form: &MultipartForm,
    field: &str,
    image: ProfileImage,
) -> AppResult<UserProfile> {
    let file = form.require_file(field)?;
    let mut batch = UploadBatch::new(state.media.as_ref());
    let uploaded = batch.upload(file.path(), MediaKind::Image).await?;

    let updated = match users::update_image(&state.pool, user_id, image, &uploaded.url).await {
        Ok(user) => user,
        Err(err) => {
            batch.rollback().await;
            return Err(err);
        }
    };

    if !previous.is_empty() {
        state.media.delete(previous).await?;
    }
    Ok(UserProfile::from(&updated))
}

async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> AppResult<ApiResponse<UserProfile>> {
    let form = MultipartForm::read(multipart).await?;
    let profile = replace_image(&state, &user.id, &user.avatar, &form, "avatar", ProfileImage::Avatar).await?;
    Ok(ApiResponse::ok(profile, "avatar updated"))
}

async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> AppResult<ApiResponse<UserProfile>> {
    let form = MultipartForm::read(multipart).await?;
    let profile = replace_image(
        &state,
        &user.id,
        &user.cover_image,
        &form,
        "coverImage",
        ProfileImage::CoverImage,
    )
    .await?;
    Ok(ApiResponse::ok(profile, "cover image updated"))
}

async fn channel_profile(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(username): Path<String>,
) -> AppResult<ApiResponse<ChannelProfile>> {
    let username = required(Some(&username), "username")?;
    let profile = users::channel_profile(&state.pool, &viewer.id, username).await?;
    Ok(ApiResponse::ok(profile, "channel fetched"))
}

async fn watch_history(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
) -> AppResult<ApiResponse<Vec<VideoSummary>>> {
    let history = users::watch_history(&state.pool, &viewer.id).await?;
    Ok(ApiResponse::ok(history, "watch history fetched"))
}
