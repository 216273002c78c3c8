use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth;
use crate::error::{bad_request, not_found, unauthorized, AppResult};
use crate::oauth::{provision_user, STATE_COOKIE};
use crate::server::AppState;

const AFTER_SIGN_IN: &str = "/api/v1/users/current-user";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/google", get(start))
        .route("/google/callback", get(callback))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

async fn start(State(state): State<AppState>, jar: CookieJar) -> AppResult<(CookieJar, Redirect)> {
    let provider = state
        .identity
        .as_ref()
        .ok_or_else(|| not_found("google sign-in is not configured"))?;

    let nonce = Uuid::new_v4().simple().to_string();
    let url = provider.authorize_url(&nonce)?;
    let cookie = Cookie::build((STATE_COOKIE, nonce))
        .http_only(true)
        .secure(state.config.auth.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    Ok((jar.add(cookie), Redirect::to(&url)))
}

async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> AppResult<(CookieJar, Redirect)> {
    let provider = state
        .identity
        .as_ref()
        .ok_or_else(|| not_found("google sign-in is not configured"))?;

    if let Some(error) = query.error {
        return Err(unauthorized(format!("google sign-in was cancelled: {}", error)));
    }
    let expected = jar
        .get(STATE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| bad_request("missing sign-in state"))?;
    if query.state.as_deref() != Some(expected.as_str()) {
        return Err(bad_request("sign-in state mismatch"));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| bad_request("code is required"))?;

    let profile = provider.exchange(&code).await.map_err(|e| {
        tracing::warn!(error = %format!("{:#}", e), "google code exchange failed");
        unauthorized("google sign-in failed")
    })?;
    let user = provision_user(&state.pool, &profile).await?;
    let pair = auth::start_session(&state.pool, &user, &state.config.auth).await?;
    tracing::info!(user_id = %user.id, "google sign-in");

    let jar = auth::set_session_cookies(jar, &pair, &state.config.auth)
        .remove(Cookie::build(STATE_COOKIE).path("/"));
    Ok((jar, Redirect::to(AFTER_SIGN_IN)))
}
