//! Credentials: password hashing, signed session tokens, and the
//! authenticated-user extractor.
//!
//! A session is a pair of HS256 tokens. The access token is short-lived and
//! carries the identity; the refresh token is long-lived, signed with a
//! different secret, and also stored on the user row so that only the most
//! recently issued one is accepted. Both travel as `HttpOnly` cookies, and
//! the access token may instead be sent as `Authorization: Bearer <token>`.

use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{unauthorized, AppError, AppResult};
use crate::models::UserRecord;
use crate::server::AppState;
use crate::store::users;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub username: String,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
    pub iss: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
    pub iss: String,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("argon2 hash failed: {}", err))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|err| anyhow!("invalid password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn unix_seconds() -> usize {
    chrono::Utc::now().timestamp().max(0) as usize
}

fn expiry(now: usize, ttl_secs: u64) -> Result<usize> {
    now.checked_add(ttl_secs as usize)
        .ok_or_else(|| anyhow!("token expiry overflow"))
}

fn validation(config: &AuthConfig) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[config.issuer.as_str()]);
    validation
}

pub fn issue_access_token(user: &UserRecord, config: &AuthConfig) -> Result<String> {
    let now = unix_seconds();
    let claims = AccessClaims {
        sub: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        exp: expiry(now, config.access_token_ttl_secs)?,
        iat: now,
        jti: Uuid::new_v4().to_string(),
        iss: config.issuer.clone(),
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.access_token_secret.as_bytes()),
    )?)
}

pub fn issue_refresh_token(user_id: &str, config: &AuthConfig) -> Result<String> {
    let now = unix_seconds();
    let claims = RefreshClaims {
        sub: user_id.to_string(),
        exp: expiry(now, config.refresh_token_ttl_secs)?,
        iat: now,
        jti: Uuid::new_v4().to_string(),
        iss: config.issuer.clone(),
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
    )?)
}

pub fn verify_access_token(token: &str, config: &AuthConfig) -> Result<AccessClaims> {
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.access_token_secret.as_bytes()),
        &validation(config),
    )?;
    Ok(data.claims)
}

pub fn verify_refresh_token(token: &str, config: &AuthConfig) -> Result<RefreshClaims> {
    let data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
        &validation(config),
    )?;
    Ok(data.claims)
}

/// Issues a new pair for `user` and records the refresh token, replacing
/// any earlier one.
pub async fn start_session(pool: &SqlitePool, user: &UserRecord, config: &AuthConfig) -> AppResult<TokenPair> {
    let pair = TokenPair {
        access_token: issue_access_token(user, config)?,
        refresh_token: issue_refresh_token(&user.id, config)?,
    };
    users::set_refresh_token(pool, &user.id, Some(&pair.refresh_token)).await?;
    Ok(pair)
}

/// Exchanges a refresh token for a new pair. The token must verify and
/// match the one stored for its user; reuse of a rotated token fails.
pub async fn rotate_session(
    pool: &SqlitePool,
    refresh_token: &str,
    config: &AuthConfig,
) -> AppResult<(UserRecord, TokenPair)> {
    let claims = verify_refresh_token(refresh_token, config)
        .map_err(|_| unauthorized("invalid or expired refresh token"))?;
    let user = users::find_by_id(pool, &claims.sub)
        .await?
        .ok_or_else(|| unauthorized("invalid refresh token"))?;
    if user.refresh_token.as_deref() != Some(refresh_token) {
        return Err(unauthorized("refresh token is expired or already used"));
    }
    let pair = start_session(pool, &user, config).await?;
    Ok((user, pair))
}

fn session_cookie(name: &'static str, value: String, config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

pub fn set_session_cookies(jar: CookieJar, pair: &TokenPair, config: &AuthConfig) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, pair.access_token.clone(), config))
        .add(session_cookie(REFRESH_COOKIE, pair.refresh_token.clone(), config))
}

pub fn clear_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

/// Access token from the cookie, falling back to a bearer header.
fn access_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        return Some(cookie.value().to_string());
    }
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The authenticated caller, loaded from the database.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserRecord);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = access_token(parts).ok_or_else(|| unauthorized("unauthorized request"))?;
        let claims = verify_access_token(&token, &state.config.auth)
            .map_err(|_| unauthorized("invalid or expired access token"))?;
        let user = users::find_by_id(&state.pool, &claims.sub)
            .await?
            .ok_or_else(|| unauthorized("invalid access token"))?;
        Ok(AuthUser(user))
    }
}
