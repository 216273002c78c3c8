//! Google sign-in.
//!
//! The provider is behind [`IdentityProvider`] so the callback flow can be
//! driven without network access. Resolving a federated profile to a local
//! account goes, in order:
//!
//! 1. an account already linked to the provider id,
//! 2. an account with the same email, linked now, but only when the
//!    provider says the email is verified,
//! 3. a new account with a username derived from the email local part
//!    and no password.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::config::GoogleOAuthConfig;
use crate::error::{conflict, AppResult};
use crate::models::{new_id, UserRecord};
use crate::store::users::{self, NewUser};

pub const STATE_COOKIE: &str = "oauthState";

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Identity as reported by the provider.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub provider_id: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: String,
    pub photo_url: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is redirected to, carrying `state` for CSRF checks.
    fn authorize_url(&self, state: &str) -> Result<String>;

    /// Exchanges an authorization code for the user's profile.
    async fn exchange(&self, code: &str) -> Result<FederatedProfile>;
}

pub struct GoogleProvider {
    client: reqwest::Client,
    config: GoogleOAuthConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleProvider {
    pub fn new(config: GoogleOAuthConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize_url(&self, state: &str) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            GOOGLE_AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )?;
        Ok(url.to_string())
    }

    async fn exchange(&self, code: &str) -> Result<FederatedProfile> {
        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("token exchange request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("token exchange failed {}: {}", status, body);
        }
        let token: TokenResponse = response.json().await?;

        let response = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("userinfo request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("userinfo failed {}: {}", status, body);
        }
        let info: UserInfo = response.json().await?;

        let email = info
            .email
            .filter(|e| !e.is_empty())
            .context("provider did not return an email address")?;
        Ok(FederatedProfile {
            display_name: info.name.unwrap_or_else(|| email.clone()),
            provider_id: info.sub,
            email,
            email_verified: info.email_verified,
            photo_url: info.picture,
        })
    }
}

/// Username candidate from an email: the local part, lowercased, keeping
/// only `[a-z0-9._]`.
pub fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let base: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '_')
        .take(24)
        .collect();
    if base.is_empty() {
        "user".to_string()
    } else {
        base
    }
}

async fn free_username(pool: &SqlitePool, email: &str) -> AppResult<String> {
    let base = username_base(email);
    if !users::username_taken(pool, &base).await? {
        return Ok(base);
    }
    for _ in 0..5 {
        let suffix: String = new_id().chars().filter(|c| c.is_ascii_hexdigit()).take(6).collect();
        let candidate = format!("{}_{}", base, suffix);
        if !users::username_taken(pool, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(conflict("could not derive a free username"))
}

/// Resolves a federated profile to a local account, linking or creating
/// one as needed.
pub async fn provision_user(pool: &SqlitePool, profile: &FederatedProfile) -> AppResult<UserRecord> {
    if let Some(user) = users::find_by_google_id(pool, &profile.provider_id).await? {
        return Ok(user);
    }

    if let Some(existing) = users::find_by_email(pool, &profile.email).await? {
        if !profile.email_verified {
            return Err(conflict(
                "an account with this email exists; sign in with a password to link it",
            ));
        }
        tracing::info!(user_id = %existing.id, "linking google identity to existing account");
        return users::link_google_id(pool, &existing.id, &profile.provider_id).await;
    }

    let username = free_username(pool, &profile.email).await?;
    let user = users::create_user(
        pool,
        NewUser {
            username,
            email: profile.email.clone(),
            full_name: profile.display_name.clone(),
            avatar: profile.photo_url.clone().unwrap_or_default(),
            cover_image: String::new(),
            password_hash: None,
            google_id: Some(profile.provider_id.clone()),
        },
    )
    .await?;
    tracing::info!(user_id = %user.id, "created account from google identity");
    Ok(user)
}
