//! HTTP handlers, one module per resource.
//!
//! Handlers are thin: they parse and validate request input, call the
//! matching [`crate::store`] operation, and wrap the result in
//! [`ApiResponse`](crate::server::ApiResponse). Every handler except
//! registration, login, token refresh, health and the OAuth endpoints takes
//! an [`AuthUser`](crate::auth::AuthUser).

pub mod comments;
pub mod dashboard;
pub mod likes;
pub mod oauth;
pub mod playlists;
pub mod posts;
pub mod subscriptions;
pub mod users;
pub mod videos;

use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::error::{bad_request, AppError, AppResult};

/// JSON body whose rejections use the API error shape.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(bad_request(rejection.body_text())),
        }
    }
}

/// A parsed `multipart/form-data` body. File parts are spooled to
/// temporary files that are removed when the form is dropped.
#[derive(Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, NamedTempFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| bad_request(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let text = field.text().await.map_err(|e| bad_request(e.body_text()))?;
                form.fields.insert(name, text);
                continue;
            };

            let suffix = std::path::Path::new(&file_name)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e))
                .unwrap_or_default();
            let spool = tempfile::Builder::new()
                .prefix("vidnest-upload-")
                .suffix(&suffix)
                .tempfile()
                .map_err(|e| AppError::from(anyhow::Error::from(e)))?;
            let mut out = tokio::fs::File::from_std(
                spool
                    .reopen()
                    .map_err(|e| AppError::from(anyhow::Error::from(e)))?,
            );

            let mut written = 0usize;
            while let Some(chunk) = field.chunk().await.map_err(|e| bad_request(e.body_text()))? {
                written += chunk.len();
                out.write_all(&chunk)
                    .await
                    .map_err(|e| AppError::from(anyhow::Error::from(e)))?;
            }
            out.flush()
                .await
                .map_err(|e| AppError::from(anyhow::Error::from(e)))?;

            // Browsers send an empty part for an unselected file input
            if written > 0 {
                form.files.insert(name, spool);
            }
        }
        Ok(form)
    }

    /// Trimmed text field; empty counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require_text(&self, name: &str) -> AppResult<&str> {
        self.text(name)
            .ok_or_else(|| bad_request(format!("{} is required", name)))
    }

    pub fn file(&self, name: &str) -> Option<&NamedTempFile> {
        self.files.get(name)
    }

    pub fn require_file(&self, name: &str) -> AppResult<&NamedTempFile> {
        self.file(name)
            .ok_or_else(|| bad_request(format!("{} file is required", name)))
    }
}

/// Trimmed, non-empty required JSON string.
pub(crate) fn required<'a>(value: Option<&'a str>, name: &str) -> AppResult<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request(format!("{} is required", name)))
}
