//! Media storage for uploaded videos and images.
//!
//! Request handlers never hold media bytes in memory: multipart fields are
//! spooled to temporary files first, then handed to a [`MediaStore`] which
//! returns a public URL. Two stores are provided:
//!
//! | Provider | Store | Notes |
//! |----------|-------|-------|
//! | `local` | [`LocalMediaStore`] | copies into a directory served under `/media` |
//! | `cloudinary` | [`CloudinaryStore`] | signed REST upload/destroy |
//!
//! Deletes only touch URLs the store itself issued; anything else (for
//! example an avatar URL supplied by an identity provider) is skipped.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{CloudinaryConfig, LocalMediaConfig, MediaConfig};
use crate::models::new_id;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("media request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("media upload rejected: {0}")]
    Upload(String),
    #[error("media delete rejected: {0}")]
    Delete(String),
    #[error("media storage misconfigured: {0}")]
    Config(String),
}

/// What is being stored; decides the folder and upload resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    fn folder(&self) -> &'static str {
        match self {
            Self::Video => "videos",
            Self::Image => "images",
        }
    }
}

/// Result of a successful upload. `duration` is seconds of playback for
/// video uploads when the store can determine it, otherwise 0.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedMedia {
    pub url: String,
    pub duration: f64,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores the file at `path`. The file's extension is kept.
    async fn upload(&self, path: &Path, kind: MediaKind) -> Result<UploadedMedia, MediaError>;

    /// Removes a previously uploaded object. Unknown URLs are ignored.
    async fn delete(&self, url: &str) -> Result<(), MediaError>;
}

/// Builds the configured store.
pub fn build_store(config: &MediaConfig, client: reqwest::Client) -> Result<Arc<dyn MediaStore>, MediaError> {
    match config.provider.as_str() {
        "local" => {
            let local = config
                .local
                .as_ref()
                .ok_or_else(|| MediaError::Config("[media.local] section is missing".into()))?;
            Ok(Arc::new(LocalMediaStore::new(local)))
        }
        "cloudinary" => {
            let cloud = config
                .cloudinary
                .as_ref()
                .ok_or_else(|| MediaError::Config("[media.cloudinary] section is missing".into()))?;
            Ok(Arc::new(CloudinaryStore::new(cloud, client)))
        }
        other => Err(MediaError::Config(format!("unknown media provider '{}'", other))),
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

// ═══════════════════════════════════════════════════════════════════════
// Upload batches
// ═══════════════════════════════════════════════════════════════════════

/// Tracks the uploads made while serving one request so that a later
/// failure can remove the objects already stored.
pub struct UploadBatch<'a> {
    store: &'a dyn MediaStore,
    uploaded: Vec<String>,
}

impl<'a> UploadBatch<'a> {
    pub fn new(store: &'a dyn MediaStore) -> Self {
        Self {
            store,
            uploaded: Vec::new(),
        }
    }

    /// Uploads one file. On failure every earlier upload in the batch is
    /// deleted before the error is returned.
    pub async fn upload(&mut self, path: &Path, kind: MediaKind) -> Result<UploadedMedia, MediaError> {
        match self.store.upload(path, kind).await {
            Ok(media) => {
                self.uploaded.push(media.url.clone());
                Ok(media)
            }
            Err(err) => {
                self.rollback().await;
                Err(err)
            }
        }
    }

    /// Deletes everything uploaded so far. Failures are logged.
    pub async fn rollback(&mut self) {
        for url in self.uploaded.drain(..) {
            if let Err(err) = self.store.delete(&url).await {
                tracing::warn!(url = %url, error = %err, "failed to remove orphaned upload");
            }
        }
    }
}

/// Deletes every URL, continuing past failures. Returns the first error.
pub async fn delete_all(store: &dyn MediaStore, urls: &[&str]) -> Result<(), MediaError> {
    let mut first_err = None;
    for url in urls {
        if let Err(err) = store.delete(url).await {
            tracing::warn!(url = %url, error = %err, "media delete failed");
            first_err.get_or_insert(err);
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Local directory store
// ═══════════════════════════════════════════════════════════════════════

pub struct LocalMediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalMediaStore {
    pub fn new(config: &LocalMediaConfig) -> Self {
        Self {
            root: config.root.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Maps one of our URLs back to a path under `root`. Foreign URLs and
    /// anything that would escape `root` yield `None`.
    fn path_for(&self, url: &str) -> Option<PathBuf> {
        let rel = url.strip_prefix(&self.public_base_url)?.strip_prefix('/')?;
        let rel = Path::new(rel);
        if rel.components().all(|c| matches!(c, Component::Normal(_))) {
            Some(self.root.join(rel))
        } else {
            None
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, path: &Path, kind: MediaKind) -> Result<UploadedMedia, MediaError> {
        let dir = self.root.join(kind.folder());
        tokio::fs::create_dir_all(&dir).await?;
        let name = format!("{}.{}", new_id(), extension_of(path));
        tokio::fs::copy(path, dir.join(&name)).await?;
        Ok(UploadedMedia {
            url: format!("{}/{}/{}", self.public_base_url, kind.folder(), name),
            duration: 0.0,
        })
    }

    async fn delete(&self, url: &str) -> Result<(), MediaError> {
        let Some(path) = self.path_for(url) else {
            tracing::debug!(url, "skipping delete of foreign media url");
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Cloudinary store
// ═══════════════════════════════════════════════════════════════════════

const CLOUDINARY_API: &str = "https://api.cloudinary.com/v1_1";
const CLOUDINARY_DELIVERY_HOST: &str = "res.cloudinary.com";

pub struct CloudinaryStore {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CloudinaryUpload {
    secure_url: String,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CloudinaryDestroy {
    result: String,
}

/// Hex SHA-256 over the alphabetically ordered `k=v&...` parameter string
/// followed by the API secret.
fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Splits a delivery URL such as
/// `https://res.cloudinary.com/<cloud>/video/upload/v1712/vidnest/videos/abc.mp4`
/// into `("video", "vidnest/videos/abc")`.
fn parse_delivery_url(url: &str, cloud_name: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let rest = rest.strip_prefix(CLOUDINARY_DELIVERY_HOST)?.strip_prefix('/')?;
    let rest = rest.strip_prefix(cloud_name)?.strip_prefix('/')?;
    let (resource_type, rest) = rest.split_once('/')?;
    let rest = rest.strip_prefix("upload/")?;

    // Optional version segment
    let rest = match rest.split_once('/') {
        Some((first, tail))
            if first.len() > 1
                && first.starts_with('v')
                && first[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            tail
        }
        _ => rest,
    };

    let public_id = match rest.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') => stem,
        _ => rest,
    };
    if public_id.is_empty() {
        return None;
    }
    Some((resource_type.to_string(), public_id.to_string()))
}

impl CloudinaryStore {
    pub fn new(config: &CloudinaryConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!("{}/{}/{}/{}", CLOUDINARY_API, self.cloud_name, resource_type, action)
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(&self, path: &Path, kind: MediaKind) -> Result<UploadedMedia, MediaError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let folder = format!("vidnest/{}", kind.folder());
        let signature = sign(
            &[("folder", folder.as_str()), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );

        let bytes = tokio::fs::read(path).await?;
        let file_name = format!("upload.{}", extension_of(path));
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.endpoint("auto", "upload"))
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Upload(format!("{}: {}", status, body)));
        }

        let uploaded: CloudinaryUpload = response.json().await?;
        Ok(UploadedMedia {
            url: uploaded.secure_url,
            duration: uploaded.duration.unwrap_or(0.0),
        })
    }

    async fn delete(&self, url: &str) -> Result<(), MediaError> {
        let Some((resource_type, public_id)) = parse_delivery_url(url, &self.cloud_name) else {
            tracing::debug!(url, "skipping delete of foreign media url");
            return Ok(());
        };

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", public_id.as_str()), ("timestamp", timestamp.as_str())],
            &self.api_secret,
        );
        let params = [
            ("public_id", public_id.as_str()),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .client
            .post(self.endpoint(&resource_type, "destroy"))
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Delete(format!("{}: {}", status, body)));
        }

        let destroyed: CloudinaryDestroy = response.json().await?;
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::Delete(format!("unexpected result '{}'", other))),
        }
    }
}
