//! Entity records and the view models returned by the read layer.
//!
//! Records mirror table rows. Views are the denormalized, viewer-relative
//! projections: owner fields inlined as one embedded object, edge tables
//! folded into counts and booleans. Only the fields declared here ever
//! reach a response; password hashes and refresh tokens have no view.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{bad_request, AppResult};

/// Current time as unix milliseconds, the storage format for timestamps.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Converts stored unix milliseconds into a UTC timestamp.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Validates an identifier taken from a path or body. `kind` names the
/// parameter in the error message (e.g. `"videoId"`).
pub fn parse_id(kind: &str, raw: &str) -> AppResult<String> {
    Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| bad_request(format!("invalid or missing {}", kind)))
}

/// Full user row. Never serialized.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub password_hash: Option<String>,
    pub refresh_token: Option<String>,
    pub google_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Public user fields (current user, register, profile updates).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserProfile {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
            cover_image: user.cover_image.clone(),
            created_at: from_millis(user.created_at),
            updated_at: from_millis(user.updated_at),
        }
    }
}

/// The owner join collapsed into a single embedded object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
}

/// Channel profile as seen by a viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    pub cover_image: String,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
}

/// A user in a subscriber / subscription list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCard {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
    pub subscribers_count: i64,
    pub is_subscribed: bool,
}

/// Video row as stored, returned from create/update endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Search feed item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCard {
    #[serde(rename = "_id")]
    pub id: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub owner: Option<OwnerSummary>,
    pub likes_count: i64,
}

/// Owner of a video on its detail page, with viewer-relative channel state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoChannel {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
    pub subscribers_count: i64,
    pub is_subscribed: bool,
}

/// Single video page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    #[serde(rename = "_id")]
    pub id: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub owner: Option<VideoChannel>,
    pub likes_count: i64,
    pub is_liked: bool,
}

/// Compact video used in liked-videos, watch history and playlists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub duration: f64,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub owner: Option<OwnerSummary>,
}

/// The viewer's own video on the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardVideo {
    #[serde(rename = "_id")]
    pub id: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub likes_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub total_subscribers: i64,
    pub total_videos: i64,
    pub total_views: i64,
    pub total_likes: i64,
}

/// Comment row as stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    pub video: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment thread entry or post feed entry: content with owner and likes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentView {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner: Option<OwnerSummary>,
    pub likes_count: i64,
    pub is_liked: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner: Option<OwnerSummary>,
    pub total_videos: i64,
    pub total_views: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub summary: PlaylistSummary,
    pub videos: Vec<VideoSummary>,
}

/// Result of a toggle operation.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToggleState {
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToggleOutcome {
    pub state: ToggleState,
}

/// Target of a like: exactly one of video, comment, or post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeTarget {
    Video(String),
    Comment(String),
    Post(String),
}

impl LikeTarget {
    /// (likes column, target table, human label)
    pub fn columns(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Video(_) => ("video_id", "videos", "video"),
            Self::Comment(_) => ("comment_id", "comments", "comment"),
            Self::Post(_) => ("post_id", "posts", "post"),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Video(id) | Self::Comment(id) | Self::Post(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_normalizes() {
        let id = Uuid::new_v4();
        let upper = id.to_string().to_uppercase();
        assert_eq!(parse_id("videoId", &upper).unwrap(), id.to_string());
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let err = parse_id("videoId", "not-an-id").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert!(err.message.contains("videoId"));
        assert!(parse_id("videoId", "").is_err());
    }

    #[test]
    fn test_profile_has_no_secrets() {
        let user = UserRecord {
            id: new_id(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            full_name: "Ana".into(),
            avatar: "a.png".into(),
            cover_image: String::new(),
            password_hash: Some("hash".into()),
            refresh_token: Some("token".into()),
            google_id: None,
            created_at: 0,
            updated_at: 0,
        };
        let json = serde_json::to_value(UserProfile::from(&user)).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("passwordHash"));
        assert!(!obj.contains_key("refreshToken"));
        assert_eq!(obj["_id"], user.id.as_str());
        assert_eq!(obj["fullName"], "Ana");
    }

    #[test]
    fn test_toggle_state_serializes_lowercase() {
        let json = serde_json::to_value(ToggleOutcome {
            state: ToggleState::Removed,
        })
        .unwrap();
        assert_eq!(json["state"], "removed");
    }
}
