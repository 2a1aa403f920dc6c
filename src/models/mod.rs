use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::emotion::Emotion;

/// User is an account - identity, profile, and the unread-notification flag.
/// Follow edges and saved posts live in their own relations, not on the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub bio: String,
    pub location: String,
    pub profile_image: String,
    pub cover_image: String,
    pub has_new_notifications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Post body is immutable after creation; likes, saves and comments attach
/// to it through edge relations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub body: String,
    pub media_url: Option<String>,
    pub media_type: Option<MediaType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Gif,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Gif => "gif",
            MediaType::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<MediaType> {
        match s {
            "image" => Some(MediaType::Image),
            "gif" => Some(MediaType::Gif),
            "video" => Some(MediaType::Video),
            _ => None,
        }
    }
}

/// Comment on a post. The emotion-reaction variant carries the captured
/// frame as base64 plus the derived label; text comments leave those unset.
/// Immutable except for its like set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub body: String,
    pub image_data: Option<String>,
    pub emotion: Option<Emotion>,
    pub is_emotion_reaction: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Notification log entry. Append-only; removed only by clear-all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub body: String,
    pub link: Option<String>,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Reaction,
    CommentLike,
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Reaction => "reaction",
            NotificationKind::CommentLike => "comment_like",
            NotificationKind::Follow => "follow",
        }
    }

    pub fn parse(s: &str) -> Option<NotificationKind> {
        match s {
            "like" => Some(NotificationKind::Like),
            "comment" => Some(NotificationKind::Comment),
            "reaction" => Some(NotificationKind::Reaction),
            "comment_like" => Some(NotificationKind::CommentLike),
            "follow" => Some(NotificationKind::Follow),
            _ => None,
        }
    }
}

// ==================== Read-only projections ====================

/// Denormalized author snippet joined into feed items.
#[derive(Debug, Clone, Serialize)]
pub struct UserSnippet {
    pub id: String,
    pub name: String,
    pub username: String,
    pub profile_image: String,
    pub email: String,
}

impl From<&User> for UserSnippet {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            username: u.username.clone(),
            profile_image: u.profile_image.clone(),
            email: u.email.clone(),
        }
    }
}

/// Feed item: the post with its author snippet, counts, and the viewer's
/// like/save state. Never written back.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: String,
    pub body: String,
    pub media_url: Option<String>,
    pub media_type: Option<MediaType>,
    pub user: UserSnippet,
    pub likes: i64,
    pub comments: i64,
    pub has_liked: bool,
    pub has_saved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub body: String,
    pub user: UserSnippet,
    pub likes: i64,
    pub has_liked: bool,
    pub image_data: Option<String>,
    pub emotion: Option<Emotion>,
    pub is_emotion_reaction: bool,
    pub created_at: DateTime<Utc>,
}

/// Directory item: profile fields plus follow counts and the viewer's
/// follow state.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub location: String,
    pub profile_image: String,
    pub cover_image: String,
    pub followers: i64,
    pub following: i64,
    pub is_following: bool,
    pub created_at: DateTime<Utc>,
}

/// One page of feed results. `has_more` means further pages exist under the
/// same filter.
#[derive(Debug, Serialize)]
pub struct FeedPage<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

// Request/Response types for API

#[derive(Debug, Deserialize)]
pub struct RegisterStepOneRequest {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterStepTwoRequest {
    pub email: String,
    pub name: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub body: String,
    pub media_url: Option<String>,
    pub media_type: Option<MediaType>,
}

/// Create a text comment (`body`) or an emotion reaction (`image_data`).
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: String,
    pub body: Option<String>,
    pub image_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentIdRequest {
    pub comment_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub profile_image: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
