//! Database row types: these map directly to SQLite rows.
//! Distinct from bluenote-types API models to keep the DB layer independent.

use chrono::{DateTime, Utc};

use bluenote_types::models::{MediaStatus, PostStatus, PostType, Role};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub nickname: String,
    pub avatar: String,
    pub bio: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserStats {
    pub follow_count: i64,
    pub fans_count: i64,
    /// Likes received across all of the user's posts.
    pub like_count: i64,
    pub post_count: i64,
}

/// Post joined with its author's public fields and tags.
#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub nickname: String,
    pub avatar: String,
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub tags: Vec<String>,
    pub files: Vec<String>,
    pub cover_image: String,
    pub status: PostStatus,
    pub reject_reason: Option<String>,
    pub likes: i64,
    pub comments: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written when a post or draft is created or overwritten.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub tags: Vec<String>,
    pub files: Vec<String>,
    pub cover_image: String,
    pub status: PostStatus,
}

/// Comment joined with its author's public fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub nickname: String,
    pub avatar: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scored_at: DateTime<Utc>,
    pub likes: i64,
    pub score: f64,
    pub is_author: bool,
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct MediaRow {
    pub id: String,
    pub user_id: i64,
    pub file_name: String,
    pub kind: PostType,
    pub size: i64,
    pub status: MediaStatus,
    pub created_at: DateTime<Utc>,
}
