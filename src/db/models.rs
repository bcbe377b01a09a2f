use serde::Serialize;

use crate::auth::role::Role;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    /// Token of the user's live session row, if any.
    pub current_session: Option<String>,
    pub created_at: String,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Compact user row for lists (followers, admin console, home sidebar).
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// A post joined with its author and the read-time aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: i64,
    pub image: Option<String>,
    pub content: String,
    pub created_at: String,
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub likes: i64,
    pub dislikes: i64,
    pub comments: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub content: String,
    pub created_at: String,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub likes: i64,
    pub dislikes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: i64,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub reported_by: i64,
    pub reporter: String,
    pub reason: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub post_id: Option<i64>,
    pub message: String,
    pub created_at: String,
}

/// One hit of the JSON search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}
