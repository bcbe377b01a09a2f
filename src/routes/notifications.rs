use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::db::models::Notification;
use crate::db::notifications;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/notifications.html")]
pub struct NotificationsTemplate {
    pub viewer: CurrentUser,
    pub notifications: Vec<Notification>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/notifications", get(list))
}

/// GET /notifications: the whole feed, most recent first.
pub async fn list(State(state): State<AppState>, viewer: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    let notifications = notifications::latest(&conn, viewer.id, None)?;
    Ok(Html(NotificationsTemplate {
        viewer,
        notifications,
    })
    .into_response())
}
