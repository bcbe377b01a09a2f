use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};

use crate::db::lookup::{self, Lookup};
use crate::db::models::{CommentView, PostView, Report};
use crate::db::posts::{FeedOrder, FeedScope};
use crate::db::reports::ReportSubject;
use crate::db::{comments, posts, reports};
use crate::error::{AppError, AppResult};
use crate::extractors::{Authorized, CurrentUser, ModeratorOnly};
use crate::routes::{form_value, parse_id, Html};
use crate::state::AppState;

const DEFAULT_REASON: &str = "Reported by moderator";

#[derive(Template)]
#[template(path = "pages/moderator.html")]
pub struct ModeratorTemplate {
    pub viewer: CurrentUser,
    pub posts: Vec<PostView>,
    pub comments: Vec<CommentView>,
    pub reports: Vec<Report>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/moderator", get(console).post(act))
}

/// GET /moderator
pub async fn console(
    State(state): State<AppState>,
    moderator: Authorized<ModeratorOnly>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let page = ModeratorTemplate {
        viewer: moderator.user,
        posts: posts::list_feed(&conn, &FeedScope::All, FeedOrder::Newest)?,
        comments: comments::all_comments(&conn)?,
        reports: reports::all_reports(&conn)?,
    };
    Ok(Html(page).into_response())
}

/// POST /moderator: delete or report a post or comment.
pub async fn act(
    State(state): State<AppState>,
    moderator: Authorized<ModeratorOnly>,
    Form(form): Form<Vec<(String, String)>>,
) -> AppResult<Response> {
    let me = moderator.user.id;
    let reason = form_value(&form, "report_reason").unwrap_or(DEFAULT_REASON);
    let conn = state.db.get()?;

    if let Some(id) = form_value(&form, "delete_post") {
        let id = parse_id(id)?;
        posts::delete_post(&conn, id)?;
        tracing::info!(moderator_id = me, post_id = id, "Post removed");
    } else if let Some(id) = form_value(&form, "report_post") {
        let id = parse_id(id)?;
        if !lookup::exists(&conn, Lookup::PostOwnerByPostId, id)? {
            return Err(AppError::NotFound);
        }
        reports::file_report(&conn, ReportSubject::Post(id), me, reason)?;
    } else if let Some(id) = form_value(&form, "delete_comment") {
        let id = parse_id(id)?;
        comments::delete_comment(&conn, id)?;
        tracing::info!(moderator_id = me, comment_id = id, "Comment removed");
    } else if let Some(id) = form_value(&form, "report_comment") {
        let id = parse_id(id)?;
        if !lookup::exists(&conn, Lookup::CommentPostByCommentId, id)? {
            return Err(AppError::NotFound);
        }
        reports::file_report(&conn, ReportSubject::Comment(id), me, reason)?;
    } else {
        return Err(AppError::BadRequest("Unknown moderator action".into()));
    }

    Ok(Redirect::to("/moderator").into_response())
}
