use askama::Template;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::lookup::{self, Lookup};
use crate::db::models::{Category, CommentView, PostView};
use crate::db::reactions::{self, ReactionKind, ReactionTarget};
use crate::db::reports::{self, ReportSubject};
use crate::db::{categories, comments, notifications, posts};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::{form_value, parse_id, redirect_back, Html, HOME_LANDING};
use crate::state::AppState;

const DEFAULT_REPORT_REASON: &str = "No reason given";

#[derive(Template)]
#[template(path = "pages/newpost.html")]
pub struct NewPostTemplate {
    pub viewer: CurrentUser,
    pub categories: Vec<Category>,
}

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub viewer: CurrentUser,
    pub post: PostView,
    pub comments: Vec<CommentView>,
    pub liked: bool,
    pub disliked: bool,
    pub can_delete: bool,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ReportQuery {
    pub id: String,
    pub reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CommentForm {
    pub post_id: String,
    pub content: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct PostReactionForm {
    pub post_id: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CommentReactionForm {
    pub comment_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/newpost", get(new_post_form).post(create_post))
        .route("/post", get(show_post))
        .route("/addcomment", post(add_comment))
        .route("/like", post(like_post))
        .route("/dislike", post(dislike_post))
        .route("/likecomment", post(like_comment))
        .route("/dislikecomment", post(dislike_comment))
        .route("/deletepost", get(delete_post))
        .route("/reportpost", get(report_post))
}

fn post_url(post_id: i64) -> String {
    format!("/post?id={post_id}")
}

/// Owner of a post, or 404 when it does not exist.
fn post_owner(state: &AppState, post_id: i64) -> AppResult<i64> {
    let conn = state.db.get()?;
    lookup::select_one(&conn, Lookup::PostOwnerByPostId, post_id)?.ok_or(AppError::NotFound)
}

/// GET /newpost
pub async fn new_post_form(State(state): State<AppState>, viewer: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    let categories = categories::all_categories(&conn)?;
    Ok(Html(NewPostTemplate { viewer, categories }).into_response())
}

/// POST /newpost: `content`, optional `image`, repeated `categories`.
pub async fn create_post(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Form(form): Form<Vec<(String, String)>>,
) -> AppResult<Response> {
    let content = form_value(&form, "content")
        .ok_or_else(|| AppError::BadRequest("Post content is required".into()))?;
    let image = form_value(&form, "image");
    let mut category_ids = form
        .iter()
        .filter(|(key, value)| key == "categories" && !value.trim().is_empty())
        .map(|(_, value)| parse_id(value))
        .collect::<AppResult<Vec<i64>>>()?;
    category_ids.sort_unstable();
    category_ids.dedup();

    let mut conn = state.db.get()?;
    if !categories::all_exist(&conn, &category_ids)? {
        return Err(AppError::BadRequest("Unknown category".into()));
    }
    let post_id = posts::insert_post(&mut conn, viewer.id, content, image, &category_ids)?;

    tracing::info!(post_id, user_id = viewer.id, "Post created");
    Ok(Redirect::to(&post_url(post_id)).into_response())
}

/// GET /post?id=
pub async fn show_post(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Query(query): Query<IdQuery>,
) -> AppResult<Response> {
    let Some(raw) = query.id.filter(|id| !id.trim().is_empty()) else {
        return Ok(Redirect::to("/home").into_response());
    };
    let post_id = parse_id(&raw)?;

    let conn = state.db.get()?;
    let post = posts::get_post(&conn, post_id)?.ok_or(AppError::NotFound)?;
    let comments = comments::comments_for_post(&conn, post_id)?;
    let reaction = reactions::reaction_of(&conn, ReactionTarget::Post(post_id), viewer.id)?;

    let page = PostTemplate {
        can_delete: post.user_id == viewer.id || viewer.role.is_staff(),
        liked: reaction == Some(ReactionKind::Like),
        disliked: reaction == Some(ReactionKind::Dislike),
        viewer,
        post,
        comments,
    };
    Ok(Html(page).into_response())
}

/// POST /addcomment
pub async fn add_comment(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let post_id = parse_id(&form.post_id)?;
    let content = form.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }

    let owner = post_owner(&state, post_id)?;
    let conn = state.db.get()?;
    comments::add_comment(&conn, post_id, viewer.id, content)?;
    if owner != viewer.id {
        let message = format!("{} commented on your post", viewer.username);
        notifications::notify(&conn, owner, Some(post_id), &message)?;
    }

    Ok(Redirect::to(&post_url(post_id)).into_response())
}

async fn react_to_post(
    state: &AppState,
    viewer: &CurrentUser,
    headers: &HeaderMap,
    raw_post_id: &str,
    kind: ReactionKind,
) -> AppResult<Response> {
    let post_id = parse_id(raw_post_id)?;
    let owner = post_owner(state, post_id)?;

    let mut conn = state.db.get()?;
    let target = ReactionTarget::Post(post_id);
    let outcome = match kind {
        ReactionKind::Like => reactions::toggle_like(&mut conn, target, viewer.id)?,
        ReactionKind::Dislike => reactions::toggle_dislike(&mut conn, target, viewer.id)?,
    };

    if outcome.state == Some(kind) && owner != viewer.id {
        let verb = match kind {
            ReactionKind::Like => "liked",
            ReactionKind::Dislike => "disliked",
        };
        let message = format!("{} {} your post", viewer.username, verb);
        notifications::notify(&conn, owner, Some(post_id), &message)?;
    }

    tracing::debug!(
        post_id,
        user_id = viewer.id,
        likes = outcome.likes,
        dislikes = outcome.dislikes,
        "Post reaction toggled"
    );
    Ok(redirect_back(headers, &post_url(post_id)))
}

/// POST /like
pub async fn like_post(
    State(state): State<AppState>,
    viewer: CurrentUser,
    headers: HeaderMap,
    Form(form): Form<PostReactionForm>,
) -> AppResult<Response> {
    react_to_post(&state, &viewer, &headers, &form.post_id, ReactionKind::Like).await
}

/// POST /dislike
pub async fn dislike_post(
    State(state): State<AppState>,
    viewer: CurrentUser,
    headers: HeaderMap,
    Form(form): Form<PostReactionForm>,
) -> AppResult<Response> {
    react_to_post(&state, &viewer, &headers, &form.post_id, ReactionKind::Dislike).await
}

async fn react_to_comment(
    state: &AppState,
    viewer: &CurrentUser,
    headers: &HeaderMap,
    raw_comment_id: &str,
    kind: ReactionKind,
) -> AppResult<Response> {
    let comment_id = parse_id(raw_comment_id)?;

    let mut conn = state.db.get()?;
    let post_id: i64 = lookup::select_one(&conn, Lookup::CommentPostByCommentId, comment_id)?
        .ok_or(AppError::NotFound)?;
    let target = ReactionTarget::Comment(comment_id);
    match kind {
        ReactionKind::Like => reactions::toggle_like(&mut conn, target, viewer.id)?,
        ReactionKind::Dislike => reactions::toggle_dislike(&mut conn, target, viewer.id)?,
    };

    Ok(redirect_back(headers, &post_url(post_id)))
}

/// POST /likecomment
pub async fn like_comment(
    State(state): State<AppState>,
    viewer: CurrentUser,
    headers: HeaderMap,
    Form(form): Form<CommentReactionForm>,
) -> AppResult<Response> {
    react_to_comment(&state, &viewer, &headers, &form.comment_id, ReactionKind::Like).await
}

/// POST /dislikecomment
pub async fn dislike_comment(
    State(state): State<AppState>,
    viewer: CurrentUser,
    headers: HeaderMap,
    Form(form): Form<CommentReactionForm>,
) -> AppResult<Response> {
    react_to_comment(&state, &viewer, &headers, &form.comment_id, ReactionKind::Dislike).await
}

/// GET /deletepost?id=: the author or staff only.
pub async fn delete_post(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Query(query): Query<IdQuery>,
) -> AppResult<Response> {
    let post_id = parse_id(query.id.as_deref().unwrap_or_default())?;
    let owner = post_owner(&state, post_id)?;
    if owner != viewer.id && !viewer.role.is_staff() {
        tracing::warn!(post_id, user_id = viewer.id, "Refused post deletion");
        return Err(AppError::Unauthorized);
    }

    let conn = state.db.get()?;
    posts::delete_post(&conn, post_id)?;
    tracing::info!(post_id, user_id = viewer.id, "Post deleted");
    Ok(Redirect::to(HOME_LANDING).into_response())
}

/// GET /reportpost?id=&reason=
pub async fn report_post(
    State(state): State<AppState>,
    viewer: CurrentUser,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let post_id = parse_id(&query.id)?;
    post_owner(&state, post_id)?;
    let reason = query
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REPORT_REASON);

    let conn = state.db.get()?;
    reports::file_report(&conn, ReportSubject::Post(post_id), viewer.id, reason)?;
    tracing::info!(post_id, user_id = viewer.id, "Post reported");
    Ok(redirect_back(&headers, &post_url(post_id)))
}
