use askama::Template;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::follows::{self, Edge};
use crate::db::lookup::{self, Lookup};
use crate::db::models::{PostView, User, UserSummary};
use crate::db::posts::{self, FeedOrder, FeedScope};
use crate::db::users::{self, UserStats};
use crate::db::notifications;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::{parse_id, Html};
use crate::state::AppState;

/// Which relationship list the own-profile page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileView {
    Followers,
    Following,
    Friends,
}

impl ProfileView {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "followers" => Some(ProfileView::Followers),
            "following" => Some(ProfileView::Following),
            "friends" => Some(ProfileView::Friends),
            _ => None,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            ProfileView::Followers => "followers",
            ProfileView::Following => "following",
            ProfileView::Friends => "friends",
        }
    }
}

#[derive(Template)]
#[template(path = "pages/myprofile.html")]
pub struct MyProfileTemplate {
    pub viewer: CurrentUser,
    pub user: User,
    pub stats: UserStats,
    pub view: &'static str,
    pub people: Vec<UserSummary>,
    pub posts: Vec<PostView>,
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub viewer: CurrentUser,
    pub user: User,
    pub stats: UserStats,
    pub posts: Vec<PostView>,
    pub is_following: bool,
    pub is_friend: bool,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ViewQuery {
    pub view: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ProfileQuery {
    pub id: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct EdgeForm {
    pub user_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/myprofile", get(my_profile))
        .route("/profile", get(profile))
        .route("/follow", post(follow))
        .route("/friend", post(friend))
}

/// GET /myprofile?view=followers|following|friends
pub async fn my_profile(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Query(query): Query<ViewQuery>,
) -> AppResult<Response> {
    let view = ProfileView::parse(query.view.trim())
        .ok_or_else(|| AppError::BadRequest(format!("Unknown view: {}", query.view)))?;

    let conn = state.db.get()?;
    let user = users::get_user(&conn, viewer.id)?.ok_or(AppError::NotFound)?;
    let people = match view {
        ProfileView::Followers => follows::followers(&conn, viewer.id)?,
        ProfileView::Following => follows::following(&conn, viewer.id)?,
        ProfileView::Friends => follows::friends(&conn, viewer.id)?,
    };
    let page = MyProfileTemplate {
        stats: users::user_stats(&conn, viewer.id)?,
        posts: posts::list_feed(&conn, &FeedScope::AuthoredBy(viewer.id), FeedOrder::Newest)?,
        view: view.slug(),
        people,
        user,
        viewer,
    };
    Ok(Html(page).into_response())
}

/// GET /profile?id=
pub async fn profile(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Query(query): Query<ProfileQuery>,
) -> AppResult<Response> {
    let user_id = parse_id(&query.id)?;
    if user_id == viewer.id {
        return Ok(Redirect::to("/myprofile").into_response());
    }

    let conn = state.db.get()?;
    let user = users::get_user(&conn, user_id)?.ok_or(AppError::NotFound)?;
    let page = ProfileTemplate {
        stats: users::user_stats(&conn, user_id)?,
        posts: posts::list_feed(&conn, &FeedScope::AuthoredBy(user_id), FeedOrder::Newest)?,
        is_following: follows::has_edge(&conn, Edge::Follow, viewer.id, user_id)?,
        is_friend: follows::has_edge(&conn, Edge::Friend, viewer.id, user_id)?,
        user,
        viewer,
    };
    Ok(Html(page).into_response())
}

fn toggle_edge(state: &AppState, viewer: &CurrentUser, raw_target: &str, edge: Edge) -> AppResult<Response> {
    let target = parse_id(raw_target)?;
    if target == viewer.id {
        return Err(AppError::BadRequest(match edge {
            Edge::Follow => "You cannot follow yourself".into(),
            Edge::Friend => "You cannot befriend yourself".into(),
        }));
    }

    let mut conn = state.db.get()?;
    if !lookup::exists(&conn, Lookup::UsernameByUserId, target)? {
        return Err(AppError::NotFound);
    }
    let present = follows::toggle(&mut conn, edge, viewer.id, target)?;
    if present {
        let message = match edge {
            Edge::Follow => format!("{} started following you", viewer.username),
            Edge::Friend => format!("{} added you as a friend", viewer.username),
        };
        notifications::notify(&conn, target, None, &message)?;
    }

    tracing::debug!(from = viewer.id, to = target, ?edge, present, "Edge toggled");
    Ok(Redirect::to(&format!("/profile?id={target}")).into_response())
}

/// POST /follow
pub async fn follow(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Form(form): Form<EdgeForm>,
) -> AppResult<Response> {
    toggle_edge(&state, &viewer, &form.user_id, Edge::Follow)
}

/// POST /friend
pub async fn friend(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Form(form): Form<EdgeForm>,
) -> AppResult<Response> {
    toggle_edge(&state, &viewer, &form.user_id, Edge::Friend)
}
