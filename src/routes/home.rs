use askama::Template;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::db::models::{Category, Notification, PostView, UserSummary};
use crate::db::posts::{FeedOrder, FeedScope};
use crate::db::{categories, notifications, posts, users};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::{Html, HOME_LANDING};
use crate::state::AppState;

const SIDEBAR_NOTIFICATIONS: u32 = 5;

/// Feed tabs. The last three are about the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Posts,
    Tags,
    YourPosts,
    YourReplies,
    YourReactions,
}

impl Tab {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "posts" => Some(Tab::Posts),
            "tags" => Some(Tab::Tags),
            "your posts" | "your-posts" => Some(Tab::YourPosts),
            "your replies" | "your-replies" => Some(Tab::YourReplies),
            "your reactions" | "your-reactions" => Some(Tab::YourReactions),
            _ => None,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Tab::Posts => "posts",
            Tab::Tags => "tags",
            Tab::YourPosts => "your-posts",
            Tab::YourReplies => "your-replies",
            Tab::YourReactions => "your-reactions",
        }
    }

    fn default_filter(self) -> &'static str {
        match self {
            Tab::YourPosts | Tab::YourReplies => "newest",
            Tab::YourReactions => "likes",
            Tab::Posts | Tab::Tags => "all",
        }
    }

    fn is_personal(self) -> bool {
        matches!(self, Tab::YourPosts | Tab::YourReplies | Tab::YourReactions)
    }
}

/// Resolve a tab/filter pair into what to query. On the tags tab any filter
/// other than "all" names a category.
pub fn feed_for(tab: Tab, filter: &str, viewer: Option<&CurrentUser>) -> AppResult<(FeedScope, FeedOrder)> {
    if tab == Tab::Tags && filter != "all" {
        return Ok((FeedScope::Category(filter.to_string()), FeedOrder::Newest));
    }

    let order = FeedOrder::parse(filter)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown filter: {filter}")))?;
    let scope = match (tab, viewer) {
        (Tab::Posts | Tab::Tags, _) => FeedScope::All,
        (_, None) => return Err(AppError::Unauthenticated),
        (Tab::YourPosts, Some(user)) => FeedScope::AuthoredBy(user.id),
        (Tab::YourReplies, Some(user)) => FeedScope::RepliedBy(user.id),
        (Tab::YourReactions, Some(user)) => FeedScope::ReactedBy(user.id),
    };
    Ok((scope, order))
}

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub viewer: Option<CurrentUser>,
    pub tab: &'static str,
    pub filter: String,
    pub categories: Vec<Category>,
    pub users: Vec<UserSummary>,
    pub posts: Vec<PostView>,
    pub notifications: Vec<Notification>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct HomeQuery {
    pub tab: Option<String>,
    pub filter: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/home", get(home))
}

/// GET /home?tab=&filter=
pub async fn home(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<HomeQuery>,
) -> AppResult<Response> {
    let Some(raw_tab) = query.tab.filter(|t| !t.trim().is_empty()) else {
        return Ok(Redirect::to(HOME_LANDING).into_response());
    };
    let tab = Tab::parse(raw_tab.trim())
        .ok_or_else(|| AppError::BadRequest(format!("Unknown tab: {raw_tab}")))?;
    if tab.is_personal() && viewer.is_none() {
        return Err(AppError::Unauthenticated);
    }

    let filter = query
        .filter
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| tab.default_filter().to_string());
    let (scope, order) = feed_for(tab, &filter, viewer.as_ref())?;

    let conn = state.db.get()?;
    let page = HomeTemplate {
        tab: tab.slug(),
        categories: categories::all_categories(&conn)?,
        users: users::list_users(&conn)?,
        posts: posts::list_feed(&conn, &scope, order)?,
        notifications: match &viewer {
            Some(user) => notifications::latest(&conn, user.id, Some(SIDEBAR_NOTIFICATIONS))?,
            None => Vec::new(),
        },
        filter,
        viewer,
    };

    Ok(Html(page).into_response())
}
