use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};

use crate::auth::role::Role;
use crate::db::models::{Category, CommentView, PostView, Report, UserSummary};
use crate::db::posts::{FeedOrder, FeedScope};
use crate::db::{categories, comments, posts, reports, users};
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminOnly, Authorized, CurrentUser};
use crate::routes::{form_value, parse_id, Html};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/admin.html")]
pub struct AdminTemplate {
    pub viewer: CurrentUser,
    pub users: Vec<UserSummary>,
    pub posts: Vec<PostView>,
    pub comments: Vec<CommentView>,
    pub categories: Vec<Category>,
    pub reports: Vec<Report>,
    pub roles: [Role; 4],
    pub total_users: i64,
    pub total_posts: i64,
    pub total_categories: i64,
}

/// One console action, decoded from the submitted form.
#[derive(Debug, PartialEq, Eq)]
pub enum AdminAction {
    DeleteUser(i64),
    DeletePost(i64),
    DeleteCategory(i64),
    AddCategory { name: String, description: Option<String> },
    ResolveReport(i64),
    DeleteComment(i64),
    SetRoles(Vec<(i64, Role)>),
}

impl AdminAction {
    /// Buttons are checked in a fixed order; role selects are the fallback.
    pub fn from_form(form: &[(String, String)]) -> AppResult<Self> {
        if let Some(id) = form_value(form, "delete_user") {
            return Ok(AdminAction::DeleteUser(parse_id(id)?));
        }
        if let Some(id) = form_value(form, "delete_post") {
            return Ok(AdminAction::DeletePost(parse_id(id)?));
        }
        if let Some(id) = form_value(form, "delete_category") {
            return Ok(AdminAction::DeleteCategory(parse_id(id)?));
        }
        if form_value(form, "add_category").is_some() {
            let name = form_value(form, "new_category")
                .ok_or_else(|| AppError::BadRequest("Category name is required".into()))?;
            return Ok(AdminAction::AddCategory {
                name: name.to_string(),
                description: form_value(form, "category_description").map(str::to_string),
            });
        }
        if let Some(id) = form_value(form, "resolve_report") {
            return Ok(AdminAction::ResolveReport(parse_id(id)?));
        }
        if let Some(id) = form_value(form, "delete_comment") {
            return Ok(AdminAction::DeleteComment(parse_id(id)?));
        }

        let mut changes = Vec::new();
        for (key, value) in form {
            let Some(user_id) = key.strip_prefix("role_") else {
                continue;
            };
            let user_id = parse_id(user_id)?;
            let role = Role::from_id(parse_id(value)?)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown role: {value}")))?;
            changes.push((user_id, role));
        }
        if changes.is_empty() {
            return Err(AppError::BadRequest("Unknown admin action".into()));
        }
        Ok(AdminAction::SetRoles(changes))
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/admin", get(dashboard).post(act))
}

/// GET /admin
pub async fn dashboard(State(state): State<AppState>, admin: Authorized<AdminOnly>) -> AppResult<Response> {
    let conn = state.db.get()?;
    let page = AdminTemplate {
        viewer: admin.user,
        users: users::list_users(&conn)?,
        posts: posts::list_feed(&conn, &FeedScope::All, FeedOrder::Newest)?,
        comments: comments::all_comments(&conn)?,
        categories: categories::all_categories(&conn)?,
        reports: reports::all_reports(&conn)?,
        roles: [Role::Admin, Role::Moderator, Role::User, Role::Guest],
        total_users: users::count_users(&conn)?,
        total_posts: posts::count_posts(&conn)?,
        total_categories: categories::count_categories(&conn)?,
    };
    Ok(Html(page).into_response())
}

/// POST /admin
pub async fn act(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    Form(form): Form<Vec<(String, String)>>,
) -> AppResult<Response> {
    let action = AdminAction::from_form(&form)?;
    let me = admin.user.id;

    let conn = state.db.get()?;
    match &action {
        AdminAction::DeleteUser(id) if *id == me => {
            return Err(AppError::BadRequest("You cannot delete your own account".into()));
        }
        AdminAction::DeleteUser(id) => {
            users::delete_user(&conn, *id)?;
        }
        AdminAction::DeletePost(id) => {
            posts::delete_post(&conn, *id)?;
        }
        AdminAction::DeleteCategory(id) => {
            categories::delete_category(&conn, *id)?;
        }
        AdminAction::AddCategory { name, description } => {
            if let Err(err) = categories::add_category(&conn, name, description.as_deref()) {
                return Err(match err.sqlite_error_code() {
                    Some(rusqlite::ErrorCode::ConstraintViolation) => {
                        AppError::BadRequest(format!("Category {name} already exists"))
                    }
                    _ => err.into(),
                });
            }
        }
        AdminAction::ResolveReport(id) => {
            reports::resolve_report(&conn, *id)?;
        }
        AdminAction::DeleteComment(id) => {
            comments::delete_comment(&conn, *id)?;
        }
        AdminAction::SetRoles(changes) => {
            for (user_id, role) in changes {
                if *user_id == me && *role != Role::Admin {
                    return Err(AppError::BadRequest("You cannot demote yourself".into()));
                }
            }
            for (user_id, role) in changes {
                users::update_role(&conn, *user_id, *role)?;
            }
        }
    }

    tracing::info!(admin_id = me, ?action, "Admin action applied");
    Ok(Redirect::to("/admin").into_response())
}
