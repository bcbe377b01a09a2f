use askama::Template;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::auth::password::{hash_off_runtime, verify_off_runtime, MIN_PASSWORD_LEN};
use crate::db::lookup::{self, Lookup};
use crate::db::models::User;
use crate::db::users::{self, ProfileUpdate};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::auth::is_valid_email;
use crate::routes::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/settings.html")]
pub struct SettingsTemplate {
    pub viewer: CurrentUser,
    pub user: User,
    pub error: Option<String>,
    pub notice: Option<&'static str>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct SettingsQuery {
    pub status: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings", get(settings_page).post(update_settings))
        .route("/changepassword", post(change_password))
}

fn render(state: &AppState, viewer: CurrentUser, error: Option<String>, notice: Option<&'static str>) -> AppResult<Response> {
    let conn = state.db.get()?;
    let user = users::get_user(&conn, viewer.id)?.ok_or(AppError::NotFound)?;
    let status = if error.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    let page = Html(SettingsTemplate {
        viewer,
        user,
        error,
        notice,
    });
    Ok((status, page).into_response())
}

/// GET /settings
pub async fn settings_page(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Query(query): Query<SettingsQuery>,
) -> AppResult<Response> {
    let notice = match query.status.as_str() {
        "profile" => Some("Profile updated"),
        "password" => Some("Password changed"),
        _ => None,
    };
    render(&state, viewer, None, notice)
}

/// POST /settings: names, username, email and avatar URL.
pub async fn update_settings(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let update = ProfileUpdate {
        first_name: form.first_name.trim(),
        last_name: form.last_name.trim(),
        username: form.username.trim(),
        email: form.email.trim(),
        avatar: Some(form.avatar.trim()).filter(|a| !a.is_empty()),
    };

    if [update.first_name, update.last_name, update.username, update.email]
        .iter()
        .any(|f| f.is_empty())
    {
        return render(&state, viewer, Some("All fields are required".into()), None);
    }
    if !is_valid_email(update.email) {
        return render(&state, viewer, Some("Invalid email format".into()), None);
    }

    let edited = {
        let mut conn = state.db.get()?;
        users::edit_profile(&mut conn, viewer.id, &update)?
    };
    if let Err(conflict) = edited {
        return render(&state, viewer, Some(conflict.message().into()), None);
    }

    tracing::info!(user_id = viewer.id, "Profile updated");
    Ok(Redirect::to("/settings?status=profile").into_response())
}

/// POST /changepassword
pub async fn change_password(
    State(state): State<AppState>,
    viewer: CurrentUser,
    Form(form): Form<PasswordForm>,
) -> AppResult<Response> {
    let stored: String = {
        let conn = state.db.get()?;
        lookup::select_one(&conn, Lookup::PasswordHashByUserId, viewer.id)?.ok_or(AppError::NotFound)?
    };

    if !verify_off_runtime(&form.current_password, &stored).await? {
        return render(&state, viewer, Some("Current password is incorrect".into()), None);
    }
    if form.new_password != form.confirm_password {
        return render(&state, viewer, Some("New passwords do not match".into()), None);
    }
    if form.new_password.chars().count() < MIN_PASSWORD_LEN {
        let message = format!("Password must be at least {MIN_PASSWORD_LEN} characters");
        return render(&state, viewer, Some(message), None);
    }

    let hash = hash_off_runtime(&form.new_password, state.config.auth.password_cost).await?;
    let conn = state.db.get()?;
    users::update_password(&conn, viewer.id, &hash)?;

    tracing::info!(user_id = viewer.id, "Password changed");
    Ok(Redirect::to("/settings?status=password").into_response())
}
