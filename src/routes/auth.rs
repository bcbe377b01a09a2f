use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::auth::cookie::{clear_session_cookie, session_cookie};
use crate::auth::password::{hash_off_runtime, verify_off_runtime};
use crate::auth::role::Role;
use crate::db::users::{self, NewUser};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::{Html, HOME_LANDING};
use crate::state::AppState;

pub const INVALID_LOGIN: &str = "Invalid email or password";

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub email: String,
}

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub error: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "confirm-password")]
    pub confirm_password: String,
    pub avatar: String,
}

impl SignupForm {
    fn rerender(&self, error: &str) -> Response {
        Html(SignupTemplate {
            error: Some(error.to_string()),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
        })
        .into_response()
    }
}

/// Routes reachable without a session.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/login", get(index).post(login))
        .route("/signup", get(signup_page).post(signup))
}

/// Routes that sit behind the session middleware.
pub fn session_router() -> Router<AppState> {
    Router::new().route("/logout", get(logout))
}

/// Loose shape check: something before the `@`, a dotted domain after it.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(name, tld)| !name.is_empty() && tld.len() >= 2 && !tld.ends_with('.'))
}

/// GET /: login page, or straight to the feed when already signed in.
pub async fn index(maybe_user: MaybeUser) -> Response {
    if maybe_user.0.is_some() {
        return Redirect::to(HOME_LANDING).into_response();
    }
    Html(LoginTemplate {
        error: None,
        email: String::new(),
    })
    .into_response()
}

/// POST /login
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Response> {
    let email = form.email.trim();
    let record = {
        let conn = state.db.get()?;
        users::find_login(&conn, email)?
    };

    let verified = match &record {
        Some(record) => verify_off_runtime(&form.password, &record.password_hash).await?,
        None => false,
    };

    match record {
        Some(record) if verified => start_session(&state, record.id).await,
        _ => {
            tracing::info!(email, "Failed login attempt");
            Ok(Html(LoginTemplate {
                error: Some(INVALID_LOGIN.to_string()),
                email: email.to_string(),
            })
            .into_response())
        }
    }
}

pub async fn signup_page(maybe_user: MaybeUser) -> Response {
    if maybe_user.0.is_some() {
        return Redirect::to(HOME_LANDING).into_response();
    }
    Html(SignupTemplate {
        error: None,
        first_name: String::new(),
        last_name: String::new(),
        username: String::new(),
        email: String::new(),
    })
    .into_response()
}

/// POST /signup: create the account and sign it in.
pub async fn signup(State(state): State<AppState>, Form(form): Form<SignupForm>) -> AppResult<Response> {
    let first_name = form.first_name.trim();
    let last_name = form.last_name.trim();
    let username = form.username.trim();
    let email = form.email.trim();
    let avatar = Some(form.avatar.trim()).filter(|a| !a.is_empty());

    if [first_name, last_name, username, email].iter().any(|f| f.is_empty()) || form.password.is_empty() {
        return Ok(form.rerender("All fields are required"));
    }
    if !is_valid_email(email) {
        return Ok(form.rerender("Invalid email format"));
    }
    if form.password != form.confirm_password {
        return Ok(form.rerender("Passwords do not match"));
    }

    let role = if state.config.auth.admin_emails.iter().any(|e| e == email) {
        Role::Admin
    } else if state.config.auth.moderator_emails.iter().any(|e| e == email) {
        Role::Moderator
    } else {
        Role::User
    };
    let password_hash = hash_off_runtime(&form.password, state.config.auth.password_cost).await?;

    let registered = {
        let mut conn = state.db.get()?;
        users::register_user(
            &mut conn,
            &NewUser {
                first_name,
                last_name,
                username,
                email,
                password_hash: &password_hash,
                avatar,
                role,
            },
        )?
    };
    let user_id = match registered {
        Ok(id) => id,
        Err(conflict) => return Ok(form.rerender(conflict.message())),
    };

    tracing::info!(user_id, username, %role, "New account");
    start_session(&state, user_id).await
}

async fn start_session(state: &AppState, user_id: i64) -> AppResult<Response> {
    let issued = state.sessions.create(user_id).await?;
    let auth = &state.config.auth;
    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, HOME_LANDING.to_string()),
            (
                header::SET_COOKIE,
                session_cookie(&auth.cookie_name, &issued.token, auth.session_max_age_secs()),
            ),
        ],
    )
        .into_response())
}

/// GET /logout
pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    state.sessions.destroy(user.id).await?;
    tracing::info!(user_id = user.id, "Signed out");

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, clear_session_cookie(&state.config.auth.cookie_name)),
        ],
    )
        .into_response())
}
