pub mod admin;
pub mod auth;
pub mod home;
pub mod moderator;
pub mod notifications;
pub mod posts;
pub mod profile;
pub mod search;
pub mod settings;

use std::time::Duration;

use askama::Template;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::require_session;
use crate::config::ServerConfig;
use crate::error::{error_page, AppError, AppResult};
use crate::state::AppState;

/// Where a fresh session lands.
pub const HOME_LANDING: &str = "/home?tab=posts&filter=all";

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

/// The whole HTTP surface. Pages that need a signed-in user sit behind
/// `require_session`; the rest resolve the user themselves if they care.
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth::session_router())
        .merge(posts::router())
        .merge(profile::router())
        .merge(settings::router())
        .merge(notifications::router())
        .merge(admin::router())
        .merge(moderator::router())
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let timeout = request_timeout(&state.config.server);

    Router::new()
        .merge(auth::router())
        .merge(home::router())
        .merge(search::router())
        .merge(protected)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Requests running past `request_timeout_secs` are answered with 408.
pub(crate) fn request_timeout(config: &ServerConfig) -> TimeoutLayer {
    let limit = Duration::from_secs(config.request_timeout_secs.max(1));
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, limit)
}

async fn not_found() -> AppError {
    AppError::NotFound
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Parse a numeric id from a query string or form field.
pub(crate) fn parse_id(raw: &str) -> AppResult<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::BadRequest("Missing id".into()));
    }
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid id: {raw}")))
}

/// First non-empty value submitted under `name`.
pub(crate) fn form_value<'a>(form: &'a [(String, String)], name: &str) -> Option<&'a str> {
    form.iter()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.trim())
        .find(|value| !value.is_empty())
}

/// Send the browser back where it came from when that is a page of this
/// site; otherwise to `fallback`.
pub(crate) fn redirect_back(headers: &HeaderMap, fallback: &str) -> Response {
    let target = same_site_referer(headers).unwrap_or_else(|| fallback.to_string());
    Redirect::to(&target).into_response()
}

fn same_site_referer(headers: &HeaderMap) -> Option<String> {
    let referer = headers.get(header::REFERER)?.to_str().ok()?;
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let rest = referer
        .strip_prefix("http://")
        .or_else(|| referer.strip_prefix("https://"))?;
    let (authority, path) = rest.split_at(rest.find('/')?);
    (authority == host).then(|| path.to_string())
}
