use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::cookie::{clear_session_cookie, get_cookie_value};
use crate::auth::session::{SessionError, SessionUser};
use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::state::AppState;

/// Look up the session named by the request's cookie. A missing cookie is
/// reported as `Ok(None)` so callers can tell it apart from a bad token.
pub async fn session_from_headers(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<SessionUser>, SessionError> {
    let Some(token) = get_cookie_value(headers, &state.config.auth.cookie_name) else {
        return Ok(None);
    };
    state.sessions.validate(token).await.map(Some)
}

/// Gate for every signed-in route. Validates the cookie on each request and
/// hands the handler a `CurrentUser` through the request extensions.
pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match session_from_headers(&state, req.headers()).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(CurrentUser::from(user));
            next.run(req).await
        }
        Ok(None) => redirect_to_login(None),
        Err(err @ SessionError::Store(_)) => AppError::from(err).into_response(),
        Err(err) => {
            tracing::debug!(path = %req.uri().path(), "rejected session: {}", err);
            redirect_to_login(Some(clear_session_cookie(&state.config.auth.cookie_name)))
        }
    }
}

fn redirect_to_login(clear_cookie: Option<String>) -> Response {
    match clear_cookie {
        Some(cookie) => (
            StatusCode::SEE_OTHER,
            [(header::LOCATION, "/".to_string()), (header::SET_COOKIE, cookie)],
        )
            .into_response(),
        None => (StatusCode::SEE_OTHER, [(header::LOCATION, "/")]).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::role::Role;
    use crate::auth::session::{IssuedSession, SessionStore};
    use crate::config::Config;
    use crate::db::test_pool;
    use async_trait::async_trait;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Extension, Router};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Knows one token; "stale" has expired, "broken" hits a failing store and
    /// everything else is missing.
    struct FakeStore;

    #[async_trait]
    impl SessionStore for FakeStore {
        async fn create(&self, _user_id: i64) -> Result<IssuedSession, SessionError> {
            unimplemented!()
        }

        async fn validate(&self, token: &str) -> Result<SessionUser, SessionError> {
            match token {
                "good" => Ok(SessionUser {
                    user_id: 7,
                    role: Role::User,
                    username: "alice".into(),
                    avatar: None,
                }),
                "stale" => Err(SessionError::Expired),
                "broken" => Err(SessionError::Store("disk I/O error".into())),
                _ => Err(SessionError::NotFound),
            }
        }

        async fn destroy(&self, _user_id: i64) -> Result<(), SessionError> {
            Ok(())
        }

        async fn role_of(&self, _user_id: i64) -> Result<Role, SessionError> {
            Ok(Role::User)
        }

        async fn purge_expired(&self) -> Result<usize, SessionError> {
            Ok(0)
        }
    }

    fn app() -> Router {
        let state = AppState {
            db: test_pool(),
            config: Config::default(),
            sessions: Arc::new(FakeStore),
        };
        Router::new()
            .route(
                "/private",
                get(|Extension(user): Extension<CurrentUser>| async move { user.username }),
            )
            .route_layer(from_fn_with_state(state.clone(), require_session))
            .with_state(state)
    }

    async fn get_with_cookie(cookie: Option<&str>) -> Response {
        let mut req = Request::builder().uri("/private");
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        app().oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let resp = get_with_cookie(Some("session_token=good")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_cookie_redirects_without_clearing() {
        let resp = get_with_cookie(None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/");
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn expired_token_redirects_and_clears_cookie() {
        let resp = get_with_cookie(Some("session_token=stale")).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/");
        let cleared = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cleared.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn unknown_token_redirects() {
        let resp = get_with_cookie(Some("session_token=forged")).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn store_failure_is_a_server_error_and_keeps_the_cookie() {
        let resp = get_with_cookie(Some("session_token=broken")).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
        assert!(resp.headers().get(header::LOCATION).is_none());
    }
}
