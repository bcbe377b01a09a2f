use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::marker::PhantomData;

use crate::auth::middleware::session_from_headers;
use crate::auth::role::Role;
use crate::auth::session::SessionUser;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub avatar: Option<String>,
}

impl From<SessionUser> for CurrentUser {
    fn from(user: SessionUser) -> Self {
        Self {
            id: user.user_id,
            username: user.username,
            role: user.role,
            avatar: user.avatar,
        }
    }
}

/// Extractor that requires authentication.
/// Behind `require_session` the user is already in the extensions; elsewhere
/// the cookie is validated here and a miss redirects to the login page.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        match session_from_headers(state, &parts.headers).await {
            Ok(Some(user)) => Ok(user.into()),
            Ok(None) => Err(AppError::Unauthenticated),
            Err(err) => Err(err.into()),
        }
    }
}

/// Optional user extractor: `None` instead of a redirect when not signed in.
/// A failing session store still surfaces as an error.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthenticated) => Ok(MaybeUser(None)),
            Err(err) => Err(err),
        }
    }
}

/// Marker naming the role a route demands.
pub trait RequiredRole {
    const ROLE: Role;
}

pub struct AdminOnly;

impl RequiredRole for AdminOnly {
    const ROLE: Role = Role::Admin;
}

pub struct ModeratorOnly;

impl RequiredRole for ModeratorOnly {
    const ROLE: Role = Role::Moderator;
}

/// A signed-in user whose freshly loaded role satisfies `R`. Anything else,
/// including a failed lookup, sends the caller back to `/home`.
pub struct Authorized<R> {
    pub user: CurrentUser,
    pub role: Role,
    _required: PhantomData<fn() -> R>,
}

impl<R: RequiredRole> FromRequestParts<AppState> for Authorized<R> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        match state.sessions.role_of(user.id).await {
            Ok(role) if role.satisfies(R::ROLE) => Ok(Authorized {
                user,
                role,
                _required: PhantomData,
            }),
            Ok(role) => {
                tracing::warn!(
                    user_id = user.id,
                    %role,
                    required = %R::ROLE,
                    "role check failed"
                );
                Err(AppError::Unauthorized)
            }
            Err(err) => {
                tracing::warn!(user_id = user.id, "role lookup failed: {}", err);
                Err(AppError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::{IssuedSession, SessionError, SessionStore};
    use crate::config::Config;
    use crate::db::test_pool;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::{IntoResponse, Response};
    use std::sync::Arc;

    /// Token "admin" is user 1 and "orphan" is user 2, whose role can no
    /// longer be loaded. "broken" fails inside the store.
    struct FakeStore;

    #[async_trait]
    impl SessionStore for FakeStore {
        async fn create(&self, _user_id: i64) -> Result<IssuedSession, SessionError> {
            unimplemented!()
        }

        async fn validate(&self, token: &str) -> Result<SessionUser, SessionError> {
            let user_id = match token {
                "admin" => 1,
                "orphan" => 2,
                "broken" => return Err(SessionError::Store("disk I/O error".into())),
                _ => return Err(SessionError::NotFound),
            };
            Ok(SessionUser {
                user_id,
                role: Role::Admin,
                username: format!("user{user_id}"),
                avatar: None,
            })
        }

        async fn destroy(&self, _user_id: i64) -> Result<(), SessionError> {
            Ok(())
        }

        async fn role_of(&self, user_id: i64) -> Result<Role, SessionError> {
            match user_id {
                1 => Ok(Role::Admin),
                _ => Err(SessionError::NotFound),
            }
        }

        async fn purge_expired(&self) -> Result<usize, SessionError> {
            Ok(0)
        }
    }

    fn state() -> AppState {
        AppState {
            db: test_pool(),
            config: Config::default(),
            sessions: Arc::new(FakeStore),
        }
    }

    fn parts_with_token(token: &str) -> Parts {
        let (parts, _) = Request::builder()
            .uri("/admin")
            .header(header::COOKIE, format!("session_token={token}"))
            .body(Body::empty())
            .unwrap()
            .into_parts();
        parts
    }

    async fn admin_gate(token: &str) -> Response {
        let mut parts = parts_with_token(token);
        match Authorized::<AdminOnly>::from_request_parts(&mut parts, &state()).await {
            Ok(admin) => admin.user.username.into_response(),
            Err(err) => err.into_response(),
        }
    }

    #[tokio::test]
    async fn admin_with_fresh_role_passes() {
        let resp = admin_gate("admin").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn failed_role_lookup_is_treated_as_mismatch() {
        let resp = admin_gate("orphan").await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/home");
    }

    #[tokio::test]
    async fn store_failure_is_internal_not_a_login_redirect() {
        let mut parts = parts_with_token("broken");
        let err = CurrentUser::from_request_parts(&mut parts, &state())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        let mut parts = parts_with_token("broken");
        assert!(MaybeUser::from_request_parts(&mut parts, &state()).await.is_err());
    }

    #[tokio::test]
    async fn unknown_token_is_an_anonymous_visitor() {
        let mut parts = parts_with_token("forged");
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &state()).await.unwrap();
        assert!(user.is_none());
    }
}
