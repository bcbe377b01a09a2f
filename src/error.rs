use askama::Template;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

use crate::auth::session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No usable session. Sends the browser to the login page.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Signed in, but the role does not reach the route. Sends the user home.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Password hashing error: {0}")]
    Password(#[from] bcrypt::BcryptError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A missing or expired session is a login problem; a broken store is ours.
impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Store(e) => AppError::Internal(format!("Session store: {e}")),
            SessionError::NotFound | SessionError::Expired => AppError::Unauthenticated,
        }
    }
}

#[derive(Template)]
#[template(path = "pages/error.html")]
pub struct ErrorTemplate {
    pub code: u16,
    pub message: String,
}

/// Themed error page. Falls back to plain text if the template itself fails.
pub fn error_page(status: StatusCode, message: impl Into<String>) -> Response {
    let page = ErrorTemplate {
        code: status.as_u16(),
        message: message.into(),
    };
    match page.render() {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error page render failed: {}", e);
            (status, page.message).into_response()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthenticated => return Redirect::to("/").into_response(),
            AppError::Unauthorized => return Redirect::to("/home").into_response(),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Page not found".to_string()),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Password(_)
            | AppError::Template(_)
            | AppError::Task(_)
            | AppError::Internal(_) => {
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        error_page(status, message)
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn response_status(err: AppError) -> StatusCode {
        let response = err.into_response();
        response.status()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(response_status(AppError::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn method_not_allowed_returns_405() {
        assert_eq!(
            response_status(AppError::MethodNotAllowed),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn bad_request_returns_400() {
        assert_eq!(
            response_status(AppError::BadRequest("oops".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn unauthenticated_redirects_to_login() {
        let response = AppError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
    }

    #[test]
    fn unauthorized_redirects_home() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/home");
    }

    #[test]
    fn expired_session_maps_to_login_redirect() {
        assert!(matches!(
            AppError::from(SessionError::Expired),
            AppError::Unauthenticated
        ));
    }

    #[tokio::test]
    async fn internal_returns_500_without_leaking_cause() {
        let response = AppError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert!(body.contains("500"));
        assert!(!body.contains("secret detail"));
    }

    #[tokio::test]
    async fn error_page_carries_code_and_message() {
        let body = body_text(AppError::BadRequest("Missing title".into()).into_response()).await;
        assert!(body.contains("400"));
        assert!(body.contains("Missing title"));
    }

    #[tokio::test]
    async fn panicked_background_task_is_a_500() {
        let join_err = tokio::spawn(async { panic!("hash worker died") })
            .await
            .unwrap_err();
        assert_eq!(
            response_status(AppError::from(join_err)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
