#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use connecthub::auth::password::hash_password;
use connecthub::auth::{Role, SessionStore, SqliteSessionStore};
use connecthub::config::Config;
use connecthub::db::{self, users};
use connecthub::routes;
use connecthub::state::{AppState, DbPool};

pub const TEST_COST: u32 = 4;

/// A full router over a throwaway database.
pub struct TestApp {
    _dir: TempDir,
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.auth.password_cost = TEST_COST;
        config.database.pool_size = 4;
        tweak(&mut config);

        let pool = db::create_pool(&dir.path().join("forum.db"), &config.database)
            .expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let sessions: Arc<dyn SessionStore> =
            Arc::new(SqliteSessionStore::new(pool.clone(), config.auth.session_ttl()));
        let state = AppState {
            db: pool,
            config,
            sessions,
        };
        let router = routes::app(state.clone());

        Self {
            _dir: dir,
            state,
            router,
        }
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub fn seed_user(&self, username: &str, email: &str, password: &str, role: Role) -> i64 {
        let hash = hash_password(password, TEST_COST).unwrap();
        let conn = self.db().get().unwrap();
        users::create_user(
            &conn,
            &users::NewUser {
                first_name: "Test",
                last_name: "User",
                username,
                email,
                password_hash: &hash,
                avatar: None,
                role,
            },
        )
        .unwrap()
    }

    /// Cookie header value for a fresh session of `user_id`.
    pub async fn cookie_for(&self, user_id: i64) -> String {
        let issued = self.state.sessions.create(user_id).await.unwrap();
        format!("session_token={}", issued.token)
    }

    pub fn count(&self, sql: &str) -> i64 {
        self.db()
            .get()
            .unwrap()
            .query_row(sql, [], |row| row.get(0))
            .unwrap()
    }

    pub fn insert_post(&self, user_id: i64, content: &str) -> i64 {
        let conn = self.db().get().unwrap();
        conn.execute(
            "INSERT INTO posts (content, user_id) VALUES (?1, ?2)",
            rusqlite::params![content, user_id],
        )
        .unwrap();
        conn.last_insert_rowid()
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_string(resp: Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(resp: &Response) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub fn set_cookie(resp: &Response) -> Option<&str> {
    resp.headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
}
