use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};
use thiserror::Error;

use crate::auth::role::Role;
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session for token")]
    NotFound,

    #[error("session expired")]
    Expired,

    #[error("session store unavailable: {0}")]
    Store(Box<dyn std::error::Error + Send + Sync>),
}

impl From<rusqlite::Error> for SessionError {
    fn from(err: rusqlite::Error) -> Self {
        SessionError::Store(Box::new(err))
    }
}

impl From<r2d2::Error> for SessionError {
    fn from(err: r2d2::Error) -> Self {
        SessionError::Store(Box::new(err))
    }
}

impl From<chrono::ParseError> for SessionError {
    fn from(err: chrono::ParseError) -> Self {
        SessionError::Store(Box::new(err))
    }
}

/// What a valid token resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub user_id: i64,
    pub role: Role,
    pub username: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues, checks and revokes the bearer tokens carried in the session cookie.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a session for `user_id`, replacing any session it already had.
    async fn create(&self, user_id: i64) -> Result<IssuedSession, SessionError>;

    /// Resolve a token. Expired rows are deleted on sight.
    async fn validate(&self, token: &str) -> Result<SessionUser, SessionError>;

    /// End the user's session. Succeeds when there is none.
    async fn destroy(&self, user_id: i64) -> Result<(), SessionError>;

    /// The user's current role, read fresh from storage.
    async fn role_of(&self, user_id: i64) -> Result<Role, SessionError>;

    /// Delete every expired session (returns count deleted).
    async fn purge_expired(&self) -> Result<usize, SessionError>;
}

pub struct SqliteSessionStore {
    pool: DbPool,
    ttl: Duration,
}

impl SqliteSessionStore {
    pub fn new(pool: DbPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }
}

/// Fixed-width UTC form, so stored timestamps order the same as strings.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, user_id: i64) -> Result<IssuedSession, SessionError> {
        let mut conn = self.pool.get()?;
        let token = generate_token();
        let expires_at = Utc::now() + self.ttl;

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
               token = excluded.token,
               expires_at = excluded.expires_at,
               created_at = datetime('now')",
            params![token, user_id, timestamp(expires_at)],
        )?;
        tx.commit()?;

        tracing::debug!(user_id, "session created");
        Ok(IssuedSession { token, expires_at })
    }

    async fn validate(&self, token: &str) -> Result<SessionUser, SessionError> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                "SELECT s.expires_at, u.id, u.role_id, u.username, u.avatar
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?1",
                params![token],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        SessionUser {
                            user_id: row.get(1)?,
                            role: row.get(2)?,
                            username: row.get(3)?,
                            avatar: row.get(4)?,
                        },
                    ))
                },
            )
            .optional()?;

        let (expires_at, user) = row.ok_or(SessionError::NotFound)?;
        let expires_at = DateTime::parse_from_rfc3339(&expires_at)?;
        if expires_at <= Utc::now() {
            conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            tracing::info!(user_id = user.user_id, "session expired");
            return Err(SessionError::Expired);
        }

        Ok(user)
    }

    async fn destroy(&self, user_id: i64) -> Result<(), SessionError> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }

    async fn role_of(&self, user_id: i64) -> Result<Role, SessionError> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT role_id FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(SessionError::NotFound)
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        let conn = self.pool.get()?;
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![timestamp(Utc::now())],
        )?;
        Ok(deleted)
    }
}

/// Generate a cryptographically random 32-byte hex token.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_test_user, test_pool};

    fn session_rows(pool: &DbPool, user_id: i64) -> i64 {
        pool.get()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM sessions WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[tokio::test]
    async fn create_keeps_a_single_session_per_user() {
        let pool = test_pool();
        let user = insert_test_user(&pool.get().unwrap(), "alice", 3);
        let store = SqliteSessionStore::new(pool.clone(), Duration::hours(1));

        let first = store.create(user).await.unwrap();
        let second = store.create(user).await.unwrap();

        assert_eq!(session_rows(&pool, user), 1);
        assert!(matches!(
            store.validate(&first.token).await,
            Err(SessionError::NotFound)
        ));
        let resolved = store.validate(&second.token).await.unwrap();
        assert_eq!(resolved.user_id, user);
        assert_eq!(resolved.username, "alice");
        assert_eq!(resolved.role, Role::User);
    }

    #[tokio::test]
    async fn expired_token_is_rejected_and_removed() {
        let pool = test_pool();
        let user = insert_test_user(&pool.get().unwrap(), "alice", 3);
        let store = SqliteSessionStore::new(pool.clone(), Duration::minutes(-1));

        let issued = store.create(user).await.unwrap();
        assert!(matches!(
            store.validate(&issued.token).await,
            Err(SessionError::Expired)
        ));
        assert_eq!(session_rows(&pool, user), 0);
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let pool = test_pool();
        let user = insert_test_user(&pool.get().unwrap(), "alice", 3);
        let store = SqliteSessionStore::new(pool.clone(), Duration::hours(1));

        let issued = store.create(user).await.unwrap();
        store.destroy(user).await.unwrap();
        store.destroy(user).await.unwrap();
        assert!(matches!(
            store.validate(&issued.token).await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn purge_removes_only_expired_rows() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let stale = insert_test_user(&conn, "stale", 3);
        let fresh = insert_test_user(&conn, "fresh", 3);
        drop(conn);

        SqliteSessionStore::new(pool.clone(), Duration::minutes(-5))
            .create(stale)
            .await
            .unwrap();
        let store = SqliteSessionStore::new(pool.clone(), Duration::hours(1));
        store.create(fresh).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(session_rows(&pool, stale), 0);
        assert_eq!(session_rows(&pool, fresh), 1);
    }

    #[tokio::test]
    async fn role_of_reads_current_role() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = insert_test_user(&conn, "mod", 2);
        drop(conn);
        let store = SqliteSessionStore::new(pool, Duration::hours(1));

        assert_eq!(store.role_of(user).await.unwrap(), Role::Moderator);
        assert!(matches!(store.role_of(999).await, Err(SessionError::NotFound)));
    }
}
