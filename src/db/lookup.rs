//! Single-column lookups over a closed set of (table, column) pairs.
//!
//! Every statement is a `&'static str` picked by a `match`, so no caller
//! value can ever reach the SQL text; the looked-up key is always bound.

use rusqlite::types::FromSql;
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    UsernameByUserId,
    PasswordHashByUserId,
    PostOwnerByPostId,
    CommentPostByCommentId,
}

impl Lookup {
    pub fn sql(self) -> &'static str {
        match self {
            Lookup::UsernameByUserId => "SELECT username FROM users WHERE id = ?1",
            Lookup::PasswordHashByUserId => "SELECT password_hash FROM users WHERE id = ?1",
            Lookup::PostOwnerByPostId => "SELECT user_id FROM posts WHERE id = ?1",
            Lookup::CommentPostByCommentId => "SELECT post_id FROM comments WHERE id = ?1",
        }
    }
}

/// Run a lookup; `Ok(None)` when no row matches.
pub fn select_one<K, T>(conn: &Connection, lookup: Lookup, key: K) -> rusqlite::Result<Option<T>>
where
    K: rusqlite::ToSql,
    T: FromSql,
{
    conn.query_row(lookup.sql(), params![key], |row| row.get(0))
        .optional()
}

pub fn exists<K: rusqlite::ToSql>(conn: &Connection, lookup: Lookup, key: K) -> rusqlite::Result<bool> {
    let found: Option<rusqlite::types::Value> = select_one(conn, lookup, key)?;
    Ok(found.is_some())
}
