use rusqlite::{params, Connection, TransactionBehavior};

use crate::db::models::UserSummary;
use crate::db::users::summary_from_row;

/// The two directed-edge tables between users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Follow,
    Friend,
}

impl Edge {
    fn delete_sql(self) -> &'static str {
        match self {
            Edge::Follow => "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
            Edge::Friend => "DELETE FROM friends WHERE user_id = ?1 AND friend_id = ?2",
        }
    }

    fn insert_sql(self) -> &'static str {
        match self {
            Edge::Follow => "INSERT INTO follows (follower_id, followed_id) VALUES (?1, ?2)",
            Edge::Friend => "INSERT INTO friends (user_id, friend_id) VALUES (?1, ?2)",
        }
    }

    fn exists_sql(self) -> &'static str {
        match self {
            Edge::Follow => {
                "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2)"
            }
            Edge::Friend => {
                "SELECT EXISTS(SELECT 1 FROM friends WHERE user_id = ?1 AND friend_id = ?2)"
            }
        }
    }
}

/// Flip the edge `from → to`. Returns whether the edge exists afterwards.
pub fn toggle(conn: &mut Connection, edge: Edge, from: i64, to: i64) -> rusqlite::Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let removed = tx.execute(edge.delete_sql(), params![from, to])?;
    let present = if removed == 0 {
        tx.execute(edge.insert_sql(), params![from, to])?;
        true
    } else {
        false
    };
    tx.commit()?;
    Ok(present)
}

pub fn has_edge(conn: &Connection, edge: Edge, from: i64, to: i64) -> rusqlite::Result<bool> {
    conn.query_row(edge.exists_sql(), params![from, to], |row| row.get(0))
}

fn list(conn: &Connection, sql: &str, user_id: i64) -> rusqlite::Result<Vec<UserSummary>> {
    let mut stmt = conn.prepare(sql)?;
    let users = stmt
        .query_map(params![user_id], summary_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn followers(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<UserSummary>> {
    list(
        conn,
        "SELECT u.id, u.username, u.first_name, u.last_name, u.avatar, u.role_id
         FROM follows f JOIN users u ON u.id = f.follower_id
         WHERE f.followed_id = ?1 ORDER BY u.username",
        user_id,
    )
}

pub fn following(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<UserSummary>> {
    list(
        conn,
        "SELECT u.id, u.username, u.first_name, u.last_name, u.avatar, u.role_id
         FROM follows f JOIN users u ON u.id = f.followed_id
         WHERE f.follower_id = ?1 ORDER BY u.username",
        user_id,
    )
}

pub fn friends(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<UserSummary>> {
    list(
        conn,
        "SELECT u.id, u.username, u.first_name, u.last_name, u.avatar, u.role_id
         FROM friends f JOIN users u ON u.id = f.friend_id
         WHERE f.user_id = ?1 ORDER BY u.username",
        user_id,
    )
}
