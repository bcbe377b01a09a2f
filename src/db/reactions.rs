//! Like/dislike toggles for posts and comments.
//!
//! A (target, user) pair holds at most one reaction row, so like and dislike
//! are mutually exclusive. Each toggle reads the current state, flips it and
//! recounts inside one IMMEDIATE transaction: a double submit from the same
//! user serializes instead of losing an update.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "like" => Some(ReactionKind::Like),
            "dislike" => Some(ReactionKind::Dislike),
            _ => None,
        }
    }
}

/// What is being reacted to. Picks the table; never caller-supplied text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTarget {
    Post(i64),
    Comment(i64),
}

impl ReactionTarget {
    fn id(self) -> i64 {
        match self {
            ReactionTarget::Post(id) | ReactionTarget::Comment(id) => id,
        }
    }

    fn select_sql(self) -> &'static str {
        match self {
            ReactionTarget::Post(_) => {
                "SELECT kind FROM post_reactions WHERE post_id = ?1 AND user_id = ?2"
            }
            ReactionTarget::Comment(_) => {
                "SELECT kind FROM comment_reactions WHERE comment_id = ?1 AND user_id = ?2"
            }
        }
    }

    fn delete_sql(self) -> &'static str {
        match self {
            ReactionTarget::Post(_) => "DELETE FROM post_reactions WHERE post_id = ?1 AND user_id = ?2",
            ReactionTarget::Comment(_) => {
                "DELETE FROM comment_reactions WHERE comment_id = ?1 AND user_id = ?2"
            }
        }
    }

    fn upsert_sql(self) -> &'static str {
        match self {
            ReactionTarget::Post(_) => {
                "INSERT INTO post_reactions (post_id, user_id, kind) VALUES (?1, ?2, ?3)
                 ON CONFLICT(post_id, user_id) DO UPDATE SET kind = excluded.kind,
                    created_at = datetime('now')"
            }
            ReactionTarget::Comment(_) => {
                "INSERT INTO comment_reactions (comment_id, user_id, kind) VALUES (?1, ?2, ?3)
                 ON CONFLICT(comment_id, user_id) DO UPDATE SET kind = excluded.kind,
                    created_at = datetime('now')"
            }
        }
    }

    fn count_sql(self) -> &'static str {
        match self {
            ReactionTarget::Post(_) => {
                "SELECT
                    COALESCE(SUM(kind = 'like'), 0),
                    COALESCE(SUM(kind = 'dislike'), 0)
                 FROM post_reactions WHERE post_id = ?1"
            }
            ReactionTarget::Comment(_) => {
                "SELECT
                    COALESCE(SUM(kind = 'like'), 0),
                    COALESCE(SUM(kind = 'dislike'), 0)
                 FROM comment_reactions WHERE comment_id = ?1"
            }
        }
    }
}

/// State after a toggle: the caller's reaction and the fresh totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReactionOutcome {
    pub state: Option<ReactionKind>,
    pub likes: i64,
    pub dislikes: i64,
}

pub fn toggle_like(conn: &mut Connection, target: ReactionTarget, user_id: i64) -> rusqlite::Result<ReactionOutcome> {
    toggle(conn, target, user_id, ReactionKind::Like)
}

pub fn toggle_dislike(
    conn: &mut Connection,
    target: ReactionTarget,
    user_id: i64,
) -> rusqlite::Result<ReactionOutcome> {
    toggle(conn, target, user_id, ReactionKind::Dislike)
}

/// Same kind again removes the reaction; the other kind (or none) sets it.
fn toggle(
    conn: &mut Connection,
    target: ReactionTarget,
    user_id: i64,
    kind: ReactionKind,
) -> rusqlite::Result<ReactionOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current: Option<String> = tx
        .query_row(target.select_sql(), params![target.id(), user_id], |row| row.get(0))
        .optional()?;
    let current = current.as_deref().and_then(ReactionKind::parse);

    let state = if current == Some(kind) {
        tx.execute(target.delete_sql(), params![target.id(), user_id])?;
        None
    } else {
        tx.execute(target.upsert_sql(), params![target.id(), user_id, kind.as_str()])?;
        Some(kind)
    };

    let (likes, dislikes) = tx.query_row(target.count_sql(), params![target.id()], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })?;
    tx.commit()?;

    Ok(ReactionOutcome {
        state,
        likes,
        dislikes,
    })
}

pub fn reaction_of(conn: &Connection, target: ReactionTarget, user_id: i64) -> rusqlite::Result<Option<ReactionKind>> {
    let current: Option<String> = conn
        .query_row(target.select_sql(), params![target.id(), user_id], |row| row.get(0))
        .optional()?;
    Ok(current.as_deref().and_then(ReactionKind::parse))
}
