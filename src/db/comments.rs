use rusqlite::{params, Connection, Row};

use crate::db::models::CommentView;

const COMMENT_SELECT: &str = "SELECT c.id, c.content, c.created_at, c.post_id, c.user_id,
        u.username, u.avatar,
        (SELECT COUNT(*) FROM comment_reactions r WHERE r.comment_id = c.id AND r.kind = 'like'),
        (SELECT COUNT(*) FROM comment_reactions r WHERE r.comment_id = c.id AND r.kind = 'dislike')
    FROM comments c
    JOIN users u ON u.id = c.user_id";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentView> {
    Ok(CommentView {
        id: row.get(0)?,
        content: row.get(1)?,
        created_at: row.get(2)?,
        post_id: row.get(3)?,
        user_id: row.get(4)?,
        username: row.get(5)?,
        avatar: row.get(6)?,
        likes: row.get(7)?,
        dislikes: row.get(8)?,
    })
}

pub fn add_comment(conn: &Connection, post_id: i64, user_id: i64, content: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO comments (content, post_id, user_id) VALUES (?1, ?2, ?3)",
        params![content, post_id, user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Comments of one post, oldest first.
pub fn comments_for_post(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<CommentView>> {
    let sql = format!("{COMMENT_SELECT} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let comments = stmt
        .query_map(params![post_id], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

/// Every comment, newest first, for the moderation console.
pub fn all_comments(conn: &Connection) -> rusqlite::Result<Vec<CommentView>> {
    let sql = format!("{COMMENT_SELECT} ORDER BY c.created_at DESC, c.id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let comments = stmt
        .query_map([], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

pub fn delete_comment(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
