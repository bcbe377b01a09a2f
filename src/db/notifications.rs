use rusqlite::{params, Connection};

use crate::db::models::Notification;

pub fn notify(conn: &Connection, user_id: i64, post_id: Option<i64>, message: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO notifications (user_id, post_id, message) VALUES (?1, ?2, ?3)",
        params![user_id, post_id, message],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent first; `limit` of `None` returns the whole feed.
pub fn latest(conn: &Connection, user_id: i64, limit: Option<u32>) -> rusqlite::Result<Vec<Notification>> {
    let limit = limit.map(i64::from).unwrap_or(-1);
    let mut stmt = conn.prepare(
        "SELECT id, user_id, post_id, message, created_at FROM notifications
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;
    let notifications = stmt
        .query_map(params![user_id, limit], |row| {
            Ok(Notification {
                id: row.get(0)?,
                user_id: row.get(1)?,
                post_id: row.get(2)?,
                message: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(notifications)
}
