use rusqlite::{params, Connection};

use crate::db::models::Report;

/// What a report points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSubject {
    Post(i64),
    Comment(i64),
}

pub fn file_report(
    conn: &Connection,
    subject: ReportSubject,
    reported_by: i64,
    reason: &str,
) -> rusqlite::Result<i64> {
    let (post_id, comment_id) = match subject {
        ReportSubject::Post(id) => (Some(id), None),
        ReportSubject::Comment(id) => (None, Some(id)),
    };
    conn.execute(
        "INSERT INTO reports (post_id, comment_id, reported_by, reason) VALUES (?1, ?2, ?3, ?4)",
        params![post_id, comment_id, reported_by, reason],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn all_reports(conn: &Connection) -> rusqlite::Result<Vec<Report>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.post_id, r.comment_id, r.reported_by, u.username, r.reason, r.created_at
         FROM reports r JOIN users u ON u.id = r.reported_by
         ORDER BY r.created_at DESC, r.id DESC",
    )?;
    let reports = stmt
        .query_map([], |row| {
            Ok(Report {
                id: row.get(0)?,
                post_id: row.get(1)?,
                comment_id: row.get(2)?,
                reported_by: row.get(3)?,
                reporter: row.get(4)?,
                reason: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(reports)
}

/// Resolving a report deletes it.
pub fn resolve_report(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM reports WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
