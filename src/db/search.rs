use rusqlite::{params, Connection};

use crate::db::models::SearchResult;

const SNIPPET_CHARS: usize = 100;

/// Escape LIKE wildcards so the query matches literally. Paired with
/// `ESCAPE '\'` in every statement below.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn snippet(content: &str) -> String {
    match content.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Users, then categories, then posts whose text contains `query`.
pub fn search(conn: &Connection, query: &str) -> rusqlite::Result<Vec<SearchResult>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let pattern = like_pattern(query);
    let mut results = Vec::new();

    let mut stmt = conn.prepare(
        "SELECT id, username, avatar FROM users
         WHERE username LIKE ?1 ESCAPE '\\'
            OR first_name LIKE ?1 ESCAPE '\\'
            OR last_name LIKE ?1 ESCAPE '\\'
         ORDER BY username",
    )?;
    let users = stmt.query_map(params![pattern], |row| {
        Ok(SearchResult {
            kind: "user",
            id: row.get(0)?,
            name: row.get(1)?,
            avatar: row.get(2)?,
            content: None,
        })
    })?;
    for user in users {
        results.push(user?);
    }

    let mut stmt = conn.prepare(
        "SELECT id, name FROM categories WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name",
    )?;
    let categories = stmt.query_map(params![pattern], |row| {
        Ok(SearchResult {
            kind: "category",
            id: row.get(0)?,
            name: row.get(1)?,
            avatar: None,
            content: None,
        })
    })?;
    for category in categories {
        results.push(category?);
    }

    let mut stmt = conn.prepare(
        "SELECT p.id, u.username, u.avatar, p.content
         FROM posts p JOIN users u ON u.id = p.user_id
         WHERE p.content LIKE ?1 ESCAPE '\\'
         ORDER BY p.created_at DESC, p.id DESC",
    )?;
    let posts = stmt.query_map(params![pattern], |row| {
        let content: String = row.get(3)?;
        Ok(SearchResult {
            kind: "post",
            id: row.get(0)?,
            name: row.get(1)?,
            avatar: row.get(2)?,
            content: Some(snippet(&content)),
        })
    })?;
    for post in posts {
        results.push(post?);
    }

    Ok(results)
}
