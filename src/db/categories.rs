use rusqlite::{params, Connection};

use crate::db::models::Category;

pub fn all_categories(conn: &Connection) -> rusqlite::Result<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name, description FROM categories ORDER BY name")?;
    let categories = stmt
        .query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn add_category(conn: &Connection, name: &str, description: Option<&str>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO categories (name, description) VALUES (?1, ?2)",
        params![name, description],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_category(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

pub fn count_categories(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
}

/// True when every id names an existing category.
pub fn all_exist(conn: &Connection, ids: &[i64]) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare("SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)")?;
    for id in ids {
        let found: bool = stmt.query_row(params![id], |row| row.get(0))?;
        if !found {
            return Ok(false);
        }
    }
    Ok(true)
}
