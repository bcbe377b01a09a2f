use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::models::PostView;

const POST_SELECT: &str = "SELECT p.id, p.image, p.content, p.created_at, p.user_id,
        u.username, u.first_name, u.last_name, u.avatar,
        (SELECT COUNT(*) FROM post_reactions r WHERE r.post_id = p.id AND r.kind = 'like') AS likes,
        (SELECT COUNT(*) FROM post_reactions r WHERE r.post_id = p.id AND r.kind = 'dislike') AS dislikes,
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.user_id";

/// Which posts a feed shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    All,
    Category(String),
    AuthoredBy(i64),
    RepliedBy(i64),
    ReactedBy(i64),
}

impl FeedScope {
    fn clause(&self) -> (&'static str, Option<Value>) {
        match self {
            FeedScope::All => ("", None),
            FeedScope::Category(name) => (
                "WHERE p.id IN (SELECT pc.post_id FROM post_categories pc
                    JOIN categories c ON c.id = pc.category_id WHERE c.name = ?1)",
                Some(Value::Text(name.clone())),
            ),
            FeedScope::AuthoredBy(id) => ("WHERE p.user_id = ?1", Some(Value::Integer(*id))),
            FeedScope::RepliedBy(id) => (
                "WHERE p.id IN (SELECT post_id FROM comments WHERE user_id = ?1)",
                Some(Value::Integer(*id)),
            ),
            FeedScope::ReactedBy(id) => (
                "WHERE p.id IN (SELECT post_id FROM post_reactions WHERE user_id = ?1)",
                Some(Value::Integer(*id)),
            ),
        }
    }
}

/// Feed ordering, selected by the `filter` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrder {
    Newest,
    Oldest,
    MostLiked,
    MostDisliked,
    MostCommented,
}

impl FeedOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" | "newest" => Some(FeedOrder::Newest),
            "oldest" => Some(FeedOrder::Oldest),
            "likes" => Some(FeedOrder::MostLiked),
            "dislikes" => Some(FeedOrder::MostDisliked),
            "comments" => Some(FeedOrder::MostCommented),
            _ => None,
        }
    }

    fn clause(self) -> &'static str {
        match self {
            FeedOrder::Newest => "ORDER BY p.created_at DESC, p.id DESC",
            FeedOrder::Oldest => "ORDER BY p.created_at ASC, p.id ASC",
            FeedOrder::MostLiked => "ORDER BY likes DESC, p.id DESC",
            FeedOrder::MostDisliked => "ORDER BY dislikes DESC, p.id DESC",
            FeedOrder::MostCommented => "ORDER BY comment_count DESC, p.id DESC",
        }
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    Ok(PostView {
        id: row.get(0)?,
        image: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        user_id: row.get(4)?,
        username: row.get(5)?,
        first_name: row.get(6)?,
        last_name: row.get(7)?,
        avatar: row.get(8)?,
        likes: row.get(9)?,
        dislikes: row.get(10)?,
        comments: row.get(11)?,
    })
}

pub fn list_feed(conn: &Connection, scope: &FeedScope, order: FeedOrder) -> rusqlite::Result<Vec<PostView>> {
    let (filter, param) = scope.clause();
    let sql = format!("{POST_SELECT} {filter} {}", order.clause());
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params_from_iter(param), post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn get_post(conn: &Connection, id: i64) -> rusqlite::Result<Option<PostView>> {
    let sql = format!("{POST_SELECT} WHERE p.id = ?1");
    conn.query_row(&sql, params![id], post_from_row).optional()
}

/// Insert a post and its category links atomically.
pub fn insert_post(
    conn: &mut Connection,
    user_id: i64,
    content: &str,
    image: Option<&str>,
    category_ids: &[i64],
) -> rusqlite::Result<i64> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO posts (image, content, user_id) VALUES (?1, ?2, ?3)",
        params![image, content, user_id],
    )?;
    let post_id = tx.last_insert_rowid();
    {
        let mut link = tx.prepare(
            "INSERT OR IGNORE INTO post_categories (post_id, category_id) VALUES (?1, ?2)",
        )?;
        for category_id in category_ids {
            link.execute(params![post_id, category_id])?;
        }
    }
    tx.commit()?;
    Ok(post_id)
}

pub fn delete_post(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

pub fn count_posts(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
}
