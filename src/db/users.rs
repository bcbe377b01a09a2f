use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};

use crate::auth::role::Role;
use crate::db::models::{User, UserSummary};

pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub avatar: Option<&'a str>,
    pub role: Role,
}

pub struct ProfileUpdate<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub avatar: Option<&'a str>,
}

/// Credentials row used by the login handler.
pub struct LoginRecord {
    pub id: i64,
    pub password_hash: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UserStats {
    pub posts: i64,
    pub likes_given: i64,
    pub followers: i64,
    pub following: i64,
    pub friends: i64,
}

/// Which unique column a signup or profile edit collides with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Username,
    Email,
}

impl Conflict {
    pub fn message(self) -> &'static str {
        match self {
            Conflict::Username => "Username already exists",
            Conflict::Email => "Email already exists",
        }
    }
}

const USER_COLUMNS: &str = "u.id, u.first_name, u.last_name, u.username, u.email, u.avatar, \
                            u.role_id, s.token, u.created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        username: row.get(3)?,
        email: row.get(4)?,
        avatar: row.get(5)?,
        role: row.get(6)?,
        current_session: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        avatar: row.get(4)?,
        role: row.get(5)?,
    })
}

pub fn create_user(conn: &Connection, user: &NewUser<'_>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (first_name, last_name, username, email, password_hash, avatar, role_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.first_name,
            user.last_name,
            user.username,
            user.email,
            user.password_hash,
            user.avatar,
            user.role,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u LEFT JOIN sessions s ON s.user_id = u.id WHERE u.id = ?1"
    );
    conn.query_row(&sql, params![id], user_from_row).optional()
}

pub fn find_login(conn: &Connection, email: &str) -> rusqlite::Result<Option<LoginRecord>> {
    conn.query_row(
        "SELECT id, password_hash FROM users WHERE email = ?1",
        params![email],
        |row| {
            Ok(LoginRecord {
                id: row.get(0)?,
                password_hash: row.get(1)?,
            })
        },
    )
    .optional()
}

/// First unique column already taken by someone other than `except`.
pub fn find_conflict(
    conn: &Connection,
    username: &str,
    email: &str,
    except: Option<i64>,
) -> rusqlite::Result<Option<Conflict>> {
    let except = except.unwrap_or(-1);
    let username_taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id <> ?2)",
        params![username, except],
        |row| row.get(0),
    )?;
    if username_taken {
        return Ok(Some(Conflict::Username));
    }
    let email_taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND id <> ?2)",
        params![email, except],
        |row| row.get(0),
    )?;
    Ok(email_taken.then_some(Conflict::Email))
}

pub fn list_users(conn: &Connection) -> rusqlite::Result<Vec<UserSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, first_name, last_name, avatar, role_id FROM users ORDER BY username",
    )?;
    let users = stmt
        .query_map([], summary_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn count_users(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

pub fn update_profile(conn: &Connection, id: i64, update: &ProfileUpdate<'_>) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, username = ?3, email = ?4, avatar = ?5
         WHERE id = ?6",
        params![
            update.first_name,
            update.last_name,
            update.username,
            update.email,
            update.avatar,
            id,
        ],
    )?;
    Ok(changed > 0)
}

/// Maps a UNIQUE violation on `users` back to the column it names.
pub fn unique_conflict(err: &rusqlite::Error) -> Option<Conflict> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) if e.code == ErrorCode::ConstraintViolation => {
            if msg.contains("users.username") {
                Some(Conflict::Username)
            } else if msg.contains("users.email") {
                Some(Conflict::Email)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Check uniqueness and insert under one write lock. A racing signup waits
/// for the lock and then sees the winner's row as a conflict.
pub fn register_user(conn: &mut Connection, user: &NewUser<'_>) -> rusqlite::Result<Result<i64, Conflict>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if let Some(conflict) = find_conflict(&tx, user.username, user.email, None)? {
        return Ok(Err(conflict));
    }
    let id = match create_user(&tx, user) {
        Ok(id) => id,
        Err(err) => return unique_conflict(&err).map(Err).ok_or(err),
    };
    tx.commit()?;
    Ok(Ok(id))
}

/// Profile edit with the same locking as `register_user`.
pub fn edit_profile(
    conn: &mut Connection,
    id: i64,
    update: &ProfileUpdate<'_>,
) -> rusqlite::Result<Result<(), Conflict>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if let Some(conflict) = find_conflict(&tx, update.username, update.email, Some(id))? {
        return Ok(Err(conflict));
    }
    if let Err(err) = update_profile(&tx, id, update) {
        return unique_conflict(&err).map(Err).ok_or(err);
    }
    tx.commit()?;
    Ok(Ok(()))
}

pub fn update_password(conn: &Connection, id: i64, password_hash: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, id],
    )?;
    Ok(changed > 0)
}

pub fn update_role(conn: &Connection, id: i64, role: Role) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET role_id = ?1 WHERE id = ?2",
        params![role, id],
    )?;
    Ok(changed > 0)
}

/// Removes the account; sessions, posts, comments, reactions and edges
/// cascade with it.
pub fn delete_user(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

pub fn user_stats(conn: &Connection, id: i64) -> rusqlite::Result<UserStats> {
    conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM posts WHERE user_id = ?1),
            (SELECT COUNT(*) FROM post_reactions WHERE user_id = ?1 AND kind = 'like'),
            (SELECT COUNT(*) FROM follows WHERE followed_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
            (SELECT COUNT(*) FROM friends WHERE user_id = ?1)",
        params![id],
        |row| {
            Ok(UserStats {
                posts: row.get(0)?,
                likes_given: row.get(1)?,
                followers: row.get(2)?,
                following: row.get(3)?,
                friends: row.get(4)?,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{create_pool, run_migrations, test_pool};
    use std::time::Duration;

    fn new_user<'a>(username: &'a str, email: &'a str) -> NewUser<'a> {
        NewUser {
            first_name: "Ada",
            last_name: "Lovelace",
            username,
            email,
            password_hash: "hash",
            avatar: None,
            role: Role::User,
        }
    }

    #[test]
    fn create_and_fetch_user() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();

        let user = get_user(&conn, id).unwrap().unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.full_name(), "Ada Lovelace");
        assert!(user.current_session.is_none());

        let login = find_login(&conn, "ada@example.com").unwrap().unwrap();
        assert_eq!(login.id, id);
        assert_eq!(login.password_hash, "hash");
        assert!(find_login(&conn, "nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn conflicts_name_the_taken_column() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();

        assert_eq!(
            find_conflict(&conn, "ada", "new@example.com", None).unwrap(),
            Some(Conflict::Username)
        );
        assert_eq!(
            find_conflict(&conn, "grace", "ada@example.com", None).unwrap(),
            Some(Conflict::Email)
        );
        assert_eq!(find_conflict(&conn, "grace", "grace@example.com", None).unwrap(), None);
        // A user never conflicts with their own row.
        assert_eq!(find_conflict(&conn, "ada", "ada@example.com", Some(id)).unwrap(), None);
    }

    #[test]
    fn role_and_password_updates() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();

        assert!(update_role(&conn, id, Role::Moderator).unwrap());
        assert!(update_password(&conn, id, "new-hash").unwrap());
        let user = get_user(&conn, id).unwrap().unwrap();
        assert_eq!(user.role, Role::Moderator);
        assert_eq!(find_login(&conn, "ada@example.com").unwrap().unwrap().password_hash, "new-hash");

        assert!(!update_role(&conn, 999, Role::Admin).unwrap());
    }

    #[test]
    fn delete_user_cascades_posts() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();
        conn.execute("INSERT INTO posts (content, user_id) VALUES ('hi', ?1)", params![id])
            .unwrap();

        assert!(delete_user(&conn, id).unwrap());
        let posts: i64 = conn
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(posts, 0);
        assert_eq!(count_users(&conn).unwrap(), 0);
    }

    #[test]
    fn register_user_reports_conflicts_without_writing() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let id = register_user(&mut conn, &new_user("ada", "ada@example.com"))
            .unwrap()
            .unwrap();
        assert!(id > 0);

        let dup = register_user(&mut conn, &new_user("grace", "ada@example.com")).unwrap();
        assert_eq!(dup, Err(Conflict::Email));
        assert_eq!(count_users(&conn).unwrap(), 1);
    }

    #[test]
    fn unique_violations_map_to_their_column() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();

        let err = create_user(&conn, &new_user("ada", "other@example.com")).unwrap_err();
        assert_eq!(unique_conflict(&err), Some(Conflict::Username));
        let err = create_user(&conn, &new_user("grace", "ada@example.com")).unwrap_err();
        assert_eq!(unique_conflict(&err), Some(Conflict::Email));
        assert_eq!(unique_conflict(&rusqlite::Error::QueryReturnedNoRows), None);
    }

    #[test]
    fn concurrent_signup_waits_for_the_winner() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = DatabaseConfig {
            pool_size: 2,
            ..DatabaseConfig::default()
        };
        let pool = create_pool(&dir.path().join("race.db"), &config).unwrap();
        run_migrations(&pool).unwrap();
        let mut winner = pool.get().unwrap();
        let mut loser = pool.get().unwrap();

        let tx = winner
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .unwrap();
        create_user(&tx, &new_user("alice", "alice@example.com")).unwrap();

        let racer = std::thread::spawn(move || {
            register_user(&mut loser, &new_user("alice", "dup@example.com")).unwrap()
        });
        std::thread::sleep(Duration::from_millis(100));
        tx.commit().unwrap();

        assert_eq!(racer.join().unwrap(), Err(Conflict::Username));
    }

    #[test]
    fn edit_profile_rejects_taken_username() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        create_user(&conn, &new_user("ada", "ada@example.com")).unwrap();
        let id = create_user(&conn, &new_user("grace", "grace@example.com")).unwrap();

        let update = ProfileUpdate {
            first_name: "Grace",
            last_name: "Hopper",
            username: "ada",
            email: "grace@example.com",
            avatar: None,
        };
        assert_eq!(edit_profile(&mut conn, id, &update).unwrap(), Err(Conflict::Username));
        assert_eq!(get_user(&conn, id).unwrap().unwrap().username, "grace");
    }
}
