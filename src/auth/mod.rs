pub mod cookie;
pub mod middleware;
pub mod password;
pub mod role;
pub mod session;

pub use middleware::require_session;
pub use role::Role;
pub use session::{SessionError, SessionStore, SessionUser, SqliteSessionStore};
