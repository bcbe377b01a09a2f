use serde::Serialize;
use std::fmt;

/// Coarse permission tiers. The discriminants are the ids stored in
/// `users.role_id` and seeded into the `roles` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Admin = 1,
    Moderator = 2,
    User = 3,
    Guest = 4,
}

impl Role {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Moderator),
            3 => Some(Role::User),
            4 => Some(Role::Guest),
            _ => None,
        }
    }

    /// Stored ids outside the enumeration get the least privilege.
    pub fn from_id_or_guest(id: i64) -> Self {
        Self::from_id(id).unwrap_or(Role::Guest)
    }

    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Moderator => "Moderator",
            Role::User => "User",
            Role::Guest => "Guest",
        }
    }

    /// The single authorization predicate: does a subject holding `self`
    /// pass a route that requires `required`?
    pub fn satisfies(self, required: Role) -> bool {
        match required {
            Role::Admin => self == Role::Admin,
            Role::Moderator => matches!(self, Role::Admin | Role::Moderator),
            Role::User => matches!(self, Role::Admin | Role::Moderator | Role::User),
            Role::Guest => true,
        }
    }

    pub fn is_staff(self) -> bool {
        self.satisfies(Role::Moderator)
    }

    pub fn is_admin(self) -> bool {
        self.satisfies(Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl rusqlite::types::FromSql for Role {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        i64::column_result(value).map(Role::from_id_or_guest)
    }
}

impl rusqlite::ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::from(self.id()))
    }
}
