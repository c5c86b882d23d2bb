use sqlx::FromRow;

use crate::auth::policy::Role;

/// Row as stored in `users`; `role` is kept as text in the database.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub password_hash: String, // Argon2 PHC string, never returned to callers
    pub role: Role,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role = r
            .role
            .parse::<Role>()
            .map_err(|e| anyhow::anyhow!("user {}: {e}", r.id))?;
        Ok(Self {
            id: r.id,
            username: r.username,
            nickname: r.nickname,
            password_hash: r.password_hash,
            role,
        })
    }
}

/// Insert payload; the store assigns `id`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub nickname: String,
    pub password_hash: String,
    pub role: Role,
}
