use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::repo_types::{NewUser, User, UserRow};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username already taken")]
    DuplicateUsername,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for user records. Implementations must enforce username uniqueness.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_all(&self) -> StoreResult<Vec<User>>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn create(&self, user: NewUser) -> StoreResult<User>;

    /// Inserts `user` only if the store holds no users yet, atomically with that check.
    /// Returns `None` without inserting when any user already exists.
    async fn create_first(&self, user: NewUser) -> StoreResult<Option<User>>;
}

const USER_COLUMNS: &str = "id, username, nickname, password_hash, role";

// Serializes bootstrap inserts across connections.
const BOOTSTRAP_LOCK_KEY: i64 = 0x7573_6572_5f62_6f6f; // "user_boo"

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_insert_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateUsername,
        _ => StoreError::Backend(anyhow::Error::new(e).context("insert user")),
    }
}

fn insert_sql() -> String {
    format!(
        r#"
        INSERT INTO users (username, nickname, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING {USER_COLUMNS}
        "#
    )
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_all(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(users)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("find user by username")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&insert_sql())
            .bind(&user.username)
            .bind(&user.nickname)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.db)
            .await
            .map_err(map_insert_err)?;
        Ok(User::try_from(row)?)
    }

    async fn create_first(&self, user: NewUser) -> StoreResult<Option<User>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(BOOTSTRAP_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .context("acquire bootstrap lock")?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await
            .context("count users")?;
        if count > 0 {
            debug!(count, "store already populated, skipping bootstrap insert");
            tx.rollback().await.context("rollback tx")?;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, UserRow>(&insert_sql())
            .bind(&user.username)
            .bind(&user.nickname)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_insert_err)?;
        tx.commit().await.context("commit tx")?;

        Ok(Some(User::try_from(row)?))
    }
}
