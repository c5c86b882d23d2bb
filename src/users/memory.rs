use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    repo::{StoreError, StoreResult, UserStore},
    repo_types::{NewUser, User},
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    by_id: BTreeMap<i64, User>,
}

impl Inner {
    fn insert(&mut self, new: NewUser) -> StoreResult<User> {
        if self.by_id.values().any(|u| u.username == new.username) {
            return Err(StoreError::DuplicateUsername);
        }
        self.next_id += 1;
        let user = User {
            id: self.next_id,
            username: new.username,
            nickname: new.nickname,
            password_hash: new.password_hash,
            role: new.role,
        };
        self.by_id.insert(user.id, user.clone());
        Ok(user)
    }
}

/// Process-local store, used when no database is configured.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_all(&self) -> StoreResult<Vec<User>> {
        Ok(self.inner.read().await.by_id.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.by_id.values().find(|u| u.username == username).cloned())
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        self.inner.write().await.insert(user)
    }

    async fn create_first(&self, user: NewUser) -> StoreResult<Option<User>> {
        let mut inner = self.inner.write().await;
        if !inner.by_id.is_empty() {
            return Ok(None);
        }
        inner.insert(user).map(Some)
    }
}
