use std::sync::Arc;

use anyhow::Context;
use tracing::{info, instrument, warn};

use super::{
    dto::PublicUser,
    repo::UserStore,
    repo_types::{NewUser, User},
};
use crate::{
    auth::{jwt::JwtKeys, password::Hasher, policy::Role},
    error::{AccountError, AccountResult},
};

/// Registration, login and lookups over a [`UserStore`].
pub struct AccountService {
    store: Arc<dyn UserStore>,
    hasher: Hasher,
    keys: JwtKeys,
    // Verified against when the username is unknown so both login failures cost the same.
    dummy_hash: String,
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, hasher: Hasher, keys: JwtKeys) -> anyhow::Result<Self> {
        let dummy_hash = hasher.hash("dummy-password-for-timing")?;
        Ok(Self {
            store,
            hasher,
            keys,
            dummy_hash,
        })
    }

    /// The first account ever registered becomes `admin`; everyone after is `user`.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        nickname: &str,
    ) -> AccountResult<PublicUser> {
        if self.store.find_by_username(username).await?.is_some() {
            warn!(username, "username already registered");
            return Err(AccountError::DuplicateUsername);
        }

        let password_hash = self.hash(password).await?;
        let mut new_user = NewUser {
            username: username.to_string(),
            nickname: nickname.to_string(),
            password_hash,
            role: Role::Admin,
        };

        let user = match self.store.create_first(new_user.clone()).await? {
            Some(user) => {
                info!(user_id = user.id, username, "first account registered as admin");
                user
            }
            None => {
                new_user.role = Role::User;
                self.store.create(new_user).await?
            }
        };

        info!(user_id = user.id, username, role = %user.role, "user registered");
        Ok(user.into())
    }

    /// Unknown usernames and wrong passwords both come back as `InvalidCredentials`.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> AccountResult<(PublicUser, String)> {
        let user = match self.store.find_by_username(username).await? {
            Some(u) => u,
            None => {
                self.verify(password, &self.dummy_hash).await?;
                warn!(username, "login unknown username");
                return Err(AccountError::InvalidCredentials);
            }
        };

        if !self.verify(password, &user.password_hash).await? {
            warn!(user_id = user.id, "login invalid password");
            return Err(AccountError::InvalidCredentials);
        }

        let token = self.keys.issue(user.id)?;
        info!(user_id = user.id, "user logged in");
        Ok((user.into(), token))
    }

    pub async fn list_users(&self) -> AccountResult<Vec<PublicUser>> {
        let users = self.store.find_all().await?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }

    pub async fn get_user(&self, id: i64) -> AccountResult<PublicUser> {
        self.store
            .find_by_id(id)
            .await?
            .map(PublicUser::from)
            .ok_or(AccountError::NotFound)
    }

    /// Resolves a bearer token to the account behind it. A valid token for a user
    /// that no longer exists is treated as invalid.
    pub async fn authenticate(&self, token: &str) -> AccountResult<User> {
        let user_id = self.keys.verify(token)?;
        match self.store.find_by_id(user_id).await? {
            Some(user) => Ok(user),
            None => {
                warn!(user_id, "token for unknown user");
                Err(AccountError::InvalidToken)
            }
        }
    }

    async fn hash(&self, plain: &str) -> AccountResult<String> {
        let hasher = self.hasher.clone();
        let plain = plain.to_owned();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .context("password hash task")??;
        Ok(hash)
    }

    async fn verify(&self, plain: &str, hash: &str) -> AccountResult<bool> {
        let hasher = self.hasher.clone();
        let plain = plain.to_owned();
        let hash = hash.to_owned();
        let ok = tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash))
            .await
            .context("password verify task")?;
        Ok(ok)
    }
}

#[cfg(test)]
pub(crate) fn test_service() -> AccountService {
    use crate::{
        auth::{jwt::test_jwt_config, password::test_hasher},
        users::memory::MemoryUserStore,
    };
    AccountService::new(
        Arc::new(MemoryUserStore::new()),
        test_hasher(),
        JwtKeys::new(&test_jwt_config()),
    )
    .expect("service builds")
}
