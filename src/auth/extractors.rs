use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::policy::{authorize, required_roles, Decision, Operation};
use crate::{
    error::AccountError,
    state::AppState,
    users::repo_types::User,
};

/// Extracts and validates the bearer JWT, resolving it to the calling account.
pub struct AuthUser(pub User);

impl AuthUser {
    /// Checks the caller's role against the route table for `op`.
    pub fn require(&self, op: Operation) -> Result<(), AccountError> {
        match authorize(required_roles(op), Some(self.0.role)) {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                warn!(user_id = self.0.id, role = %self.0.role, ?op, "access denied");
                Err(AccountError::Forbidden)
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AccountError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AccountError::InvalidToken)?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AccountError::InvalidToken)?;

        let user = state.accounts.authenticate(token.trim()).await?;
        Ok(AuthUser(user))
    }
}
