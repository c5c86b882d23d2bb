use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::users::repo::StoreError;

pub type AccountResult<T> = Result<T, AccountError>;

/// Every failure the account core can surface to a caller.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Username already registered")]
    DuplicateUsername,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User not found")]
    NotFound,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Insufficient role")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AccountError {
    pub fn status(&self) -> StatusCode {
        match self {
            AccountError::DuplicateUsername => StatusCode::CONFLICT,
            AccountError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AccountError::NotFound => StatusCode::NOT_FOUND,
            AccountError::InvalidToken => StatusCode::UNAUTHORIZED,
            AccountError::Forbidden => StatusCode::FORBIDDEN,
            AccountError::Validation(_) => StatusCode::BAD_REQUEST,
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => AccountError::DuplicateUsername,
            StoreError::Backend(e) => AccountError::Internal(e),
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AccountError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({
            "error": {
                "message": message,
                "status": status.as_u16(),
            }
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_core_errors_to_status_codes() {
        assert_eq!(AccountError::DuplicateUsername.status(), StatusCode::CONFLICT);
        assert_eq!(AccountError::InvalidCredentials.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AccountError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AccountError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AccountError::Forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn store_duplicate_becomes_duplicate_username() {
        let err: AccountError = StoreError::DuplicateUsername.into();
        assert!(matches!(err, AccountError::DuplicateUsername));
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let resp = AccountError::Internal(anyhow::anyhow!("connection refused")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let raw = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!raw.contains("connection refused"));

        let body: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(body["error"]["message"], "Internal server error");
        assert_eq!(body["error"]["status"], 500);
    }

    #[tokio::test]
    async fn client_errors_carry_their_message() {
        let resp = AccountError::DuplicateUsername.into_response();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["message"], "Username already registered");
        assert_eq!(body["error"]["status"], 409);
    }
}
