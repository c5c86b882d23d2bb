use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use super::dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest};
use crate::{
    auth::{extractors::AuthUser, policy::Operation},
    error::{AccountError, AccountResult},
    state::AppState,
};

const MAX_PASSWORD_BYTES: usize = 128;
const MAX_NICKNAME_CHARS: usize = 64;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/me", get(get_me))
        .route("/users/:id", get(get_user))
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn validate_registration(payload: &RegisterRequest) -> AccountResult<()> {
    if !is_valid_username(&payload.username) {
        return Err(AccountError::Validation(
            "Username must be 3-32 characters of letters, digits, '_', '.' or '-'".into(),
        ));
    }
    if payload.password.is_empty() || payload.password.len() > MAX_PASSWORD_BYTES {
        return Err(AccountError::Validation("Password must be 1-128 bytes".into()));
    }
    let nickname_len = payload.nickname.chars().count();
    if nickname_len == 0 || nickname_len > MAX_NICKNAME_CHARS {
        return Err(AccountError::Validation("Nickname must be 1-64 characters".into()));
    }
    Ok(())
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> AccountResult<(StatusCode, Json<PublicUser>)> {
    payload.username = payload.username.trim().to_string();
    payload.nickname = payload.nickname.trim().to_string();

    if let Err(e) = validate_registration(&payload) {
        warn!(error = %e, "invalid registration");
        return Err(e);
    }

    let user = state
        .accounts
        .register(&payload.username, &payload.password, &payload.nickname)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AccountResult<Json<LoginResponse>> {
    let (user, token) = state
        .accounts
        .login(payload.username.trim(), &payload.password)
        .await?;
    Ok(Json(LoginResponse { token, data: user }))
}

#[instrument(skip(state, caller), fields(caller_id = caller.0.id))]
pub async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
) -> AccountResult<Json<Vec<PublicUser>>> {
    caller.require(Operation::ListUsers)?;
    Ok(Json(state.accounts.list_users().await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AccountResult<Json<PublicUser>> {
    Ok(Json(state.accounts.get_user(id).await?))
}

#[instrument(skip(caller), fields(caller_id = caller.0.id))]
pub async fn get_me(caller: AuthUser) -> AccountResult<Json<PublicUser>> {
    caller.require(Operation::CurrentUser)?;
    Ok(Json(PublicUser::from(caller.0)))
}
