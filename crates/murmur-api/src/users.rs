//! Block lists and nicknames. Accounts themselves live outside Murmur; these
//! tables are keyed by user id alone.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use murmur_types::api::{BlockRequest, SetNicknameRequest};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

pub async fn block(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    ApiJson(req): ApiJson<BlockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target_id = req.target_id;
    state
        .with_db(move |db| db.block_user(user_id, target_id))
        .await?;

    info!("{} blocked {}", user_id, target_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unblock(
    State(state): State<AppState>,
    Path((user_id, target_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .with_db(move |db| db.unblock_user(user_id, target_id))
        .await?;

    info!("{} unblocked {}", user_id, target_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_nickname(
    State(state): State<AppState>,
    Path((user_id, contact_id)): Path<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<SetNicknameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let nickname = state
        .with_db(move |db| db.set_nickname(user_id, contact_id, &req.nickname))
        .await?;

    Ok(Json(nickname))
}

pub async fn list_nicknames(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let nicknames = state.with_db(move |db| db.nicknames(user_id)).await?;
    Ok(Json(nicknames))
}
