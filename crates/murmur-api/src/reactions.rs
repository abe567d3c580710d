use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use murmur_types::api::{ReactRequest, ReactionsResponse};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

/// Set the caller's reaction, replacing any earlier one, and broadcast the
/// resulting list.
pub async fn react(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    ApiJson(req): ApiJson<ReactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reactions = state
        .with_db(move |db| db.react(message_id, req.user_id, &req.emoji))
        .await?;

    state.dispatcher.message_reacted(message_id, reactions.clone());
    Ok(Json(ReactionsResponse { reactions }))
}
