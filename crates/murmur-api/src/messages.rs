use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use murmur_types::ConversationPair;
use murmur_types::api::{
    ClearChatRequest, ClearChatResponse, DeleteMessageRequest, DeleteMessageResponse,
    EditMessageRequest, FetchMessagesRequest, MessageCreated, MessageView, SendMessageRequest,
    SendSystemMessageRequest,
};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

/// Durable append. No block check and no live event here: clients relay the
/// message live over the gateway, where blocking is enforced.
pub async fn send_message(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pair = ConversationPair::new(req.from, req.to)?;
    let from = req.from;
    let message = state
        .with_db(move |db| db.append(pair, from, &req.message))
        .await?;

    Ok((StatusCode::CREATED, Json(MessageCreated { id: message.id })))
}

pub async fn fetch_messages(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<FetchMessagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pair = ConversationPair::new(req.from, req.to)?;
    let viewer = req.from;
    let messages = state.with_db(move |db| db.fetch(pair, viewer)).await?;

    let views: Vec<MessageView> = messages
        .into_iter()
        .map(|m| MessageView::project(m, viewer))
        .collect();
    Ok(Json(views))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    ApiJson(req): ApiJson<EditMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .with_db(move |db| db.edit(message_id, &req.new_text))
        .await?;

    state.dispatcher.message_edited(&message);
    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    ApiJson(req): ApiJson<DeleteMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.for_everyone {
        let message = state
            .with_db(move |db| db.delete_for_everyone(message_id))
            .await?;
        info!("{} deleted {} for everyone", req.user_id, message_id);
        state.dispatcher.message_deleted_for_everyone(&message);
    } else {
        let viewer = req.user_id;
        state
            .with_db(move |db| db.delete_for_user(message_id, viewer))
            .await?;
    }

    Ok(Json(DeleteMessageResponse {
        for_everyone: req.for_everyone,
    }))
}

/// Persist a system notice and push it to both participants.
pub async fn send_system_message(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SendSystemMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pair = ConversationPair::new(req.from, req.to)?;
    let from = req.from;
    let text = req.text.clone();
    let message = state
        .with_db(move |db| db.system_append(pair, from, &text))
        .await?;

    state
        .dispatcher
        .relay_system_message(req.from, req.to, req.text)
        .await;

    Ok((StatusCode::CREATED, Json(MessageCreated { id: message.id })))
}

pub async fn clear_chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ClearChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pair = ConversationPair::new(req.user_id, req.contact_id)?;
    let user_id = req.user_id;
    let cleared = state.with_db(move |db| db.clear_chat(pair, user_id)).await?;

    Ok(Json(ClearChatResponse { cleared }))
}
