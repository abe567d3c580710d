use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Reaction};

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub from: Uuid,
    pub to: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageCreated {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchMessagesRequest {
    pub from: Uuid,
    pub to: Uuid,
}

/// A stored message as seen by one viewer of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub from_self: bool,
    pub message: String,
    pub reactions: Vec<Reaction>,
    pub is_system: bool,
}

impl MessageView {
    pub fn project(message: Message, viewer: Uuid) -> Self {
        Self {
            id: message.id,
            from_self: message.sender_id == viewer,
            message: message.text,
            reactions: message.reactions,
            is_system: message.is_system,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub new_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteMessageRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub for_everyone: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteMessageResponse {
    pub for_everyone: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendSystemMessageRequest {
    pub from: Uuid,
    pub to: Uuid,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClearChatRequest {
    pub user_id: Uuid,
    pub contact_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearChatResponse {
    pub cleared: usize,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactRequest {
    pub user_id: Uuid,
    pub emoji: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReactionsResponse {
    pub reactions: Vec<Reaction>,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockRequest {
    pub target_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetNicknameRequest {
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nickname {
    pub contact_id: Uuid,
    pub nickname: String,
}
