use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Reaction};

/// How far an event travels once the relay emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Only the sessions of the conversation's participants.
    Directed,
    /// Every live session, member of the conversation or not.
    Broadcast,
}

/// Events sent FROM server TO clients over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// A live message for the receiving user. Carries no id: the sender
    /// persists separately and the receiver learns the id on its next fetch.
    MessageReceive { message: String },

    /// A system notice for one of the two participants
    SystemMessage {
        from: Uuid,
        message: String,
        is_system: bool,
    },

    /// A message body was replaced
    MessageEdited { id: Uuid, message: String },

    /// A message was tombstoned for both participants
    MessageDeletedEveryone {
        id: Uuid,
        message: String,
        users: [Uuid; 2],
    },

    /// The full reaction list of a message after a change
    MessageReacted { id: Uuid, reactions: Vec<Reaction> },

    /// Every registered user, in registry order
    OnlineUsers { users: Vec<Uuid> },
}

impl GatewayEvent {
    pub fn delivery(&self) -> Delivery {
        match self {
            Self::MessageReceive { .. } | Self::SystemMessage { .. } => Delivery::Directed,
            Self::MessageEdited { .. }
            | Self::MessageDeletedEveryone { .. }
            | Self::MessageReacted { .. }
            | Self::OnlineUsers { .. } => Delivery::Broadcast,
        }
    }

    pub fn edited(message: &Message) -> Self {
        Self::MessageEdited {
            id: message.id,
            message: message.text.clone(),
        }
    }

    pub fn deleted_for_everyone(message: &Message) -> Self {
        Self::MessageDeletedEveryone {
            id: message.id,
            message: message.text.clone(),
            users: message.participants.members(),
        }
    }

    pub fn system(from: Uuid, message: impl Into<String>) -> Self {
        Self::SystemMessage {
            from,
            message: message.into(),
            is_system: true,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", deny_unknown_fields)]
pub enum GatewayCommand {
    /// Bind this connection to a user. Replaces any older session of theirs.
    AddUser { user_id: Uuid },

    /// Relay a message live to `to`. Not persisted.
    SendMessage { from: Uuid, to: Uuid, message: String },

    /// Relay a system notice live to both users. Not persisted.
    SendSystemMessage { from: Uuid, to: Uuid, text: String },
}
