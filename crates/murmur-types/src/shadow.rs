//! Client-side mirror of one open conversation.
//!
//! The gateway is fire-and-forget, so a shadow only ever treats live events
//! as hints: `resync` with a fresh fetch is what brings it back to the
//! stored truth.

use uuid::Uuid;

use crate::api::MessageView;
use crate::events::GatewayEvent;
use crate::models::ConversationPair;

/// A locally held message. Live deliveries arrive without an id until the
/// next fetch supplies one.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowMessage {
    pub id: Option<Uuid>,
    pub view: MessageView,
}

#[derive(Debug, Clone)]
pub struct ConversationShadow {
    pair: ConversationPair,
    viewer: Uuid,
    messages: Vec<ShadowMessage>,
    online: Vec<Uuid>,
}

impl ConversationShadow {
    pub fn new(pair: ConversationPair, viewer: Uuid) -> Self {
        Self {
            pair,
            viewer,
            messages: Vec::new(),
            online: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[ShadowMessage] {
        &self.messages
    }

    pub fn online(&self) -> &[Uuid] {
        &self.online
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.online.contains(&user_id)
    }

    /// Replace local state with an authoritative fetch result.
    pub fn resync(&mut self, fetched: Vec<MessageView>) {
        self.messages = fetched
            .into_iter()
            .map(|view| ShadowMessage { id: Some(view.id), view })
            .collect();
    }

    /// Record a message this viewer just persisted.
    pub fn record_sent(&mut self, id: Uuid, text: impl Into<String>) {
        self.messages.push(ShadowMessage {
            id: Some(id),
            view: MessageView {
                id,
                from_self: true,
                message: text.into(),
                reactions: Vec::new(),
                is_system: false,
            },
        });
    }

    /// Fold one gateway event into local state. Returns whether anything changed.
    pub fn apply(&mut self, event: &GatewayEvent) -> bool {
        match event {
            GatewayEvent::MessageReceive { message } => {
                self.push_live(message.clone(), false, false);
                true
            }
            GatewayEvent::SystemMessage { from, message, .. } => {
                if !self.pair.contains(*from) {
                    return false;
                }
                self.push_live(message.clone(), *from == self.viewer, true);
                true
            }
            GatewayEvent::MessageEdited { id, message }
            | GatewayEvent::MessageDeletedEveryone { id, message, .. } => {
                match self.find_mut(*id) {
                    Some(local) if local.view.message != *message => {
                        local.view.message = message.clone();
                        true
                    }
                    _ => false,
                }
            }
            GatewayEvent::MessageReacted { id, reactions } => match self.find_mut(*id) {
                Some(local) if local.view.reactions != *reactions => {
                    local.view.reactions = reactions.clone();
                    true
                }
                _ => false,
            },
            GatewayEvent::OnlineUsers { users } => {
                let changed = self.online != *users;
                self.online = users.clone();
                changed
            }
        }
    }

    fn push_live(&mut self, message: String, from_self: bool, is_system: bool) {
        self.messages.push(ShadowMessage {
            id: None,
            view: MessageView {
                id: Uuid::nil(),
                from_self,
                message,
                reactions: Vec::new(),
                is_system,
            },
        });
    }

    fn find_mut(&mut self, id: Uuid) -> Option<&mut ShadowMessage> {
        self.messages.iter_mut().find(|m| m.id == Some(id))
    }
}
