use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text a message body is replaced with on "delete for everyone".
pub const TOMBSTONE: &str = "This message was deleted.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a conversation needs two distinct participants")]
pub struct SameParticipantError;

/// The unordered pair of users a message belongs to.
///
/// Stored normalised (lower id first) so `(a, b)` and `(b, a)` compare equal
/// and map to the same rows in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[Uuid; 2]", into = "[Uuid; 2]")]
pub struct ConversationPair {
    low: Uuid,
    high: Uuid,
}

impl ConversationPair {
    pub fn new(a: Uuid, b: Uuid) -> Result<Self, SameParticipantError> {
        if a == b {
            return Err(SameParticipantError);
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { low, high })
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.low == user_id || self.high == user_id
    }

    pub fn members(&self) -> [Uuid; 2] {
        [self.low, self.high]
    }
}

impl TryFrom<[Uuid; 2]> for ConversationPair {
    type Error = SameParticipantError;

    fn try_from(value: [Uuid; 2]) -> Result<Self, Self::Error> {
        Self::new(value[0], value[1])
    }
}

impl From<ConversationPair> for [Uuid; 2] {
    fn from(pair: ConversationPair) -> Self {
        pair.members()
    }
}

/// One reactor's emoji on a message. A message holds at most one per reactor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: Uuid,
    pub emoji: String,
}

/// Canonical state of a stored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub participants: ConversationPair,
    pub sender_id: Uuid,
    pub text: String,
    pub deleted_for: Vec<Uuid>,
    pub reactions: Vec<Reaction>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn is_visible_to(&self, viewer: Uuid) -> bool {
        !self.deleted_for.contains(&viewer)
    }
}
