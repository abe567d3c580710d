//! Database row types. These map directly to SQLite rows and are kept apart
//! from the murmur-types models so the store layout can change on its own.

use chrono::{DateTime, Utc};
use murmur_types::models::{ConversationPair, Message, Reaction};
use rusqlite::Row;
use uuid::Uuid;

use crate::{StoreError, StoreResult};

pub struct MessageRow {
    pub id: String,
    pub user_low: String,
    pub user_high: String,
    pub sender_id: String,
    pub body: String,
    pub is_system: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, user_low, user_high, sender_id, body, is_system, created_at, updated_at";

impl MessageRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_low: row.get(1)?,
            user_high: row.get(2)?,
            sender_id: row.get(3)?,
            body: row.get(4)?,
            is_system: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    pub fn into_message(
        self,
        deleted_for: Vec<Uuid>,
        reactions: Vec<Reaction>,
    ) -> StoreResult<Message> {
        let participants = ConversationPair::new(
            parse_uuid(&self.user_low, "user_low")?,
            parse_uuid(&self.user_high, "user_high")?,
        )
        .map_err(|_| StoreError::Corrupt(format!("message {} has one participant", self.id)))?;

        Ok(Message {
            id: parse_uuid(&self.id, "id")?,
            participants,
            sender_id: parse_uuid(&self.sender_id, "sender_id")?,
            text: self.body,
            deleted_for,
            reactions,
            is_system: self.is_system,
            created_at: from_micros(self.created_at)?,
            updated_at: from_micros(self.updated_at)?,
        })
    }
}

pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
}

impl ReactionRow {
    pub fn into_reaction(self) -> StoreResult<Reaction> {
        Ok(Reaction {
            user_id: parse_uuid(&self.user_id, "reaction user_id")?,
            emoji: self.emoji,
        })
    }
}

pub struct HiddenRow {
    pub message_id: String,
    pub user_id: String,
}

pub struct NicknameRow {
    pub contact_id: String,
    pub nickname: String,
}

pub(crate) fn parse_uuid(raw: &str, column: &str) -> StoreResult<Uuid> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("{column} '{raw}': {e}")))
}

fn from_micros(micros: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp {micros} out of range")))
}
