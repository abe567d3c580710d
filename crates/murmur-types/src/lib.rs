//! Shared types for the Murmur workspace: persisted message models, the
//! HTTP request/response shapes, the live gateway protocol, the block policy
//! and the client-side conversation shadow.

pub mod api;
pub mod block;
pub mod events;
pub mod models;
pub mod shadow;

pub use models::{ConversationPair, Message, Reaction, TOMBSTONE};
