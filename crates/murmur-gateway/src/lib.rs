//! Live side of Murmur: who is online, and how mutation outcomes reach the
//! connected WebSocket sessions.

pub mod connection;
pub mod dispatcher;
pub mod presence;

pub use dispatcher::Dispatcher;
pub use presence::{PresenceRegistry, SessionHandle};
