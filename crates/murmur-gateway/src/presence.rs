use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use murmur_types::events::GatewayEvent;

/// Targeted send side of one live connection.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl SessionHandle {
    /// A fresh handle and the receiver its connection drains.
    pub fn open() -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Fire-and-forget. False if the connection is already gone.
    pub fn send(&self, event: GatewayEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SessionHandle {}

#[derive(Default)]
struct Table {
    sessions: HashMap<Uuid, SessionHandle>,
    /// Registration order of the users in `sessions`.
    order: Vec<Uuid>,
}

impl Table {
    fn snapshot(&self) -> Vec<Uuid> {
        self.order.clone()
    }
}

/// user_id -> the single live session for that user.
///
/// The `notify` callbacks run while the write lock is still held, so
/// whatever they publish always reflects the mutation that triggered them
/// and two publications can never overtake each other.
#[derive(Default)]
pub struct PresenceRegistry {
    table: RwLock<Table>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `user_id` to `session`, replacing any older session. Returns the
    /// displaced handle, if there was one.
    pub async fn register<F>(
        &self,
        user_id: Uuid,
        session: SessionHandle,
        notify: F,
    ) -> Option<SessionHandle>
    where
        F: FnOnce(Vec<Uuid>),
    {
        let mut table = self.table.write().await;
        let replaced = table.sessions.insert(user_id, session);
        if replaced.is_none() {
            table.order.push(user_id);
        }
        notify(table.snapshot());
        replaced
    }

    /// Drop every entry bound to `session_id`. Returns the users that went
    /// offline, which is empty when a newer session already took over.
    pub async fn unregister<F>(&self, session_id: Uuid, notify: F) -> Vec<Uuid>
    where
        F: FnOnce(Vec<Uuid>),
    {
        let mut table = self.table.write().await;
        let removed: Vec<Uuid> = table
            .sessions
            .iter()
            .filter(|(_, handle)| handle.id == session_id)
            .map(|(user_id, _)| *user_id)
            .collect();

        for user_id in &removed {
            table.sessions.remove(user_id);
        }
        table.order.retain(|user_id| !removed.contains(user_id));

        notify(table.snapshot());
        removed
    }

    pub async fn lookup(&self, user_id: Uuid) -> Option<SessionHandle> {
        self.table.read().await.sessions.get(&user_id).cloned()
    }

    /// Registered users in registration order.
    pub async fn snapshot(&self) -> Vec<Uuid> {
        self.table.read().await.snapshot()
    }
}
