use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use murmur_types::events::{Delivery, GatewayEvent};
use murmur_types::models::{Message, Reaction};

use crate::presence::{PresenceRegistry, SessionHandle};

const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Routes mutation outcomes to live sessions.
///
/// Directed events go to the participants' registered sessions. Broadcast
/// events go to every connected session through a shared channel. Delivery
/// is at most once: nothing is queued for users who are not connected.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connected session holds a receiver
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    presence: PresenceRegistry,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                presence: PresenceRegistry::new(),
            }),
        }
    }

    /// Subscribe to broadcast events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// A targeted channel for a new connection. It becomes reachable by user
    /// id only once registered.
    pub fn open_session(&self) -> (SessionHandle, mpsc::UnboundedReceiver<GatewayEvent>) {
        SessionHandle::open()
    }

    /// Send to every connected session. Returns how many receivers it reached.
    pub fn broadcast(&self, event: GatewayEvent) -> usize {
        self.inner.broadcast_tx.send(event).unwrap_or(0)
    }

    // -- Presence --

    pub async fn register(&self, user_id: Uuid, session: SessionHandle) {
        let replaced = self
            .inner
            .presence
            .register(user_id, session, |users| {
                self.broadcast(GatewayEvent::OnlineUsers { users });
            })
            .await;

        if let Some(old) = replaced {
            debug!("{} replaced session {}", user_id, old.id());
        }
    }

    /// Forget a closed connection. Returns the users it was bound to.
    pub async fn unregister(&self, session_id: Uuid) -> Vec<Uuid> {
        self.inner
            .presence
            .unregister(session_id, |users| {
                self.broadcast(GatewayEvent::OnlineUsers { users });
            })
            .await
    }

    pub async fn lookup(&self, user_id: Uuid) -> Option<SessionHandle> {
        self.inner.presence.lookup(user_id).await
    }

    pub async fn online_users(&self) -> Vec<Uuid> {
        self.inner.presence.snapshot().await
    }

    // -- Delivery --

    /// Send a targeted event to a specific user, if they are registered.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> bool {
        match self.lookup(user_id).await {
            Some(session) => session.send(event),
            None => false,
        }
    }

    /// Deliver to the sessions of both participants, each session once.
    pub async fn send_to_participants(&self, users: [Uuid; 2], event: GatewayEvent) -> usize {
        let first = self.lookup(users[0]).await;
        let second = self.lookup(users[1]).await;

        let mut delivered = 0;
        if let Some(session) = &first {
            delivered += usize::from(session.send(event.clone()));
        }
        if let Some(session) = second.filter(|s| first.as_ref() != Some(s)) {
            delivered += usize::from(session.send(event));
        }
        delivered
    }

    /// Route an event by its delivery scope.
    pub async fn emit(&self, users: [Uuid; 2], event: GatewayEvent) -> usize {
        match event.delivery() {
            Delivery::Directed => self.send_to_participants(users, event).await,
            Delivery::Broadcast => self.broadcast(event),
        }
    }

    /// Live message from `from` to `to`. Only the recipient is addressed.
    pub async fn relay_live_message(&self, from: Uuid, to: Uuid, message: String) -> bool {
        let delivered = self
            .send_to_user(to, GatewayEvent::MessageReceive { message })
            .await;
        if !delivered {
            debug!("{} -> {}: recipient offline, live message not delivered", from, to);
        }
        delivered
    }

    pub async fn relay_system_message(&self, from: Uuid, to: Uuid, text: String) -> usize {
        self.emit([from, to], GatewayEvent::system(from, text)).await
    }

    pub fn message_edited(&self, message: &Message) {
        self.broadcast(GatewayEvent::edited(message));
    }

    pub fn message_deleted_for_everyone(&self, message: &Message) {
        self.broadcast(GatewayEvent::deleted_for_everyone(message));
    }

    pub fn message_reacted(&self, id: Uuid, reactions: Vec<Reaction>) {
        if self.broadcast(GatewayEvent::MessageReacted { id, reactions }) == 0 {
            debug!("reaction update for {} reached no session", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_types::models::{ConversationPair, TOMBSTONE};
    use tokio::sync::broadcast::error::TryRecvError;

    fn message(a: Uuid, b: Uuid, text: &str) -> Message {
        let now = chrono::Utc::now();
        Message {
            id: Uuid::new_v4(),
            participants: ConversationPair::new(a, b).unwrap(),
            sender_id: a,
            text: text.into(),
            deleted_for: vec![],
            reactions: vec![],
            is_system: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn register_broadcasts_online_users() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();
        let user = Uuid::new_v4();
        let (session, _srx) = dispatcher.open_session();

        dispatcher.register(user, session.clone()).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            GatewayEvent::OnlineUsers { users: vec![user] }
        );

        dispatcher.unregister(session.id()).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            GatewayEvent::OnlineUsers { users: vec![] }
        );
    }

    #[tokio::test]
    async fn live_message_reaches_only_the_recipient() {
        let dispatcher = Dispatcher::new();
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let (sx, mut rx_x) = dispatcher.open_session();
        let (sy, mut rx_y) = dispatcher.open_session();
        dispatcher.register(x, sx).await;
        dispatcher.register(y, sy).await;

        assert!(dispatcher.relay_live_message(x, y, "hi".into()).await);
        assert_eq!(
            rx_y.try_recv().unwrap(),
            GatewayEvent::MessageReceive { message: "hi".into() }
        );
        assert!(rx_x.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_recipient_is_skipped() {
        let dispatcher = Dispatcher::new();
        let x = Uuid::new_v4();
        assert!(!dispatcher.relay_live_message(x, Uuid::new_v4(), "hi".into()).await);
    }

    #[tokio::test]
    async fn system_message_reaches_both_once() {
        let dispatcher = Dispatcher::new();
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let (sx, mut rx_x) = dispatcher.open_session();
        let (sy, mut rx_y) = dispatcher.open_session();
        dispatcher.register(x, sx).await;
        dispatcher.register(y, sy).await;

        assert_eq!(dispatcher.relay_system_message(x, y, "renamed".into()).await, 2);
        let expected = GatewayEvent::system(x, "renamed");
        assert_eq!(rx_x.try_recv().unwrap(), expected);
        assert_eq!(rx_y.try_recv().unwrap(), expected);
    }

    #[tokio::test]
    async fn shared_session_gets_directed_event_once() {
        let dispatcher = Dispatcher::new();
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let (shared, mut rx) = dispatcher.open_session();
        dispatcher.register(x, shared.clone()).await;
        dispatcher.register(y, shared).await;

        assert_eq!(dispatcher.relay_system_message(x, y, "note".into()).await, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn displaced_session_is_not_targetable() {
        let dispatcher = Dispatcher::new();
        let x = Uuid::new_v4();
        let (old, mut old_rx) = dispatcher.open_session();
        let (new, mut new_rx) = dispatcher.open_session();
        dispatcher.register(x, old.clone()).await;
        dispatcher.register(x, new).await;

        dispatcher.send_to_user(x, GatewayEvent::MessageReceive { message: "hi".into() }).await;
        assert!(old_rx.try_recv().is_err());
        assert!(new_rx.try_recv().is_ok());

        assert!(dispatcher.unregister(old.id()).await.is_empty());
        assert_eq!(dispatcher.online_users().await, vec![x]);
    }

    #[tokio::test]
    async fn mutations_broadcast_to_everyone() {
        let dispatcher = Dispatcher::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut outsider = dispatcher.subscribe();

        let mut m = message(a, b, "typo");
        dispatcher.message_edited(&m);
        assert_eq!(
            outsider.recv().await.unwrap(),
            GatewayEvent::MessageEdited { id: m.id, message: "typo".into() }
        );

        m.text = TOMBSTONE.into();
        dispatcher.message_deleted_for_everyone(&m);
        assert_eq!(
            outsider.recv().await.unwrap(),
            GatewayEvent::MessageDeletedEveryone {
                id: m.id,
                message: TOMBSTONE.into(),
                users: m.participants.members(),
            }
        );

        let reactions = vec![Reaction { user_id: a, emoji: "👍".into() }];
        dispatcher.message_reacted(m.id, reactions.clone());
        assert_eq!(
            outsider.recv().await.unwrap(),
            GatewayEvent::MessageReacted { id: m.id, reactions }
        );
        assert!(matches!(outsider.try_recv(), Err(TryRecvError::Empty)));
    }
}
