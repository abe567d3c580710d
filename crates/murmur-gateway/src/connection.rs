use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use murmur_db::Database;
use murmur_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;
use crate::presence::SessionHandle;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive one WebSocket connection until either side closes it.
///
/// The connection receives broadcasts from the moment it opens and
/// directed events once an `AddUser` command binds it to a user.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, db: Arc<Database>) {
    let (mut sender, mut receiver) = socket.split();

    let (session, mut session_rx) = dispatcher.open_session();
    let session_id = session.id();
    let mut broadcast_rx = dispatcher.subscribe();
    info!("session {} connected to gateway", session_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            let event = tokio::select! {
                result = broadcast_rx.recv() => match result {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("session {} lagged, {} broadcast events dropped", session_id, n);
                        continue;
                    }
                    Err(_) => break,
                },
                result = session_rx.recv() => match result {
                    Some(event) => event,
                    None => break,
                },
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let Some(frame) = encode(&event) else {
                continue;
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    // Read commands from client
    let recv_dispatcher = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&recv_dispatcher, &db, &session, cmd).await,
                    Err(e) => {
                        warn!(
                            "session {} bad command: {} -- raw: {}",
                            session_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let went_offline = dispatcher.unregister(session_id).await;
    info!(
        "session {} disconnected from gateway ({} user(s) offline)",
        session_id,
        went_offline.len()
    );
}

async fn handle_command(
    dispatcher: &Dispatcher,
    db: &Arc<Database>,
    session: &SessionHandle,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::AddUser { user_id } => {
            info!("{} registered on session {}", user_id, session.id());
            dispatcher.register(user_id, session.clone()).await;
        }

        GatewayCommand::SendMessage { from, to, message } => {
            if from == to || message.is_empty() {
                warn!("session {} sent an invalid live message, dropped", session.id());
                return;
            }
            if is_blocked(db, from, to).await {
                // Silently dropped: the sender must not learn about the block.
                debug!("{} -> {}: blocked, live message dropped", from, to);
                return;
            }
            dispatcher.relay_live_message(from, to, message).await;
        }

        GatewayCommand::SendSystemMessage { from, to, text } => {
            if from == to || text.is_empty() {
                warn!("session {} sent an invalid system message, dropped", session.id());
                return;
            }
            dispatcher.relay_system_message(from, to, text).await;
        }
    }
}

/// Fresh block check for a live send. A failed lookup counts as blocked.
async fn is_blocked(db: &Arc<Database>, from: Uuid, to: Uuid) -> bool {
    let db = db.clone();
    match tokio::task::spawn_blocking(move || db.is_blocked(from, to)).await {
        Ok(Ok(blocked)) => blocked,
        Ok(Err(e)) => {
            error!("block check {} -> {} failed: {}", from, to, e);
            true
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            true
        }
    }
}

fn encode(event: &GatewayEvent) -> Option<Message> {
    serde_json::to_string(event)
        .map(|text| Message::Text(text.into()))
        .map_err(|e| error!("failed to encode gateway event: {}", e))
        .ok()
}
