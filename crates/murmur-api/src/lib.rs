pub mod error;
pub mod extract;
pub mod messages;
pub mod reactions;
pub mod state;
pub mod users;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

pub use error::ApiError;
pub use extract::ApiJson;
pub use state::{AppState, AppStateInner};

/// The durable (HTTP) surface. Live delivery lives in murmur-gateway.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/messages", post(messages::send_message))
        .route("/messages/fetch", post(messages::fetch_messages))
        .route("/messages/system", post(messages::send_system_message))
        .route("/messages/clear", post(messages::clear_chat))
        .route("/messages/{message_id}/edit", post(messages::edit_message))
        .route("/messages/{message_id}/delete", post(messages::delete_message))
        .route("/messages/{message_id}/reactions", post(reactions::react))
        .route("/users/{user_id}/blocks", post(users::block))
        .route("/users/{user_id}/blocks/{target_id}", delete(users::unblock))
        .route("/users/{user_id}/nicknames", get(users::list_nicknames))
        .route("/users/{user_id}/nicknames/{contact_id}", put(users::set_nickname))
        .with_state(state)
}

async fn ping() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "msg": "Ping Successful" }))
}
