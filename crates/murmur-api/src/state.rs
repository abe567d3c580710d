use std::sync::Arc;

use murmur_db::{Database, StoreResult};
use murmur_gateway::Dispatcher;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher) -> AppState {
        Arc::new(Self { db, dispatcher })
    }

    /// Run a store call off the async runtime.
    pub async fn with_db<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || f(db.as_ref())).await?;
        Ok(result?)
    }
}
