use murmur_types::models::SameParticipantError;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("message {0} not found")]
    NotFound(Uuid),

    #[error("invalid input: {0}")]
    Validation(&'static str),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

impl From<SameParticipantError> for StoreError {
    fn from(_: SameParticipantError) -> Self {
        Self::Validation("a conversation needs two distinct participants")
    }
}
