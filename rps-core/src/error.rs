use crate::types::{Amount, PartyId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Submission rejected: {0}")]
    Rejected(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Stale submission for slot {index}: next free slot is {next}")]
    Stale { index: u64, next: u64 },

    #[error("Session is closed")]
    Closed,

    #[error("Insufficient funds: need {need}, have {available}")]
    InsufficientFunds { need: Amount, available: Amount },

    #[error("Settlement of {requested} exceeds escrow balance {escrow}")]
    EscrowOverdrawn { requested: Amount, escrow: Amount },

    #[error("Payout would overflow the account of {party}")]
    AccountOverflow { party: PartyId },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dialog error: {0}")]
    Dialog(String),
}

impl CoreError {
    pub fn rejected<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Rejected(Box::new(err))
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stale and closed submissions lost a race the ledger already settled.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. } | Self::Closed)
    }

    /// Downcast a rejection back to the program's own error type.
    pub fn rejection<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Rejected(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

// conversion from dialoguer::Error
impl From<dialoguer::Error> for CoreError {
    fn from(err: dialoguer::Error) -> Self {
        CoreError::Dialog(err.to_string())
    }
}
