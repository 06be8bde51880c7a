use crate::session::Phase;
use rps_core::{Amount, PartyId, Tick};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Ledger error: {0}")]
    Core(#[from] rps_core::CoreError),

    #[error("Protocol violation: {0}")]
    Violation(#[from] ProtocolViolation),

    #[error("Local view diverged from ledger at slot {index}: {reason}")]
    Desync { index: u64, reason: String },

    #[error("Role {role} cannot {action}")]
    Unsupported { role: String, action: String },

    #[error("Interaction failed: {0}")]
    Interaction(String),

    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

impl GameError {
    pub fn interaction(msg: impl Into<String>) -> Self {
        Self::Interaction(msg.into())
    }

    /// The protocol violation behind a ledger rejection, if any.
    pub fn violation(&self) -> Option<&ProtocolViolation> {
        match self {
            Self::Violation(violation) => Some(violation),
            Self::Core(core) => core.rejection::<ProtocolViolation>(),
            _ => None,
        }
    }
}

/// Reasons the session state machine refuses a submission.
///
/// Every variant is raised before any state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("Expected payment of {expected}, got {actual}")]
    PaymentMismatch { expected: Amount, actual: Amount },

    #[error("Submission from {actual}, expected {expected}")]
    WrongSender { expected: PartyId, actual: PartyId },

    #[error("Carried-forward history does not match the session")]
    HistoryMismatch,

    #[error("Revealed hand and salt do not open the commitment")]
    CommitmentMismatch,

    #[error("Step {tag} is not legal while {phase}")]
    OutOfOrder { tag: u8, phase: Phase },

    #[error("Transition not legal while {phase}")]
    IllegalTransition { phase: Phase },

    #[error("Deadline {deadline} passed at {now}")]
    Late { deadline: Tick, now: Tick },

    #[error("Forfeiture claim at {now} before deadline {deadline}")]
    PrematureClaim { deadline: Tick, now: Tick },

    #[error("Session already ended")]
    Terminal,

    #[error("Stake amounts overflow")]
    AmountOverflow,
}
