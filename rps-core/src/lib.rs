//! Core plumbing for two-party wagering protocols
//!
//! This library provides the order-enforcing ledger a protocol runs against:
//! escrow accounting, a tick clock for deadlines, the program/binding seams,
//! and sqlite persistence of finalized event logs.

pub mod config;
pub mod error;
pub mod ledger;
pub mod storage;
pub mod types;

pub use config::{ProtocolConfig, DEFAULT_WINDOW};
pub use error::{CoreError, Result};
pub use ledger::{FinalizedEvent, InMemoryLedger, Ledger, Observed, Program, Submission};
pub use storage::{SessionRecord, SessionStore, Storage};
pub use types::{Amount, PartyId, Tick, Transfer};
