//! The ledger seam.
//!
//! A [`Program`] is the state machine the ledger hosts: it validates every
//! submission and decides the payouts. A [`Ledger`] is whatever binds a
//! participant to that program: it totally orders submissions, stamps them
//! with its own clock and lets everyone observe the same finalized log.

pub mod memory;

pub use memory::InMemoryLedger;

use crate::error::Result;
use crate::types::{Amount, PartyId, Tick, Transfer};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State machine executed by the ledger.
///
/// `apply` must either accept the submission and return the payouts it
/// triggers, or reject it. The ledger applies submissions to a scratch copy,
/// so a rejected submission never leaves a trace.
pub trait Program: Clone + Send + Sync + 'static {
    type Payload: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Rejection: std::error::Error + Send + Sync + 'static;

    fn apply(
        &mut self,
        submission: &Submission<Self::Payload>,
        now: Tick,
    ) -> std::result::Result<Vec<Transfer>, Self::Rejection>;

    fn is_terminal(&self) -> bool;
}

/// A participant's request to advance the program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission<T> {
    /// Ordering slot the submitter expects to fill.
    pub index: u64,
    /// Step tag the submitter claims to be taking.
    pub tag: u8,
    pub from: PartyId,
    pub payment: Amount,
    pub payload: T,
}

/// A submission the ledger accepted, as every observer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedEvent<T> {
    pub index: u64,
    pub tag: u8,
    pub from: PartyId,
    pub value: Amount,
    pub payload: T,
    /// Tick at which the ledger accepted the submission.
    pub tick: Tick,
    pub transfers: Vec<Transfer>,
    /// Escrow balance after the payment and payouts.
    pub escrow: Amount,
}

impl<T: Clone> FinalizedEvent<T> {
    pub fn submission(&self) -> Submission<T> {
        Submission {
            index: self.index,
            tag: self.tag,
            from: self.from.clone(),
            payment: self.value,
            payload: self.payload.clone(),
        }
    }
}

/// Result of waiting on a ledger slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed<T> {
    Finalized(FinalizedEvent<T>),
    /// The deadline was reached before anything filled the slot.
    TimedOut,
}

impl<T> Observed<T> {
    pub fn did_timeout(&self) -> bool {
        matches!(self, Observed::TimedOut)
    }
}

/// Binding between a participant and a ledger hosting `P`.
#[async_trait]
pub trait Ledger<P: Program>: Send + Sync {
    /// Submit into the next slot and wait for finalization.
    ///
    /// Returns [`Observed::TimedOut`] without submitting when `deadline` has
    /// already been reached.
    async fn submit_and_finalize(
        &self,
        submission: Submission<P::Payload>,
        deadline: Option<Tick>,
    ) -> Result<Observed<P::Payload>>;

    /// Wait for slot `index` to be finalized by anyone, or for `deadline`.
    async fn await_only(&self, index: u64, deadline: Option<Tick>)
        -> Result<Observed<P::Payload>>;

    fn now(&self) -> Tick;
}
