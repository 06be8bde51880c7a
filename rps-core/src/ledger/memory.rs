use crate::error::{CoreError, Result};
use crate::ledger::{FinalizedEvent, Ledger, Observed, Program, Submission};
use crate::types::{Amount, PartyId, Tick, Transfer};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

struct LedgerState<P: Program> {
    program: P,
    log: Vec<FinalizedEvent<P::Payload>>,
    escrow: Amount,
    accounts: HashMap<PartyId, Amount>,
    now: Tick,
}

/// Process-local ledger hosting a single program instance.
///
/// Every submission goes through one lock, which makes acceptance atomic
/// and gives the log a total order. Each accepted submission occupies one
/// tick of the clock.
pub struct InMemoryLedger<P: Program> {
    state: Mutex<LedgerState<P>>,
    notify: Notify,
}

impl<P: Program> InMemoryLedger<P> {
    pub fn new(program: P) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                program,
                log: Vec::new(),
                escrow: Amount::ZERO,
                accounts: HashMap::new(),
                now: Tick::ZERO,
            }),
            notify: Notify::new(),
        }
    }

    /// Rebuild a ledger from a stored log, re-validating every event.
    ///
    /// Participant accounts are not part of the log and start empty.
    pub fn restore(mut program: P, events: Vec<FinalizedEvent<P::Payload>>) -> Result<Self> {
        let mut escrow = Amount::ZERO;
        let mut now = Tick::ZERO;

        for (position, event) in events.iter().enumerate() {
            if event.index != position as u64 {
                return Err(CoreError::Stale {
                    index: event.index,
                    next: position as u64,
                });
            }
            if event.tick < now {
                return Err(CoreError::internal(format!(
                    "Event {} at {} precedes the previous event",
                    event.index, event.tick
                )));
            }

            let transfers = program
                .apply(&event.submission(), event.tick)
                .map_err(CoreError::rejected)?;
            if transfers != event.transfers {
                return Err(CoreError::internal(format!(
                    "Event {} settles differently on replay",
                    event.index
                )));
            }

            escrow = settle(escrow, event.value, &transfers)?;
            if escrow != event.escrow {
                return Err(CoreError::internal(format!(
                    "Event {} records escrow {} but settles to {}",
                    event.index, event.escrow, escrow
                )));
            }
            now = event.tick.plus(1);
        }

        tracing::debug!("Restored ledger with {} events", events.len());

        Ok(Self {
            state: Mutex::new(LedgerState {
                program,
                log: events,
                escrow,
                accounts: HashMap::new(),
                now,
            }),
            notify: Notify::new(),
        })
    }

    /// Credit a participant's account outside of the program.
    pub fn fund(&self, party: &PartyId, amount: Amount) -> Result<()> {
        let mut state = self.state.lock();
        let balance = state.accounts.entry(party.clone()).or_insert(Amount::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| CoreError::internal("Account balance overflow"))?;
        Ok(())
    }

    pub fn balance_of(&self, party: &PartyId) -> Amount {
        let state = self.state.lock();
        state.accounts.get(party).copied().unwrap_or(Amount::ZERO)
    }

    pub fn escrow(&self) -> Amount {
        self.state.lock().escrow
    }

    pub fn events(&self) -> Vec<FinalizedEvent<P::Payload>> {
        self.state.lock().log.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the hosted program.
    pub fn program(&self) -> P {
        self.state.lock().program.clone()
    }

    /// Move the clock forward and wake every waiter.
    pub fn advance(&self, ticks: u64) -> Tick {
        let now = {
            let mut state = self.state.lock();
            state.now = state.now.plus(ticks);
            state.now
        };
        tracing::debug!("Ledger clock advanced to {}", now);
        self.notify.notify_waiters();
        now
    }

    /// Advance the clock by one tick every `period` until the ledger is dropped.
    pub fn spawn_clock(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let ledger: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                match ledger.upgrade() {
                    Some(ledger) => {
                        ledger.advance(1);
                    }
                    None => break,
                }
            }
        })
    }

    fn try_finalize(
        &self,
        submission: Submission<P::Payload>,
        deadline: Option<Tick>,
    ) -> Result<Observed<P::Payload>> {
        let mut state = self.state.lock();
        let next = state.log.len() as u64;

        if submission.index != next {
            tracing::debug!(
                "Stale submission from {} for slot {} (next {})",
                submission.from,
                submission.index,
                next
            );
            return Err(CoreError::Stale {
                index: submission.index,
                next,
            });
        }

        if state.program.is_terminal() {
            tracing::debug!("Submission from {} after close ignored", submission.from);
            return Err(CoreError::Closed);
        }

        let now = state.now;
        if deadline.is_some_and(|deadline| now >= deadline) {
            return Ok(Observed::TimedOut);
        }

        let available = state
            .accounts
            .get(&submission.from)
            .copied()
            .unwrap_or(Amount::ZERO);
        if available < submission.payment {
            return Err(CoreError::InsufficientFunds {
                need: submission.payment,
                available,
            });
        }

        let mut program = state.program.clone();
        let transfers = program
            .apply(&submission, now)
            .map_err(CoreError::rejected)?;
        let escrow = settle(state.escrow, submission.payment, &transfers)?;

        let credits = credit_accounts(
            &state.accounts,
            &submission.from,
            available,
            submission.payment,
            &transfers,
        )?;

        // Commit: nothing below can fail.
        state.program = program;
        state.escrow = escrow;
        state.accounts.extend(credits);

        let event = FinalizedEvent {
            index: submission.index,
            tag: submission.tag,
            from: submission.from,
            value: submission.payment,
            payload: submission.payload,
            tick: now,
            transfers,
            escrow,
        };
        state.log.push(event.clone());
        state.now = now.plus(1);
        drop(state);

        tracing::debug!(
            "Finalized slot {} (tag {}) from {} at {}",
            event.index,
            event.tag,
            event.from,
            event.tick
        );
        self.notify.notify_waiters();

        Ok(Observed::Finalized(event))
    }
}

/// Escrow after taking in `payment` and paying out `transfers`.
fn settle(escrow: Amount, payment: Amount, transfers: &[Transfer]) -> Result<Amount> {
    let funded = escrow
        .checked_add(payment)
        .ok_or_else(|| CoreError::internal("Escrow balance overflow"))?;

    let mut requested = Amount::ZERO;
    for transfer in transfers {
        requested = requested
            .checked_add(transfer.amount)
            .ok_or_else(|| CoreError::internal("Settlement overflow"))?;
    }

    funded
        .checked_sub(requested)
        .ok_or(CoreError::EscrowOverdrawn {
            requested,
            escrow: funded,
        })
}

/// Account balances after debiting `payer` and crediting every transfer.
fn credit_accounts(
    accounts: &HashMap<PartyId, Amount>,
    payer: &PartyId,
    available: Amount,
    payment: Amount,
    transfers: &[Transfer],
) -> Result<HashMap<PartyId, Amount>> {
    let mut updated = HashMap::new();
    let remaining = available
        .checked_sub(payment)
        .ok_or(CoreError::InsufficientFunds {
            need: payment,
            available,
        })?;
    updated.insert(payer.clone(), remaining);

    for transfer in transfers {
        let current = match updated.get(&transfer.to) {
            Some(balance) => *balance,
            None => accounts.get(&transfer.to).copied().unwrap_or(Amount::ZERO),
        };
        let balance = current
            .checked_add(transfer.amount)
            .ok_or_else(|| CoreError::AccountOverflow {
                party: transfer.to.clone(),
            })?;
        updated.insert(transfer.to.clone(), balance);
    }

    Ok(updated)
}

#[async_trait]
impl<P: Program> Ledger<P> for InMemoryLedger<P> {
    async fn submit_and_finalize(
        &self,
        submission: Submission<P::Payload>,
        deadline: Option<Tick>,
    ) -> Result<Observed<P::Payload>> {
        self.try_finalize(submission, deadline)
    }

    async fn await_only(
        &self,
        index: u64,
        deadline: Option<Tick>,
    ) -> Result<Observed<P::Payload>> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.state.lock();
                if let Some(event) = state.log.get(index as usize) {
                    return Ok(Observed::Finalized(event.clone()));
                }
                if deadline.is_some_and(|deadline| state.now >= deadline) {
                    return Ok(Observed::TimedOut);
                }
            }

            tracing::debug!("Waiting for slot {} (deadline {:?})", index, deadline);
            notified.await;
        }
    }

    fn now(&self) -> Tick {
        self.state.lock().now
    }
}
