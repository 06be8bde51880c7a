use crate::commitment::{CommitmentScheme, HashCommitment, Opening};
use crate::deadline::DeadlineArbiter;
use crate::error::{GameError, Result};
use crate::interact::Interact;
use crate::outcome::GameResult;
use crate::session::{Duty, Role, Session, Step, Transition};
use rps_core::{FinalizedEvent, Ledger, Observed, PartyId, Tick};
use std::sync::Arc;

/// Drives one role through a session.
///
/// All three roles share this loop. What differs is which duties the
/// session hands each role, and those are decided by the session itself.
pub struct RoleDriver<L, I> {
    role: Role,
    identity: PartyId,
    ledger: Arc<L>,
    interact: I,
    session: Session,
    opening: Option<Opening>,
}

impl<L, I> RoleDriver<L, I>
where
    L: Ledger<Session>,
    I: Interact,
{
    pub fn new(
        role: Role,
        identity: PartyId,
        ledger: Arc<L>,
        interact: I,
        arbiter: DeadlineArbiter,
    ) -> Self {
        Self {
            role,
            identity,
            ledger,
            interact,
            session: Session::new(arbiter),
            opening: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn identity(&self) -> &PartyId {
        &self.identity
    }

    /// This role's view of the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn interact(&self) -> &I {
        &self.interact
    }

    pub fn into_interact(self) -> I {
        self.interact
    }

    /// Run until the session reaches a terminal result.
    pub async fn run(&mut self) -> Result<GameResult> {
        loop {
            match self.session.duty(self.role) {
                Duty::Done(result) => {
                    tracing::info!("{} sees session end: {}", self.role, result);
                    self.interact.session_ended(result);
                    return Ok(result);
                }
                Duty::Submit { step, deadline } => self.take_turn(step, deadline).await?,
                Duty::Await { deadline, claim } => self.wait_turn(deadline, claim).await?,
            }
        }
    }

    async fn take_turn(&mut self, step: Step, deadline: Option<Tick>) -> Result<()> {
        let index = self.session.next_index();

        if !self.interact.will_submit(step).await {
            tracing::info!("{} abstains from {:?}", self.role, step);
            return self.follow(index).await;
        }

        let payload = match self.prepare(step).await? {
            Some(payload) => payload,
            None => return self.follow(index).await,
        };
        let submission = self.session.submission(self.identity.clone(), payload)?;

        match self.ledger.submit_and_finalize(submission, deadline).await {
            Ok(Observed::Finalized(event)) => {
                tracing::info!("{} finalized {:?} in slot {}", self.role, step, event.index);
                self.absorb(event)
            }
            Ok(Observed::TimedOut) => {
                tracing::warn!("{} missed the deadline for {:?}", self.role, step);
                self.follow(index).await
            }
            Err(e) if e.is_stale() => {
                tracing::debug!("{} lost slot {}: {}", self.role, index, e);
                self.follow(index).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_turn(&mut self, deadline: Option<Tick>, claim: Option<Step>) -> Result<()> {
        let index = self.session.next_index();

        match self.ledger.await_only(index, deadline).await? {
            Observed::Finalized(event) => self.absorb(event),
            Observed::TimedOut => match claim {
                Some(step) => self.claim(step).await,
                None => self.follow(index).await,
            },
        }
    }

    async fn claim(&mut self, step: Step) -> Result<()> {
        let index = self.session.next_index();
        let history = self
            .session
            .history()
            .ok_or_else(|| GameError::InvalidState("claim before proposal".to_string()))?;
        let submission = self
            .session
            .submission(self.identity.clone(), Transition::Forfeit { history })?;

        tracing::warn!("{} claims the escrow with {:?}", self.role, step);
        match self.ledger.submit_and_finalize(submission, None).await {
            Ok(Observed::Finalized(event)) => self.absorb(event),
            Ok(Observed::TimedOut) => self.follow(index).await,
            Err(e) if e.is_stale() => {
                tracing::debug!("{} claim for slot {} lost the race: {}", self.role, index, e);
                self.follow(index).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Wait, without a deadline, for whatever fills slot `index`.
    async fn follow(&mut self, index: u64) -> Result<()> {
        match self.ledger.await_only(index, None).await? {
            Observed::Finalized(event) => self.absorb(event),
            Observed::TimedOut => Err(GameError::InvalidState(format!(
                "slot {} timed out without a deadline",
                index
            ))),
        }
    }

    async fn prepare(&mut self, step: Step) -> Result<Option<Transition>> {
        let history = self.session.history();
        let missing = || GameError::InvalidState(format!("{:?} before proposal", step));

        let payload = match step {
            Step::Propose => Transition::Propose {
                terms: self.interact.get_terms().await?,
            },
            Step::Accept => {
                let history = history.ok_or_else(missing)?;
                if !self.interact.accept_terms(&history.terms).await? {
                    tracing::info!("{} declines the terms", self.role);
                    return Ok(None);
                }
                Transition::Accept { history }
            }
            Step::Commit => {
                let history = history.ok_or_else(missing)?;
                let hand = self.interact.get_hand().await?;
                let salt = self.interact.get_salt().await?;
                let opening = Opening::new(salt, hand);
                self.opening = Some(opening);
                Transition::Commit {
                    history,
                    commitment: HashCommitment::commit(&opening),
                }
            }
            Step::Show => Transition::Show {
                history: history.ok_or_else(missing)?,
                hand: self.interact.get_hand().await?,
            },
            Step::Reveal => {
                let opening = self
                    .opening
                    .ok_or_else(|| GameError::InvalidState("nothing to reveal".to_string()))?;
                Transition::Reveal {
                    history: history.ok_or_else(missing)?,
                    salt: opening.salt,
                    hand: opening.hand,
                }
            }
            claim => {
                return Err(GameError::InvalidState(format!(
                    "{:?} is not a normal step",
                    claim
                )))
            }
        };

        Ok(Some(payload))
    }

    fn absorb(&mut self, event: FinalizedEvent<Transition>) -> Result<()> {
        self.session.absorb(&event)?;

        match &event.payload {
            Transition::Propose { .. } if self.role == Role::Bob => {
                self.interact.partner_identified(&event.from)
            }
            Transition::Accept { .. } if self.role == Role::Alice => {
                self.interact.partner_identified(&event.from)
            }
            Transition::Commit { .. } => self.interact.committed(),
            Transition::Show { hand, .. } => self.interact.revealed(Role::Bob, *hand),
            Transition::Reveal { hand, .. } => self.interact.revealed(Role::Alice, *hand),
            _ => {}
        }

        Ok(())
    }
}
