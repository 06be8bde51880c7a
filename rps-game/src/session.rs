//! Escrow session state machine.
//!
//! The same [`Session`] runs inside the ledger, where it validates each
//! submission, and inside every role, where it is rebuilt from the finalized
//! event stream. Both views go through [`Session::apply`], so they can only
//! diverge if the ledger itself misbehaves.

use crate::commitment::{self, Commitment};
use crate::deadline::DeadlineArbiter;
use crate::error::{GameError, ProtocolViolation, Result};
use crate::hand::HandCode;
use crate::outcome::{self, GameResult, Outcome};
use rps_core::{
    Amount, FinalizedEvent, PartyId, Program, ProtocolConfig, Submission, Tick, Transfer,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger step tags. Claims carry their own tag, distinct from the step they replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Propose = 1,
    Accept = 2,
    Commit = 3,
    Show = 4,
    Reveal = 5,
    /// Bob claims after Alice fails to reveal.
    ClaimAfterReveal = 6,
    /// Alice claims after Bob fails to show.
    ClaimAfterShow = 7,
    /// Bob claims after Alice fails to commit.
    ClaimAfterCommit = 8,
    /// Alice claims after Bob fails to accept.
    ClaimAfterAccept = 9,
}

impl Step {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Step> {
        let step = match tag {
            1 => Step::Propose,
            2 => Step::Accept,
            3 => Step::Commit,
            4 => Step::Show,
            5 => Step::Reveal,
            6 => Step::ClaimAfterReveal,
            7 => Step::ClaimAfterShow,
            8 => Step::ClaimAfterCommit,
            9 => Step::ClaimAfterAccept,
            _ => return None,
        };
        Some(step)
    }

    pub fn is_claim(self) -> bool {
        self.tag() >= Step::ClaimAfterReveal.tag()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Proposer: sets the terms, commits, reveals.
    Alice,
    /// Acceptor: matches the wager and shows in the clear.
    Bob,
    /// Follows the session without submitting.
    Observer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Alice => "Alice",
            Role::Bob => "Bob",
            Role::Observer => "Observer",
        };
        f.write_str(name)
    }
}

/// Stakes proposed by Alice.
///
/// Alice deposits `wager + escrow`, Bob matches `wager`. The escrow part
/// always returns to Alice unless she forfeits or loses a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terms {
    pub wager: Amount,
    pub escrow: Amount,
}

impl Terms {
    pub fn new(wager: Amount, escrow: Amount) -> Self {
        Self { wager, escrow }
    }

    pub fn alice_deposit(&self) -> Option<Amount> {
        self.wager.checked_add(self.escrow)
    }

    pub fn bob_deposit(&self) -> Amount {
        self.wager
    }

    /// Full escrow once both parties have funded.
    pub fn pot(&self) -> Option<Amount> {
        self.alice_deposit()?.checked_add(self.bob_deposit())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    AwaitingProposal,
    AwaitingAcceptance,
    AwaitingCommitment,
    AwaitingShow,
    AwaitingReveal,
    Closed(GameResult),
}

impl Phase {
    /// Role whose submission moves the session forward.
    pub fn advancer(self) -> Option<Role> {
        match self {
            Phase::AwaitingProposal | Phase::AwaitingCommitment | Phase::AwaitingReveal => {
                Some(Role::Alice)
            }
            Phase::AwaitingAcceptance | Phase::AwaitingShow => Some(Role::Bob),
            Phase::Closed(_) => None,
        }
    }

    pub fn normal_step(self) -> Option<Step> {
        match self {
            Phase::AwaitingProposal => Some(Step::Propose),
            Phase::AwaitingAcceptance => Some(Step::Accept),
            Phase::AwaitingCommitment => Some(Step::Commit),
            Phase::AwaitingShow => Some(Step::Show),
            Phase::AwaitingReveal => Some(Step::Reveal),
            Phase::Closed(_) => None,
        }
    }

    /// The forfeiture claim that replaces the normal step once its deadline elapses.
    pub fn claim_step(self) -> Option<Step> {
        match self {
            Phase::AwaitingAcceptance => Some(Step::ClaimAfterAccept),
            Phase::AwaitingCommitment => Some(Step::ClaimAfterCommit),
            Phase::AwaitingShow => Some(Step::ClaimAfterShow),
            Phase::AwaitingReveal => Some(Step::ClaimAfterReveal),
            Phase::AwaitingProposal | Phase::Closed(_) => None,
        }
    }

    /// The waiting party, entitled to claim.
    pub fn claimant(self) -> Option<Role> {
        match self.advancer()? {
            _ if self.claim_step().is_none() => None,
            Role::Alice => Some(Role::Bob),
            Role::Bob => Some(Role::Alice),
            Role::Observer => None,
        }
    }

    pub fn forfeit_result(self) -> Option<GameResult> {
        match self.claimant()? {
            Role::Alice => Some(GameResult::BobQuits),
            Role::Bob => Some(GameResult::AliceQuits),
            Role::Observer => None,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Phase::Closed(_))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::AwaitingProposal => f.write_str("awaiting proposal"),
            Phase::AwaitingAcceptance => f.write_str("awaiting acceptance"),
            Phase::AwaitingCommitment => f.write_str("awaiting commitment"),
            Phase::AwaitingShow => f.write_str("awaiting Bob's hand"),
            Phase::AwaitingReveal => f.write_str("awaiting reveal"),
            Phase::Closed(result) => write!(f, "closed ({})", result),
        }
    }
}

/// Fields every later submission must repeat verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    pub alice: PartyId,
    pub terms: Terms,
    pub bob: Option<PartyId>,
    pub commitment: Option<Commitment>,
    pub bob_hand: Option<HandCode>,
}

/// Payload of a ledger submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    Propose {
        terms: Terms,
    },
    Accept {
        history: History,
    },
    Commit {
        history: History,
        commitment: Commitment,
    },
    Show {
        history: History,
        hand: HandCode,
    },
    Reveal {
        history: History,
        salt: commitment::Salt,
        hand: HandCode,
    },
    Forfeit {
        history: History,
    },
}

impl Transition {
    fn history(&self) -> Option<&History> {
        match self {
            Transition::Propose { .. } => None,
            Transition::Accept { history }
            | Transition::Commit { history, .. }
            | Transition::Show { history, .. }
            | Transition::Reveal { history, .. }
            | Transition::Forfeit { history } => Some(history),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Propose { terms } => {
                write!(f, "propose wager={} escrow={}", terms.wager, terms.escrow)
            }
            Transition::Accept { .. } => f.write_str("accept"),
            Transition::Commit { commitment, .. } => {
                write!(f, "commit {}", &commitment.to_hex()[..16])
            }
            Transition::Show { hand, .. } => write!(f, "show {}", hand),
            Transition::Reveal { hand, .. } => write!(f, "reveal {}", hand),
            Transition::Forfeit { .. } => f.write_str("claim forfeit"),
        }
    }
}

/// A finalized transition as recorded in the session's own log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub index: u64,
    pub step: Step,
    pub from: PartyId,
    pub tick: Tick,
}

/// What a role should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duty {
    /// This role advances the session.
    Submit { step: Step, deadline: Option<Tick> },
    /// Someone else advances; `claim` is set when this role may claim after `deadline`.
    Await {
        deadline: Option<Tick>,
        claim: Option<Step>,
    },
    Done(GameResult),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    arbiter: DeadlineArbiter,
    phase: Phase,
    terms: Option<Terms>,
    alice: Option<PartyId>,
    bob: Option<PartyId>,
    commitment: Option<Commitment>,
    bob_hand: Option<HandCode>,
    alice_hand: Option<HandCode>,
    stake_a: Amount,
    stake_b: Amount,
    balance: Amount,
    deadline: Option<Tick>,
    payouts: Vec<Transfer>,
    journal: Vec<JournalEntry>,
}

impl Session {
    pub fn new(arbiter: DeadlineArbiter) -> Self {
        Self {
            arbiter,
            phase: Phase::AwaitingProposal,
            terms: None,
            alice: None,
            bob: None,
            commitment: None,
            bob_hand: None,
            alice_hand: None,
            stake_a: Amount::ZERO,
            stake_b: Amount::ZERO,
            balance: Amount::ZERO,
            deadline: None,
            payouts: Vec::new(),
            journal: Vec::new(),
        }
    }

    pub fn with_config(config: &ProtocolConfig) -> Self {
        Self::new(DeadlineArbiter::from_config(config))
    }

    /// Rebuild a session from a finalized log.
    pub fn replay(arbiter: DeadlineArbiter, events: &[FinalizedEvent<Transition>]) -> Result<Self> {
        let mut session = Self::new(arbiter);
        for event in events {
            session.absorb(event)?;
        }
        Ok(session)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn result(&self) -> Option<GameResult> {
        match self.phase {
            Phase::Closed(result) => Some(result),
            _ => None,
        }
    }

    pub fn terms(&self) -> Option<Terms> {
        self.terms
    }

    pub fn alice(&self) -> Option<&PartyId> {
        self.alice.as_ref()
    }

    pub fn bob(&self) -> Option<&PartyId> {
        self.bob.as_ref()
    }

    pub fn commitment(&self) -> Option<&Commitment> {
        self.commitment.as_ref()
    }

    pub fn bob_hand(&self) -> Option<HandCode> {
        self.bob_hand
    }

    pub fn alice_hand(&self) -> Option<HandCode> {
        self.alice_hand
    }

    pub fn stake_a(&self) -> Amount {
        self.stake_a
    }

    pub fn stake_b(&self) -> Amount {
        self.stake_b
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn deadline(&self) -> Option<Tick> {
        self.deadline
    }

    pub fn arbiter(&self) -> &DeadlineArbiter {
        &self.arbiter
    }

    pub fn payouts(&self) -> &[Transfer] {
        &self.payouts
    }

    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// Ordering slot the next submission must fill.
    pub fn next_index(&self) -> u64 {
        self.journal.len() as u64
    }

    /// Escrow equals the deposits while open and is empty once closed.
    pub fn is_conserved(&self) -> bool {
        if self.phase.is_closed() {
            return self.balance.is_zero();
        }
        self.stake_a.checked_add(self.stake_b) == Some(self.balance)
    }

    pub fn history(&self) -> Option<History> {
        Some(History {
            alice: self.alice.clone()?,
            terms: self.terms?,
            bob: self.bob.clone(),
            commitment: self.commitment,
            bob_hand: self.bob_hand,
        })
    }

    pub fn duty(&self, role: Role) -> Duty {
        if let Phase::Closed(result) = self.phase {
            return Duty::Done(result);
        }

        match (self.phase.advancer(), self.phase.normal_step()) {
            (Some(advancer), Some(step)) if advancer == role => Duty::Submit {
                step,
                deadline: self.deadline,
            },
            _ => Duty::Await {
                deadline: self.deadline,
                claim: if self.phase.claimant() == Some(role) {
                    self.phase.claim_step()
                } else {
                    None
                },
            },
        }
    }

    /// Step a payload would take in the current phase, if it is legal at all.
    fn expected_step(&self, payload: &Transition) -> Option<Step> {
        match (self.phase, payload) {
            (Phase::AwaitingProposal, Transition::Propose { .. }) => Some(Step::Propose),
            (Phase::AwaitingAcceptance, Transition::Accept { .. }) => Some(Step::Accept),
            (Phase::AwaitingCommitment, Transition::Commit { .. }) => Some(Step::Commit),
            (Phase::AwaitingShow, Transition::Show { .. }) => Some(Step::Show),
            (Phase::AwaitingReveal, Transition::Reveal { .. }) => Some(Step::Reveal),
            (phase, Transition::Forfeit { .. }) => phase.claim_step(),
            _ => None,
        }
    }

    fn required_payment(
        &self,
        payload: &Transition,
    ) -> std::result::Result<Amount, ProtocolViolation> {
        match payload {
            Transition::Propose { terms } => {
                terms.pot().ok_or(ProtocolViolation::AmountOverflow)?;
                terms.alice_deposit().ok_or(ProtocolViolation::AmountOverflow)
            }
            Transition::Accept { .. } => self
                .terms
                .map(|terms| terms.bob_deposit())
                .ok_or(ProtocolViolation::HistoryMismatch),
            _ => Ok(Amount::ZERO),
        }
    }

    /// Build the submission `from` would send to take `payload` now.
    pub fn submission(
        &self,
        from: PartyId,
        payload: Transition,
    ) -> std::result::Result<Submission<Transition>, ProtocolViolation> {
        if self.phase.is_closed() {
            return Err(ProtocolViolation::Terminal);
        }
        let step = self
            .expected_step(&payload)
            .ok_or(ProtocolViolation::IllegalTransition { phase: self.phase })?;
        let payment = self.required_payment(&payload)?;

        Ok(Submission {
            index: self.next_index(),
            tag: step.tag(),
            from,
            payment,
            payload,
        })
    }

    /// Validate and apply one submission at ledger time `now`.
    ///
    /// Nothing is mutated unless every check passes.
    pub fn apply(
        &mut self,
        submission: &Submission<Transition>,
        now: Tick,
    ) -> std::result::Result<Vec<Transfer>, ProtocolViolation> {
        if self.phase.is_closed() {
            return Err(ProtocolViolation::Terminal);
        }

        let step = self
            .expected_step(&submission.payload)
            .filter(|step| step.tag() == submission.tag && submission.index == self.next_index())
            .ok_or(ProtocolViolation::OutOfOrder {
                tag: submission.tag,
                phase: self.phase,
            })?;

        let expected_payment = self.required_payment(&submission.payload)?;
        if submission.payment != expected_payment {
            return Err(ProtocolViolation::PaymentMismatch {
                expected: expected_payment,
                actual: submission.payment,
            });
        }

        if let Some(history) = submission.payload.history() {
            if self.history().as_ref() != Some(history) {
                return Err(ProtocolViolation::HistoryMismatch);
            }
        }

        if !step.is_claim() {
            self.arbiter.check_on_time(self.deadline, now)?;
        }

        let transfers = match &submission.payload {
            Transition::Forfeit { .. } => return self.apply_claim(submission, step, now),
            Transition::Propose { terms } => {
                self.alice = Some(submission.from.clone());
                self.terms = Some(*terms);
                self.stake_a = submission.payment;
                self.balance = submission.payment;
                self.phase = Phase::AwaitingAcceptance;
                tracing::debug!(
                    "{} proposed wager {} with escrow {}",
                    submission.from,
                    terms.wager,
                    terms.escrow
                );
                Vec::new()
            }
            Transition::Accept { .. } => {
                let balance = self
                    .balance
                    .checked_add(submission.payment)
                    .ok_or(ProtocolViolation::AmountOverflow)?;
                self.bob = Some(submission.from.clone());
                self.stake_b = submission.payment;
                self.balance = balance;
                self.phase = Phase::AwaitingCommitment;
                tracing::debug!("{} accepted and matched the wager", submission.from);
                Vec::new()
            }
            Transition::Commit { commitment, .. } => {
                self.expect_sender(self.alice.as_ref(), &submission.from)?;
                self.commitment = Some(*commitment);
                self.phase = Phase::AwaitingShow;
                tracing::debug!("Alice committed {}", commitment);
                Vec::new()
            }
            Transition::Show { hand, .. } => {
                self.expect_sender(self.bob.as_ref(), &submission.from)?;
                self.bob_hand = Some(*hand);
                self.phase = Phase::AwaitingReveal;
                tracing::debug!("Bob showed {}", hand);
                Vec::new()
            }
            Transition::Reveal { salt, hand, .. } => {
                self.expect_sender(self.alice.as_ref(), &submission.from)?;
                let committed = self.commitment.ok_or(ProtocolViolation::HistoryMismatch)?;
                let bob_hand = self.bob_hand.ok_or(ProtocolViolation::HistoryMismatch)?;
                if !commitment::verify(&committed, *salt, *hand) {
                    tracing::warn!("Reveal from {} does not open the commitment", submission.from);
                    return Err(ProtocolViolation::CommitmentMismatch);
                }

                let outcome = outcome::resolve(*hand, bob_hand);
                let transfers = self.settle(outcome)?;
                self.alice_hand = Some(*hand);
                self.close(GameResult::from(outcome), transfers.clone());
                tracing::debug!("Alice revealed {} against {}: {:?}", hand, bob_hand, outcome);
                transfers
            }
        };

        self.record(submission, step, now);
        Ok(transfers)
    }

    fn apply_claim(
        &mut self,
        submission: &Submission<Transition>,
        step: Step,
        now: Tick,
    ) -> std::result::Result<Vec<Transfer>, ProtocolViolation> {
        let claimant = match self.phase.claimant() {
            Some(Role::Alice) => self.alice.as_ref(),
            Some(Role::Bob) => self.bob.as_ref(),
            _ => None,
        };
        self.expect_sender(claimant, &submission.from)?;

        let deadline = self.deadline.ok_or(ProtocolViolation::OutOfOrder {
            tag: submission.tag,
            phase: self.phase,
        })?;
        self.arbiter.check_claim(deadline, now)?;

        let result = self
            .phase
            .forfeit_result()
            .ok_or(ProtocolViolation::OutOfOrder {
                tag: submission.tag,
                phase: self.phase,
            })?;

        let transfers = payout(&submission.from, self.balance);
        tracing::debug!(
            "{} claimed {} after deadline {}: {}",
            submission.from,
            self.balance,
            deadline,
            result
        );
        self.close(result, transfers.clone());
        self.record(submission, step, now);
        Ok(transfers)
    }

    fn expect_sender(
        &self,
        expected: Option<&PartyId>,
        actual: &PartyId,
    ) -> std::result::Result<(), ProtocolViolation> {
        match expected {
            Some(expected) if expected == actual => Ok(()),
            Some(expected) => Err(ProtocolViolation::WrongSender {
                expected: expected.clone(),
                actual: actual.clone(),
            }),
            None => Err(ProtocolViolation::HistoryMismatch),
        }
    }

    /// Split the full escrow according to the outcome.
    fn settle(&self, outcome: Outcome) -> std::result::Result<Vec<Transfer>, ProtocolViolation> {
        let (alice, bob, terms) = match (&self.alice, &self.bob, self.terms) {
            (Some(alice), Some(bob), Some(terms)) => (alice, bob, terms),
            _ => return Err(ProtocolViolation::HistoryMismatch),
        };

        let bob_share = match outcome {
            Outcome::AliceWins => Amount::ZERO,
            Outcome::Draw => terms.wager,
            Outcome::BobWins => terms
                .wager
                .checked_mul(2)
                .ok_or(ProtocolViolation::AmountOverflow)?,
        };
        let alice_share = self
            .balance
            .checked_sub(bob_share)
            .ok_or(ProtocolViolation::AmountOverflow)?;

        let mut transfers = payout(alice, alice_share);
        transfers.extend(payout(bob, bob_share));
        Ok(transfers)
    }

    fn close(&mut self, result: GameResult, transfers: Vec<Transfer>) {
        self.phase = Phase::Closed(result);
        self.balance = Amount::ZERO;
        self.payouts = transfers;
    }

    fn record(&mut self, submission: &Submission<Transition>, step: Step, now: Tick) {
        self.journal.push(JournalEntry {
            index: submission.index,
            step,
            from: submission.from.clone(),
            tick: now,
        });
        self.deadline = if self.phase.is_closed() {
            None
        } else if self.phase.claim_step().is_some() {
            Some(self.arbiter.deadline_after(now))
        } else {
            None
        };
    }

    /// Fold a finalized event into this view of the session.
    pub fn absorb(&mut self, event: &FinalizedEvent<Transition>) -> Result<()> {
        let transfers = self
            .apply(&event.submission(), event.tick)
            .map_err(|violation| GameError::Desync {
                index: event.index,
                reason: violation.to_string(),
            })?;

        if transfers != event.transfers || self.balance != event.escrow {
            return Err(GameError::Desync {
                index: event.index,
                reason: "settlement differs from ledger".to_string(),
            });
        }

        Ok(())
    }
}

fn payout(to: &PartyId, amount: Amount) -> Vec<Transfer> {
    if amount.is_zero() {
        Vec::new()
    } else {
        vec![Transfer::new(to.clone(), amount)]
    }
}

impl Program for Session {
    type Payload = Transition;
    type Rejection = ProtocolViolation;

    fn apply(
        &mut self,
        submission: &Submission<Transition>,
        now: Tick,
    ) -> std::result::Result<Vec<Transfer>, ProtocolViolation> {
        Session::apply(self, submission, now)
    }

    fn is_terminal(&self) -> bool {
        self.phase.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::Salt;
    use crate::hand::Hand;

    fn alice() -> PartyId {
        PartyId::new("alice")
    }

    fn bob() -> PartyId {
        PartyId::new("bob")
    }

    fn terms() -> Terms {
        Terms::new(Amount::from_units(10), Amount::from_units(3))
    }

    fn units(n: u64) -> Amount {
        Amount::from_units(n)
    }

    fn submit(
        session: &mut Session,
        from: PartyId,
        payload: Transition,
        now: u64,
    ) -> std::result::Result<Vec<Transfer>, ProtocolViolation> {
        let submission = session.submission(from, payload)?;
        session.apply(&submission, Tick::new(now))
    }

    fn history(session: &Session) -> History {
        session.history().unwrap()
    }

    /// Session funded by both parties, with Alice committed to `hand`.
    fn committed(hand: HandCode, salt: Salt) -> Session {
        let mut session = Session::new(DeadlineArbiter::default());
        submit(&mut session, alice(), Transition::Propose { terms: terms() }, 0).unwrap();
        let accept = Transition::Accept {
            history: history(&session),
        };
        submit(&mut session, bob(), accept, 1).unwrap();
        let commit = Transition::Commit {
            history: history(&session),
            commitment: commitment::commit(salt, hand),
        };
        submit(&mut session, alice(), commit, 2).unwrap();
        session
    }

    fn shown(alice_hand: HandCode, bob_hand: HandCode, salt: Salt) -> Session {
        let mut session = committed(alice_hand, salt);
        let show = Transition::Show {
            history: history(&session),
            hand: bob_hand,
        };
        submit(&mut session, bob(), show, 3).unwrap();
        session
    }

    fn reveal(
        session: &mut Session,
        salt: Salt,
        hand: HandCode,
    ) -> std::result::Result<Vec<Transfer>, ProtocolViolation> {
        let payload = Transition::Reveal {
            history: history(session),
            salt,
            hand,
        };
        submit(session, alice(), payload, 4)
    }

    #[test]
    fn test_honest_round_alice_wins() {
        let salt = Salt::random();
        let mut session = committed(Hand::Rock.code(), salt);
        assert_eq!(session.phase(), Phase::AwaitingShow);
        assert_eq!(session.stake_a(), units(13));
        assert_eq!(session.stake_b(), units(10));
        assert_eq!(session.balance(), units(23));
        assert!(session.is_conserved());
        assert_eq!(session.deadline(), Some(Tick::new(12)));

        let show = Transition::Show {
            history: history(&session),
            hand: Hand::Scissors.code(),
        };
        submit(&mut session, bob(), show, 3).unwrap();
        assert!(session.is_conserved());

        let transfers = reveal(&mut session, salt, Hand::Rock.code()).unwrap();
        assert_eq!(session.result(), Some(GameResult::AliceWins));
        assert_eq!(transfers, vec![Transfer::new(alice(), units(23))]);
        assert_eq!(session.balance(), Amount::ZERO);
        assert!(session.is_conserved());
        assert_eq!(session.journal().len(), 5);
        assert_eq!(session.deadline(), None);
    }

    #[test]
    fn test_settlement_splits() {
        let salt = Salt::random();

        let mut bob_wins = shown(Hand::Rock.code(), Hand::Paper.code(), salt);
        let transfers = reveal(&mut bob_wins, salt, Hand::Rock.code()).unwrap();
        assert_eq!(bob_wins.result(), Some(GameResult::BobWins));
        assert_eq!(
            transfers,
            vec![Transfer::new(alice(), units(3)), Transfer::new(bob(), units(20))]
        );

        let mut draw = shown(Hand::Paper.code(), Hand::Paper.code(), salt);
        let transfers = reveal(&mut draw, salt, Hand::Paper.code()).unwrap();
        assert_eq!(draw.result(), Some(GameResult::Draw));
        assert_eq!(
            transfers,
            vec![Transfer::new(alice(), units(13)), Transfer::new(bob(), units(10))]
        );
    }

    #[test]
    fn test_malformed_reveal_loses() {
        let salt = Salt::random();
        let mut session = shown(HandCode(5), Hand::Paper.code(), salt);

        let transfers = reveal(&mut session, salt, HandCode(5)).unwrap();
        assert_eq!(session.result(), Some(GameResult::BobWins));
        assert_eq!(session.alice_hand(), Some(HandCode(5)));
        assert_eq!(transfers.iter().map(|t| t.amount.to_units()).sum::<u64>(), 23);
    }

    #[test]
    fn test_malformed_show_loses() {
        let salt = Salt::random();
        let mut session = shown(Hand::Scissors.code(), HandCode(9), salt);
        reveal(&mut session, salt, Hand::Scissors.code()).unwrap();
        assert_eq!(session.result(), Some(GameResult::AliceWins));
    }

    #[test]
    fn test_failed_verification_rejected_without_change() {
        let salt = Salt::random();
        let mut session = shown(Hand::Rock.code(), Hand::Scissors.code(), salt);
        let before = session.clone();

        assert_eq!(
            reveal(&mut session, salt, Hand::Paper.code()),
            Err(ProtocolViolation::CommitmentMismatch)
        );
        assert_eq!(
            reveal(&mut session, Salt::random(), Hand::Rock.code()),
            Err(ProtocolViolation::CommitmentMismatch)
        );
        assert_eq!(session.phase(), Phase::AwaitingReveal);
        assert_eq!(session.journal(), before.journal());
        assert_eq!(session.balance(), units(23));

        // Only the timeout path remains
        let deadline = session.deadline().unwrap();
        let claim = Transition::Forfeit {
            history: history(&session),
        };
        let transfers = submit(&mut session, bob(), claim, deadline.value()).unwrap();
        assert_eq!(session.result(), Some(GameResult::AliceQuits));
        assert_eq!(transfers, vec![Transfer::new(bob(), units(23))]);
    }

    #[test]
    fn test_payment_must_match_terms() {
        let mut session = Session::new(DeadlineArbiter::default());
        let mut propose = session
            .submission(alice(), Transition::Propose { terms: terms() })
            .unwrap();
        assert_eq!(propose.payment, units(13));

        propose.payment = units(12);
        assert_eq!(
            session.apply(&propose, Tick::ZERO),
            Err(ProtocolViolation::PaymentMismatch {
                expected: units(13),
                actual: units(12)
            })
        );
        assert_eq!(session.phase(), Phase::AwaitingProposal);

        propose.payment = units(13);
        session.apply(&propose, Tick::ZERO).unwrap();

        let mut accept = session
            .submission(bob(), Transition::Accept { history: history(&session) })
            .unwrap();
        accept.payment = units(13);
        assert!(matches!(
            session.apply(&accept, Tick::new(1)),
            Err(ProtocolViolation::PaymentMismatch { .. })
        ));
        assert_eq!(session.balance(), units(13));
    }

    #[test]
    fn test_substituted_history_rejected() {
        let mut session = Session::new(DeadlineArbiter::default());
        submit(&mut session, alice(), Transition::Propose { terms: terms() }, 0).unwrap();

        let mut forged = history(&session);
        forged.terms.wager = units(1);
        let accept = Submission {
            index: 1,
            tag: Step::Accept.tag(),
            from: bob(),
            payment: units(10),
            payload: Transition::Accept { history: forged },
        };
        assert_eq!(
            session.apply(&accept, Tick::new(1)),
            Err(ProtocolViolation::HistoryMismatch)
        );
    }

    #[test]
    fn test_only_bound_identities_advance() {
        let salt = Salt::random();
        let mut session = committed(Hand::Rock.code(), salt);
        let show = Transition::Show {
            history: history(&session),
            hand: Hand::Rock.code(),
        };
        assert!(matches!(
            submit(&mut session, PartyId::new("mallory"), show, 3),
            Err(ProtocolViolation::WrongSender { .. })
        ));
    }

    #[test]
    fn test_out_of_order_tag_rejected() {
        let mut session = Session::new(DeadlineArbiter::default());
        let mut propose = session
            .submission(alice(), Transition::Propose { terms: terms() })
            .unwrap();
        propose.tag = Step::Commit.tag();
        assert!(matches!(
            session.apply(&propose, Tick::ZERO),
            Err(ProtocolViolation::OutOfOrder { tag: 3, .. })
        ));

        assert!(matches!(
            session.submission(bob(), Transition::Show {
                history: History {
                    alice: alice(),
                    terms: terms(),
                    bob: None,
                    commitment: None,
                    bob_hand: None,
                },
                hand: HandCode(0),
            }),
            Err(ProtocolViolation::IllegalTransition { .. })
        ));
    }

    #[test]
    fn test_bob_silent_after_commit() {
        let salt = Salt::random();
        let mut session = committed(Hand::Paper.code(), salt);
        let deadline = session.deadline().unwrap();
        let claim = Transition::Forfeit {
            history: history(&session),
        };

        assert_eq!(
            submit(&mut session, alice(), claim.clone(), deadline.value() - 1),
            Err(ProtocolViolation::PrematureClaim {
                deadline,
                now: Tick::new(deadline.value() - 1)
            })
        );
        assert!(matches!(
            submit(&mut session, bob(), claim.clone(), deadline.value()),
            Err(ProtocolViolation::WrongSender { .. })
        ));

        let show = Transition::Show {
            history: history(&session),
            hand: Hand::Rock.code(),
        };
        let late_show = session.submission(bob(), show).unwrap();
        assert!(matches!(
            session.apply(&late_show, deadline),
            Err(ProtocolViolation::Late { .. })
        ));

        let transfers = submit(&mut session, alice(), claim, deadline.value()).unwrap();
        assert_eq!(session.result(), Some(GameResult::BobQuits));
        assert_eq!(transfers, vec![Transfer::new(alice(), units(23))]);
        assert!(session.is_conserved());

        assert_eq!(
            session.apply(&late_show, deadline.plus(1)),
            Err(ProtocolViolation::Terminal)
        );
        assert_eq!(session.result(), Some(GameResult::BobQuits));
    }

    #[test]
    fn test_alice_silent_after_acceptance() {
        let mut session = Session::new(DeadlineArbiter::default());
        submit(&mut session, alice(), Transition::Propose { terms: terms() }, 0).unwrap();
        let accept = Transition::Accept {
            history: history(&session),
        };
        submit(&mut session, bob(), accept, 1).unwrap();
        let deadline = session.deadline().unwrap();
        assert_eq!(deadline, Tick::new(11));

        let claim = Transition::Forfeit {
            history: history(&session),
        };
        assert_eq!(
            submit(&mut session, bob(), claim.clone(), deadline.value() - 1),
            Err(ProtocolViolation::PrematureClaim {
                deadline,
                now: Tick::new(deadline.value() - 1)
            })
        );
        assert!(matches!(
            submit(&mut session, alice(), claim.clone(), deadline.value()),
            Err(ProtocolViolation::WrongSender { .. })
        ));

        let submission = session.submission(bob(), claim).unwrap();
        assert_eq!(submission.tag, Step::ClaimAfterCommit.tag());
        assert_eq!(submission.payment, Amount::ZERO);

        let transfers = session.apply(&submission, deadline).unwrap();
        assert_eq!(session.result(), Some(GameResult::AliceQuits));
        assert_eq!(transfers, vec![Transfer::new(bob(), units(23))]);
        assert!(session.is_conserved());
    }

    #[test]
    fn test_claim_before_acceptance_refunds_alice() {
        let mut session = Session::new(DeadlineArbiter::new(3));
        submit(&mut session, alice(), Transition::Propose { terms: terms() }, 5).unwrap();
        assert!(session.is_conserved());
        assert_eq!(session.deadline(), Some(Tick::new(8)));

        let claim = Transition::Forfeit {
            history: history(&session),
        };
        let submission = session.submission(alice(), claim).unwrap();
        assert_eq!(submission.tag, Step::ClaimAfterAccept.tag());
        assert_eq!(submission.payment, Amount::ZERO);

        let transfers = session.apply(&submission, Tick::new(8)).unwrap();
        assert_eq!(session.result(), Some(GameResult::BobQuits));
        assert_eq!(transfers, vec![Transfer::new(alice(), units(13))]);
    }

    #[test]
    fn test_duties_follow_phase() {
        let salt = Salt::random();
        let session = committed(Hand::Rock.code(), salt);
        let deadline = session.deadline();

        assert_eq!(
            session.duty(Role::Bob),
            Duty::Submit {
                step: Step::Show,
                deadline
            }
        );
        assert_eq!(
            session.duty(Role::Alice),
            Duty::Await {
                deadline,
                claim: Some(Step::ClaimAfterShow)
            }
        );
        assert_eq!(
            session.duty(Role::Observer),
            Duty::Await {
                deadline,
                claim: None
            }
        );
        assert_eq!(
            Session::new(DeadlineArbiter::default()).duty(Role::Bob),
            Duty::Await {
                deadline: None,
                claim: None
            }
        );
    }

    #[test]
    fn test_overflowing_terms_rejected() {
        let session = Session::new(DeadlineArbiter::default());
        let terms = Terms::new(units(u64::MAX / 2 + 1), Amount::ZERO);
        assert_eq!(
            session
                .submission(alice(), Transition::Propose { terms })
                .unwrap_err(),
            ProtocolViolation::AmountOverflow
        );
    }
}
