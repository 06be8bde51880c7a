use crate::commitment::Salt;
use crate::error::{GameError, Result};
use crate::hand::HandCode;
use crate::outcome::GameResult;
use crate::session::{Role, Step, Terms};
use async_trait::async_trait;
use rps_core::PartyId;

/// Inputs a role needs from its user, plus notifications that never affect the protocol.
#[async_trait]
pub trait Interact: Send {
    /// Stakes to propose. Alice only.
    async fn get_terms(&mut self) -> Result<Terms> {
        Err(GameError::interaction("no terms to propose"))
    }

    /// Whether to match the proposed wager. Declining lets the deadline lapse.
    async fn accept_terms(&mut self, _terms: &Terms) -> Result<bool> {
        Ok(true)
    }

    async fn get_hand(&mut self) -> Result<HandCode> {
        Err(GameError::interaction("no hand to play"))
    }

    async fn get_salt(&mut self) -> Result<Salt> {
        Ok(Salt::random())
    }

    /// Returning false abstains from `step`, ceding the stake through the timeout path.
    async fn will_submit(&mut self, _step: Step) -> bool {
        true
    }

    fn partner_identified(&mut self, _partner: &PartyId) {}

    fn committed(&mut self) {}

    fn revealed(&mut self, _by: Role, _hand: HandCode) {}

    fn session_ended(&mut self, _result: GameResult) {}
}

/// Interaction for the observer role, which never submits.
#[derive(Debug, Default, Clone)]
pub struct Passive;

#[async_trait]
impl Interact for Passive {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    PartnerIdentified(PartyId),
    Committed,
    Revealed(Role, HandCode),
    Ended(GameResult),
}

/// Canned answers, with every notification recorded.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInteract {
    terms: Option<Terms>,
    hand: Option<HandCode>,
    salt: Option<Salt>,
    decline: bool,
    abstain: Option<Step>,
    notices: Vec<Notice>,
}

impl ScriptedInteract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_terms(mut self, terms: Terms) -> Self {
        self.terms = Some(terms);
        self
    }

    pub fn with_hand(mut self, hand: impl Into<HandCode>) -> Self {
        self.hand = Some(hand.into());
        self
    }

    pub fn with_salt(mut self, salt: Salt) -> Self {
        self.salt = Some(salt);
        self
    }

    pub fn declining(mut self) -> Self {
        self.decline = true;
        self
    }

    pub fn abstaining_at(mut self, step: Step) -> Self {
        self.abstain = Some(step);
        self
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }
}

#[async_trait]
impl Interact for ScriptedInteract {
    async fn get_terms(&mut self) -> Result<Terms> {
        self.terms
            .ok_or_else(|| GameError::interaction("no terms scripted"))
    }

    async fn accept_terms(&mut self, _terms: &Terms) -> Result<bool> {
        Ok(!self.decline)
    }

    async fn get_hand(&mut self) -> Result<HandCode> {
        self.hand
            .ok_or_else(|| GameError::interaction("no hand scripted"))
    }

    async fn get_salt(&mut self) -> Result<Salt> {
        Ok(self.salt.unwrap_or_else(Salt::random))
    }

    async fn will_submit(&mut self, step: Step) -> bool {
        self.abstain != Some(step)
    }

    fn partner_identified(&mut self, partner: &PartyId) {
        self.notices.push(Notice::PartnerIdentified(partner.clone()));
    }

    fn committed(&mut self) {
        self.notices.push(Notice::Committed);
    }

    fn revealed(&mut self, by: Role, hand: HandCode) {
        self.notices.push(Notice::Revealed(by, hand));
    }

    fn session_ended(&mut self, result: GameResult) {
        self.notices.push(Notice::Ended(result));
    }
}
