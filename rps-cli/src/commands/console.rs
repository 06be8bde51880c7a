use async_trait::async_trait;
use rps_core::PartyId;
use rps_game::{GameResult, HandCode, Interact, Role, Salt, ScriptedInteract, Step, Terms};

use super::short;

/// Scripted answers for one role, with every notification printed to the console.
pub struct ConsoleInteract {
    role: Role,
    inner: ScriptedInteract,
}

impl ConsoleInteract {
    pub fn new(role: Role, inner: ScriptedInteract) -> Self {
        Self { role, inner }
    }

    pub fn observer() -> Self {
        Self::new(Role::Observer, ScriptedInteract::new())
    }

    fn say(&self, message: impl std::fmt::Display) {
        println!("[{}] {}", self.role, message);
    }
}

#[async_trait]
impl Interact for ConsoleInteract {
    async fn get_terms(&mut self) -> rps_game::Result<Terms> {
        self.inner.get_terms().await
    }

    async fn accept_terms(&mut self, terms: &Terms) -> rps_game::Result<bool> {
        let accepted = self.inner.accept_terms(terms).await?;
        if accepted {
            self.say(format!("accepts wager {}", terms.wager));
        }
        Ok(accepted)
    }

    async fn get_hand(&mut self) -> rps_game::Result<HandCode> {
        self.inner.get_hand().await
    }

    async fn get_salt(&mut self) -> rps_game::Result<Salt> {
        self.inner.get_salt().await
    }

    async fn will_submit(&mut self, step: Step) -> bool {
        let submit = self.inner.will_submit(step).await;
        if !submit {
            self.say(format!("stays silent at {:?}", step));
        }
        submit
    }

    fn partner_identified(&mut self, partner: &PartyId) {
        self.say(format!("playing against {}", short(partner.as_str())));
    }

    fn committed(&mut self) {
        self.say("Alice committed to a hand");
    }

    fn revealed(&mut self, by: Role, hand: HandCode) {
        self.say(format!("{} played {}", by, hand));
    }

    fn session_ended(&mut self, result: GameResult) {
        self.say(format!("session over: {}", result));
    }
}
