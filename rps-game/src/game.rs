use crate::deadline::DeadlineArbiter;
use crate::driver::RoleDriver;
use crate::error::{GameError, Result};
use crate::interact::Interact;
use crate::outcome::GameResult;
use crate::session::{Role, Session, Terms, Transition};
use chrono::{DateTime, Utc};
use rps_core::{
    Amount, FinalizedEvent, InMemoryLedger, PartyId, ProtocolConfig, SessionRecord, SessionStore,
    Storage,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const GAME_NAME: &str = "rock-paper-scissors";

/// What a stored session needs besides its event log to be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub config: ProtocolConfig,
    pub alice: PartyId,
    pub bob: PartyId,
    pub terms: Option<Terms>,
}

/// Final state of a played session as the observer saw it.
#[derive(Debug, Clone)]
pub struct Report {
    pub id: Uuid,
    pub result: GameResult,
    pub session: Session,
    pub events: Vec<FinalizedEvent<Transition>>,
    pub alice_balance: Amount,
    pub bob_balance: Amount,
    pub escrow: Amount,
}

/// A report together with the interactions handed back by each role.
#[derive(Debug)]
pub struct Played<A, B, O> {
    pub report: Report,
    pub alice: A,
    pub bob: B,
    pub observer: O,
}

/// A stored session, re-validated against its own rules.
#[derive(Debug, Clone)]
pub struct Replayed {
    pub record: SessionRecord,
    pub metadata: GameMetadata,
    pub session: Session,
    pub events: Vec<FinalizedEvent<Transition>>,
}

/// One session hosted on a process-local ledger.
pub struct Game {
    id: Uuid,
    config: ProtocolConfig,
    ledger: Arc<InMemoryLedger<Session>>,
    alice: PartyId,
    bob: PartyId,
    created_at: DateTime<Utc>,
    clock: Option<JoinHandle<()>>,
}

impl Game {
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        Self::with_parties(config, PartyId::random(), PartyId::random())
    }

    pub fn with_parties(config: ProtocolConfig, alice: PartyId, bob: PartyId) -> Result<Self> {
        config.validate()?;

        let id = Uuid::new_v4();
        let ledger = Arc::new(InMemoryLedger::new(Session::with_config(&config)));
        tracing::info!("Created game {} (window {} ticks)", id, config.window);

        Ok(Self {
            id,
            config,
            ledger,
            alice,
            bob,
            created_at: Utc::now(),
            clock: None,
        })
    }

    /// Rebuild a finished or interrupted game from its stored log.
    pub fn from_log(
        id: Uuid,
        metadata: GameMetadata,
        events: Vec<FinalizedEvent<Transition>>,
    ) -> Result<Self> {
        metadata.config.validate()?;
        let ledger = InMemoryLedger::restore(Session::with_config(&metadata.config), events)?;

        Ok(Self {
            id,
            config: metadata.config,
            ledger: Arc::new(ledger),
            alice: metadata.alice,
            bob: metadata.bob,
            created_at: Utc::now(),
            clock: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<InMemoryLedger<Session>> {
        &self.ledger
    }

    pub fn alice(&self) -> &PartyId {
        &self.alice
    }

    pub fn bob(&self) -> &PartyId {
        &self.bob
    }

    pub fn arbiter(&self) -> DeadlineArbiter {
        DeadlineArbiter::from_config(&self.config)
    }

    /// The ledger's current view of the session.
    pub fn session(&self) -> Session {
        self.ledger.program()
    }

    pub fn metadata(&self) -> GameMetadata {
        GameMetadata {
            config: self.config.clone(),
            alice: self.alice.clone(),
            bob: self.bob.clone(),
            terms: self.session().terms(),
        }
    }

    pub fn fund(&self, role: Role, amount: Amount) -> Result<()> {
        let party = match role {
            Role::Alice => &self.alice,
            Role::Bob => &self.bob,
            Role::Observer => {
                return Err(GameError::Unsupported {
                    role: role.to_string(),
                    action: "hold funds".to_string(),
                })
            }
        };
        self.ledger.fund(party, amount)?;
        tracing::info!("Funded {} ({}) with {}", role, party, amount);
        Ok(())
    }

    pub fn balance_of(&self, role: Role) -> Amount {
        match role {
            Role::Alice => self.ledger.balance_of(&self.alice),
            Role::Bob => self.ledger.balance_of(&self.bob),
            Role::Observer => Amount::ZERO,
        }
    }

    pub fn driver<I: Interact>(
        &self,
        role: Role,
        interact: I,
    ) -> RoleDriver<InMemoryLedger<Session>, I> {
        let identity = match role {
            Role::Alice => self.alice.clone(),
            Role::Bob => self.bob.clone(),
            Role::Observer => PartyId::random(),
        };
        RoleDriver::new(role, identity, self.ledger.clone(), interact, self.arbiter())
    }

    /// Start the background ticker if one is configured. Without it the
    /// ledger clock only moves when submissions are finalized.
    pub fn start_clock(&mut self) {
        if self.clock.is_some() {
            return;
        }
        if let Some(period) = self.config.tick_interval() {
            tracing::debug!("Starting ledger clock every {:?}", period);
            self.clock = Some(self.ledger.spawn_clock(period));
        }
    }

    /// Run all three roles to the end and check that their views agree.
    pub async fn play<A, B, O>(&self, alice: A, bob: B, observer: O) -> Result<Played<A, B, O>>
    where
        A: Interact,
        B: Interact,
        O: Interact,
    {
        let mut alice_driver = self.driver(Role::Alice, alice);
        let mut bob_driver = self.driver(Role::Bob, bob);
        let mut observer_driver = self.driver(Role::Observer, observer);

        tracing::info!("Game {} starting", self.id);
        let (alice_result, bob_result, observer_result) = futures::try_join!(
            alice_driver.run(),
            bob_driver.run(),
            observer_driver.run()
        )?;

        if alice_result != observer_result || bob_result != observer_result {
            return Err(GameError::InvalidState(format!(
                "roles disagree on the result: Alice {}, Bob {}, Observer {}",
                alice_result, bob_result, observer_result
            )));
        }

        let session = observer_driver.session().clone();
        if !session.is_conserved() {
            return Err(GameError::InvalidState(
                "escrow not emptied at session end".to_string(),
            ));
        }

        let report = Report {
            id: self.id,
            result: observer_result,
            session,
            events: self.ledger.events(),
            alice_balance: self.balance_of(Role::Alice),
            bob_balance: self.balance_of(Role::Bob),
            escrow: self.ledger.escrow(),
        };
        tracing::info!("Game {} finished: {}", self.id, report.result);

        Ok(Played {
            report,
            alice: alice_driver.into_interact(),
            bob: bob_driver.into_interact(),
            observer: observer_driver.into_interact(),
        })
    }

    /// Persist the session record and every finalized event so far.
    pub async fn save(&self, storage: &Storage) -> Result<SessionRecord> {
        let store = SessionStore::new(storage);
        let record = SessionRecord {
            id: self.id.to_string(),
            game: GAME_NAME.to_string(),
            created_at: self.created_at,
            metadata: serde_json::to_value(self.metadata()).map_err(rps_core::CoreError::from)?,
            result: self.session().result().map(|result| result.label().to_string()),
        };

        store.save_session(&record).await?;
        store
            .append_events(&record.id, &self.ledger.events())
            .await?;

        tracing::info!("Saved game {} to storage", self.id);
        Ok(record)
    }

    /// Load a stored session and re-validate its log.
    pub async fn replay(storage: &Storage, id: &str) -> Result<Replayed> {
        let store = SessionStore::new(storage);
        let record = store.load_session(id).await?;
        let metadata: GameMetadata = serde_json::from_value(record.metadata.clone())
            .map_err(rps_core::CoreError::from)?;
        let events: Vec<FinalizedEvent<Transition>> = store.load_events(id).await?;

        let ledger = InMemoryLedger::restore(Session::with_config(&metadata.config), events)?;
        let session = ledger.program();
        tracing::debug!("Replayed {} events for game {}", ledger.len(), id);

        Ok(Replayed {
            record,
            metadata,
            session,
            events: ledger.events(),
        })
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
    }
}
