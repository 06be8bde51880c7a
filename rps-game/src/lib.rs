//! Commit-reveal rock-paper-scissors wager
//!
//! Alice proposes stakes and commits to a hidden hand, Bob matches the wager
//! and shows his hand in the clear, then Alice reveals. The escrow session runs
//! on an order-enforcing ledger, and a party who stops answering forfeits the
//! escrow to the other once the deadline passes.

pub mod commitment;
pub mod deadline;
pub mod driver;
pub mod error;
pub mod game;
pub mod hand;
pub mod interact;
pub mod outcome;
pub mod session;

pub use commitment::{Commitment, CommitmentScheme, HashCommitment, Opening, Salt};
pub use deadline::DeadlineArbiter;
pub use driver::RoleDriver;
pub use error::{GameError, ProtocolViolation, Result};
pub use game::{Game, GameMetadata, Played, Replayed, Report, GAME_NAME};
pub use hand::{Hand, HandCode};
pub use interact::{Interact, Notice, Passive, ScriptedInteract};
pub use outcome::{resolve, GameResult, Outcome};
pub use session::{Duty, History, Phase, Role, Session, Step, Terms, Transition};

use rps_core::ProtocolConfig;

/// Create a game with both parties funded for the given stakes.
pub fn create_game(config: ProtocolConfig, terms: Terms) -> Result<Game> {
    let game = Game::new(config)?;
    let alice_deposit = terms.alice_deposit().ok_or(ProtocolViolation::AmountOverflow)?;
    game.fund(Role::Alice, alice_deposit)?;
    game.fund(Role::Bob, terms.bob_deposit())?;
    Ok(game)
}
