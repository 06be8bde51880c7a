use crate::hand::HandCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of comparing two disclosed hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    BobWins = 0,
    Draw = 1,
    AliceWins = 2,
}

impl Outcome {
    fn from_raw(raw: u64) -> Self {
        match raw {
            0 => Outcome::BobWins,
            1 => Outcome::Draw,
            _ => Outcome::AliceWins,
        }
    }
}

/// `(a - b + 1) mod 3`, computed without leaving unsigned range.
pub fn raw_outcome(a: u64, b: u64) -> u64 {
    (a % 3 + 4 - b % 3) % 3
}

/// Decide the round from both disclosed hands.
///
/// A malformed hand loses against a valid one; two malformed hands draw.
pub fn resolve(alice: HandCode, bob: HandCode) -> Outcome {
    match (alice.is_valid(), bob.is_valid()) {
        (true, true) => Outcome::from_raw(raw_outcome(alice.0, bob.0)),
        (true, false) => Outcome::AliceWins,
        (false, true) => Outcome::BobWins,
        (false, false) => Outcome::Draw,
    }
}

/// How a session ended. Assigned exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    BobWins,
    Draw,
    AliceWins,
    AliceQuits,
    BobQuits,
}

impl GameResult {
    pub fn label(self) -> &'static str {
        match self {
            GameResult::BobWins => "Bob wins",
            GameResult::Draw => "Draw",
            GameResult::AliceWins => "Alice wins",
            GameResult::AliceQuits => "Alice quits",
            GameResult::BobQuits => "Bob quits",
        }
    }

    pub fn is_forfeit(self) -> bool {
        matches!(self, GameResult::AliceQuits | GameResult::BobQuits)
    }
}

impl From<Outcome> for GameResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::BobWins => GameResult::BobWins,
            Outcome::Draw => GameResult::Draw,
            Outcome::AliceWins => GameResult::AliceWins,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Hand::{self, Paper, Rock, Scissors};

    fn play(a: Hand, b: Hand) -> Outcome {
        resolve(a.code(), b.code())
    }

    #[test]
    fn test_winning_pairs() {
        assert_eq!(play(Rock, Scissors), Outcome::AliceWins);
        assert_eq!(play(Scissors, Paper), Outcome::AliceWins);
        assert_eq!(play(Paper, Rock), Outcome::AliceWins);

        assert_eq!(play(Scissors, Rock), Outcome::BobWins);
        assert_eq!(play(Paper, Scissors), Outcome::BobWins);
        assert_eq!(play(Rock, Paper), Outcome::BobWins);

        for hand in Hand::ALL {
            assert_eq!(play(hand, hand), Outcome::Draw);
        }
    }

    #[test]
    fn test_rotation_symmetry() {
        for a in 0..3 {
            for b in 0..3 {
                for shift in 0..3 {
                    assert_eq!(
                        raw_outcome(a, b),
                        raw_outcome((a + shift) % 3, (b + shift) % 3)
                    );
                }
            }
        }
    }

    #[test]
    fn test_malformed_hands() {
        assert_eq!(resolve(HandCode(5), Paper.code()), Outcome::BobWins);
        assert_eq!(resolve(Rock.code(), HandCode(3)), Outcome::AliceWins);
        assert_eq!(resolve(HandCode(7), HandCode(u64::MAX)), Outcome::Draw);
    }

    #[test]
    fn test_labels() {
        assert_eq!(GameResult::from(Outcome::AliceWins).to_string(), "Alice wins");
        assert_eq!(GameResult::BobQuits.label(), "Bob quits");
        assert!(GameResult::AliceQuits.is_forfeit());
        assert!(!GameResult::Draw.is_forfeit());
    }
}
