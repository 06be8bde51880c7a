use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three moves. Index `i` beats `(i + 2) % 3` and loses to `(i + 1) % 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Rock,
    Paper,
    Scissors,
}

impl Hand {
    pub const ALL: [Hand; 3] = [Hand::Rock, Hand::Paper, Hand::Scissors];

    pub fn code(self) -> HandCode {
        HandCode(self as u64)
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hand::Rock => "ROCK",
            Hand::Paper => "PAPER",
            Hand::Scissors => "SCISSORS",
        };
        f.write_str(name)
    }
}

impl FromStr for Hand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rock" | "r" | "0" => Ok(Hand::Rock),
            "paper" | "p" | "1" => Ok(Hand::Paper),
            "scissors" | "s" | "2" => Ok(Hand::Scissors),
            other => Err(format!("unknown hand '{}'", other)),
        }
    }
}

/// A hand as disclosed on the ledger.
///
/// Any value outside `0..=2` is malformed. That is data for the resolver,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandCode(pub u64);

impl HandCode {
    pub fn decode(self) -> Option<Hand> {
        match self.0 {
            0 => Some(Hand::Rock),
            1 => Some(Hand::Paper),
            2 => Some(Hand::Scissors),
            _ => None,
        }
    }

    pub fn is_valid(self) -> bool {
        self.decode().is_some()
    }
}

impl From<Hand> for HandCode {
    fn from(hand: Hand) -> Self {
        hand.code()
    }
}

impl fmt::Display for HandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Some(hand) => write!(f, "{}", hand),
            None => write!(f, "MALFORMED({})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_enumeration() {
        for (index, hand) in Hand::ALL.iter().enumerate() {
            assert_eq!(hand.code(), HandCode(index as u64));
            assert_eq!(HandCode(index as u64).decode(), Some(*hand));
        }
        assert!(!HandCode(3).is_valid());
        assert_eq!(HandCode(5).to_string(), "MALFORMED(5)");
    }

    #[test]
    fn test_parse_hand() {
        assert_eq!("Rock".parse::<Hand>(), Ok(Hand::Rock));
        assert_eq!("s".parse::<Hand>(), Ok(Hand::Scissors));
        assert!("lizard".parse::<Hand>().is_err());
    }
}
