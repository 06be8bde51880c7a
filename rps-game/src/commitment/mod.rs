pub mod scheme;

pub use scheme::{Commitment, CommitmentScheme};

use crate::hand::HandCode;
use rand::RngCore;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// 256-bit secret blinding a committed hand. Never leaves its owner before the reveal.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; 32]);

impl Salt {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

impl FromStr for Salt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        scheme::decode_32(s).map(Self)
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

/// What the committing party discloses at reveal time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opening {
    pub salt: Salt,
    pub hand: HandCode,
}

impl Opening {
    pub fn new(salt: Salt, hand: impl Into<HandCode>) -> Self {
        Self {
            salt,
            hand: hand.into(),
        }
    }
}

/// `SHA-256(salt || hand as big-endian u64)`
pub struct HashCommitment;

impl CommitmentScheme for HashCommitment {
    type Opening = Opening;

    fn commit(opening: &Opening) -> Commitment {
        let mut hasher = Sha256::new();
        hasher.update(opening.salt.as_bytes());
        hasher.update(opening.hand.0.to_be_bytes());
        Commitment::from_bytes(hasher.finalize().into())
    }
}

pub fn commit(salt: Salt, hand: HandCode) -> Commitment {
    HashCommitment::commit(&Opening::new(salt, hand))
}

pub fn verify(commitment: &Commitment, salt: Salt, hand: HandCode) -> bool {
    HashCommitment::verify(commitment, &Opening::new(salt, hand))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Hand;
    use rand::Rng;

    #[test]
    fn test_commitment_scheme() {
        let salt = Salt::random();
        let commitment = commit(salt, Hand::Paper.code());

        assert!(verify(&commitment, salt, Hand::Paper.code()));
        assert!(!verify(&commitment, salt, Hand::Rock.code()));
    }

    #[test]
    fn test_altered_opening_fails_over_random_salts() {
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let salt = Salt::random();
            let hand = HandCode(rng.gen_range(0..3));
            let commitment = commit(salt, hand);
            assert!(verify(&commitment, salt, hand));

            let other_hand = HandCode((hand.0 + rng.gen_range(1..3)) % 3);
            assert!(!verify(&commitment, salt, other_hand));

            let mut bytes = *salt.as_bytes();
            bytes[rng.gen_range(0..32)] ^= 1 << rng.gen_range(0..8);
            assert!(!verify(&commitment, Salt::from_bytes(bytes), hand));
        }
    }

    #[test]
    fn test_salt_hex_round_trip() {
        let salt = Salt::random();
        let json = serde_json::to_string(&salt).unwrap();
        let parsed: Salt = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, salt);
        assert!("abcd".parse::<Salt>().is_err());
    }
}
