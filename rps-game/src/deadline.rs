use crate::error::ProtocolViolation;
use rps_core::{ProtocolConfig, Tick};
use serde::{Deserialize, Serialize};

/// Decides which side of a deadline a submission falls on.
///
/// A deadline has elapsed once the ledger clock reaches it: the expected
/// submission is legal strictly before, a forfeiture claim at or after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineArbiter {
    window: u64,
}

impl DeadlineArbiter {
    pub fn new(window: u64) -> Self {
        Self { window }
    }

    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(config.window)
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    pub fn deadline_after(&self, finalized_at: Tick) -> Tick {
        finalized_at.plus(self.window)
    }

    pub fn has_elapsed(&self, deadline: Tick, now: Tick) -> bool {
        now >= deadline
    }

    pub fn check_on_time(
        &self,
        deadline: Option<Tick>,
        now: Tick,
    ) -> Result<(), ProtocolViolation> {
        match deadline {
            Some(deadline) if self.has_elapsed(deadline, now) => {
                Err(ProtocolViolation::Late { deadline, now })
            }
            _ => Ok(()),
        }
    }

    pub fn check_claim(&self, deadline: Tick, now: Tick) -> Result<(), ProtocolViolation> {
        if self.has_elapsed(deadline, now) {
            Ok(())
        } else {
            Err(ProtocolViolation::PrematureClaim { deadline, now })
        }
    }
}

impl Default for DeadlineArbiter {
    fn default() -> Self {
        Self::from_config(&ProtocolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_boundaries() {
        let arbiter = DeadlineArbiter::default();
        let deadline = arbiter.deadline_after(Tick::new(4));
        assert_eq!(deadline, Tick::new(14));

        assert!(arbiter.check_on_time(Some(deadline), Tick::new(13)).is_ok());
        assert_eq!(
            arbiter.check_on_time(Some(deadline), Tick::new(14)),
            Err(ProtocolViolation::Late {
                deadline,
                now: Tick::new(14)
            })
        );
        assert!(arbiter.check_on_time(None, Tick::new(1_000)).is_ok());

        assert!(arbiter.check_claim(deadline, Tick::new(13)).is_err());
        assert!(arbiter.check_claim(deadline, Tick::new(14)).is_ok());
    }
}
