//! Slot-based retry policy
//!
//! Queued clients are told to come back after a coarse, slot-dependent
//! interval. Their entry is kept alive for that interval plus a grace margin
//! so that network and poll latency do not evict a client that retries on
//! time.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default grace margin added on top of the retry interval
pub const DEFAULT_GRACE_MARGIN_SECONDS: u64 = 15;

/// Interval a client at `slot` is asked to wait before retrying
pub fn retry_interval(slot: usize) -> Duration {
    let seconds = if slot < 5 {
        5
    } else if slot < 10 {
        10
    } else if slot < 20 {
        20
    } else if slot < 50 {
        60
    } else {
        120
    };

    Duration::from_secs(seconds)
}

/// Policy turning a waiting list slot into an entry timeout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePolicy {
    /// Extra time granted beyond the retry interval before eviction
    pub grace_margin_seconds: u64,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            grace_margin_seconds: DEFAULT_GRACE_MARGIN_SECONDS,
        }
    }
}

impl QueuePolicy {
    pub fn new(grace_margin_seconds: u64) -> crate::error::Result<Self> {
        let policy = Self {
            grace_margin_seconds,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Validate configuration values
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.grace_margin_seconds == 0 {
            return Err(crate::error::QueueError::ConfigurationError {
                message: "grace_margin_seconds must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    pub fn grace_margin(&self) -> Duration {
        Duration::from_secs(self.grace_margin_seconds)
    }

    /// How long an entry at `slot` stays valid without a retry
    pub fn timeout_for(&self, slot: usize) -> Duration {
        retry_interval(slot) + self.grace_margin()
    }
}
