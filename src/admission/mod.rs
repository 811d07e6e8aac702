//! Login admission waiting list
//!
//! This module holds the admission queue itself together with the retry
//! policy, the time source it sweeps against, and the capacity/occupancy
//! collaborators it reads on every login attempt.

pub mod capacity;
pub mod clock;
pub mod policy;
pub mod queue;

// Re-export commonly used types
pub use capacity::{CapacitySource, OccupancySource, OnlinePlayers, ServerCapacity};
pub use clock::{Clock, ManualClock, SystemClock};
pub use policy::{retry_interval, QueuePolicy};
pub use queue::{AdmissionDecision, AdmissionQueue, AdmitReason, QueueSnapshot};
