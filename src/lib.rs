//! Login Queue - Login admission waiting list for game servers
//!
//! This crate decides, for every login attempt against a capacity-limited
//! server, whether the client is admitted right away or parked in a two-tier
//! waiting list, and tells queued clients their place and when to retry.

pub mod admission;
pub mod auth;
pub mod config;
pub mod error;
pub mod login;
pub mod metrics;
pub mod service;
pub mod types;

// Re-export commonly used types and traits
pub use error::{QueueError, Result};
pub use types::*;

// Re-export key components
pub use admission::{AdmissionDecision, AdmissionQueue, QueuePolicy};
pub use login::{LoginGate, LoginResponse};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
