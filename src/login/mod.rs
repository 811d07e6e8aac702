//! Login handling on top of the admission queue
//!
//! The connection handler asks the gate what to answer a login request with:
//! let the client in, or tell it its place on the waiting list and when to
//! try again.

pub mod gate;

pub use gate::{LoginGate, LoginResponse};
