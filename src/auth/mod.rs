//! Credential hashing strategies
//!
//! Password hashing is a pluggable strategy selected by algorithm name from
//! configuration. It is independent of the admission queue.

pub mod hasher;

pub use hasher::{hasher_for, Hasher, Sha1Hasher, Sha256Hasher};
