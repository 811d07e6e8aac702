//! Capacity and occupancy collaborators
//!
//! The admission queue reads the configured player limit and the current
//! online count fresh on every login attempt. Both are owned elsewhere; this
//! module defines the seams plus atomic implementations the service wires in.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tracing::debug;

/// Source of the configured maximum number of players (`0` means uncapped)
#[cfg_attr(test, mockall::automock)]
pub trait CapacitySource: Send + Sync {
    fn max_players(&self) -> u32;
}

/// Source of the number of currently admitted sessions
#[cfg_attr(test, mockall::automock)]
pub trait OccupancySource: Send + Sync {
    fn online_players(&self) -> usize;
}

/// Runtime-adjustable player limit
#[derive(Debug, Default)]
pub struct ServerCapacity {
    max_players: AtomicU32,
}

impl ServerCapacity {
    pub fn new(max_players: u32) -> Self {
        Self {
            max_players: AtomicU32::new(max_players),
        }
    }

    /// Change the player limit; takes effect on the next login attempt
    pub fn set_max_players(&self, max_players: u32) {
        let previous = self.max_players.swap(max_players, Ordering::Relaxed);
        debug!("Max players changed from {} to {}", previous, max_players);
    }
}

impl CapacitySource for ServerCapacity {
    fn max_players(&self) -> u32 {
        self.max_players.load(Ordering::Relaxed)
    }
}

/// Counter of admitted sessions
#[derive(Debug, Default)]
pub struct OnlinePlayers {
    count: AtomicUsize,
}

impl OnlinePlayers {
    pub fn new(count: usize) -> Self {
        Self {
            count: AtomicUsize::new(count),
        }
    }

    /// Record a session becoming active, returning the new count
    pub fn connect(&self) -> usize {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a session ending, returning the new count
    pub fn disconnect(&self) -> usize {
        let previous = self
            .count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                Some(count.saturating_sub(1))
            })
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn set(&self, count: usize) {
        self.count.store(count, Ordering::Relaxed);
    }
}

impl OccupancySource for OnlinePlayers {
    fn online_players(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_capacity_updates() {
        let capacity = ServerCapacity::new(100);
        assert_eq!(capacity.max_players(), 100);

        capacity.set_max_players(0);
        assert_eq!(capacity.max_players(), 0);
    }

    #[test]
    fn test_online_players_counter() {
        let online = OnlinePlayers::new(0);
        assert_eq!(online.connect(), 1);
        assert_eq!(online.connect(), 2);
        assert_eq!(online.disconnect(), 1);
        assert_eq!(online.online_players(), 1);

        online.set(10);
        assert_eq!(online.online_players(), 10);
    }

    #[test]
    fn test_online_players_disconnect_saturates() {
        let online = OnlinePlayers::default();
        assert_eq!(online.disconnect(), 0);
        assert_eq!(online.online_players(), 0);
    }
}
