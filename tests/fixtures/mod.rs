//! Test fixtures shared by the integration test suites
#![allow(dead_code)]

use login_queue::admission::{
    AdmissionQueue, ManualClock, OnlinePlayers, QueuePolicy, ServerCapacity,
};
use login_queue::login::LoginGate;
use login_queue::metrics::MetricsCollector;
use login_queue::types::{ClientId, LoginClient};
use std::sync::Arc;
use std::time::Duration;

/// A game server front door with in-memory collaborators and a manual clock
pub struct TestServer {
    pub clock: Arc<ManualClock>,
    pub capacity: Arc<ServerCapacity>,
    pub online: Arc<OnlinePlayers>,
    pub metrics: Arc<MetricsCollector>,
    pub gate: LoginGate,
}

impl TestServer {
    pub fn new(max_players: u32, online: usize) -> Self {
        Self::with_policy(max_players, online, QueuePolicy::default())
    }

    pub fn with_policy(max_players: u32, online: usize, policy: QueuePolicy) -> Self {
        let clock = Arc::new(ManualClock::new());
        let capacity = Arc::new(ServerCapacity::new(max_players));
        let online = Arc::new(OnlinePlayers::new(online));
        let metrics = Arc::new(MetricsCollector::new().expect("Failed to create collector"));

        let queue = AdmissionQueue::new(capacity.clone(), online.clone())
            .with_clock(clock.clone())
            .with_policy(policy)
            .with_metrics(metrics.clone());

        Self {
            clock,
            capacity,
            online,
            metrics,
            gate: LoginGate::new(Arc::new(queue)),
        }
    }

    pub fn queue(&self) -> &Arc<AdmissionQueue> {
        self.gate.queue()
    }

    pub fn advance(&self, seconds: u64) {
        self.clock.advance(Duration::from_secs(seconds));
    }

    /// Log the given normal clients in, in order
    pub fn fill_waiting_list(&self, ids: impl IntoIterator<Item = ClientId>) {
        for id in ids {
            let response = self.gate.handle_login(&normal(id));
            assert!(!response.is_admitted(), "client {} was not queued", id);
        }
    }
}

pub fn normal(id: ClientId) -> LoginClient {
    LoginClient::normal(id, format!("normal_{}", id))
}

pub fn premium(id: ClientId) -> LoginClient {
    LoginClient::premium(id, format!("premium_{}", id))
}
