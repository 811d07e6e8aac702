//! Admission queue implementation
//!
//! This module provides the waiting list consulted on every login attempt.
//! Entries are kept in one ordered sequence split into a priority prefix and
//! a normal suffix; expiry is swept lazily whenever a login attempt has to
//! look at the list.

use crate::admission::capacity::{CapacitySource, OccupancySource};
use crate::admission::clock::{Clock, SystemClock};
use crate::admission::policy::QueuePolicy;
use crate::metrics::MetricsCollector;
use crate::types::{ClientDescriptor, ClientId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Why a client was let in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdmitReason {
    /// Bypass capability or administrative account
    Bypass,
    /// The server has no player limit
    Uncapped,
    /// Nobody is waiting and there is room
    CapacityAvailable,
    /// The client was waiting and enough room has freed up for its slot
    TurnReached,
}

impl AdmitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmitReason::Bypass => "bypass",
            AdmitReason::Uncapped => "uncapped",
            AdmitReason::CapacityAvailable => "capacity_available",
            AdmitReason::TurnReached => "turn_reached",
        }
    }
}

/// Outcome of a single login attempt against the waiting list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admitted(AdmitReason),
    Queued {
        /// 1-based place on the waiting list
        slot: usize,
        /// How long the entry stays valid without a retry
        timeout: Duration,
        /// False when an existing entry was refreshed
        newly_queued: bool,
    },
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted(_))
    }

    /// Waiting list slot, if the client was queued
    pub fn slot(&self) -> Option<usize> {
        match self {
            AdmissionDecision::Admitted(_) => None,
            AdmissionDecision::Queued { slot, .. } => Some(*slot),
        }
    }
}

/// Point-in-time view of the waiting list size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub total: usize,
    pub priority: usize,
    pub normal: usize,
}

#[derive(Debug, Clone, Copy)]
struct WaitEntry {
    expires_at: Instant,
    client_id: ClientId,
}

/// Ordered entries with the priority boundary tracked as a count
#[derive(Debug, Default)]
struct WaitList {
    entries: Vec<WaitEntry>,
    priority_len: usize,
}

impl WaitList {
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry whose expiry has passed, wherever it sits
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let boundary = self.priority_len;
        let mut index = 0;
        let mut removed_priority = 0;

        self.entries.retain(|entry| {
            let alive = entry.expires_at > now;
            if !alive && index < boundary {
                removed_priority += 1;
            }
            index += 1;
            alive
        });

        self.priority_len -= removed_priority;
        before - self.entries.len()
    }

    fn position(&self, client_id: ClientId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.client_id == client_id)
    }

    fn remove_at(&mut self, index: usize) {
        self.entries.remove(index);
        if index < self.priority_len {
            self.priority_len -= 1;
        }
    }

    /// Insert behind the last priority entry, returning the new slot
    fn insert_priority(&mut self, entry: WaitEntry) -> usize {
        self.entries.insert(self.priority_len, entry);
        self.priority_len += 1;
        self.priority_len
    }

    /// Append behind everyone, returning the new slot
    fn push_normal(&mut self, entry: WaitEntry) -> usize {
        self.entries.push(entry);
        self.entries.len()
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            total: self.entries.len(),
            priority: self.priority_len,
            normal: self.entries.len() - self.priority_len,
        }
    }
}

/// Login waiting list shared by every connection handler
pub struct AdmissionQueue {
    waitlist: Mutex<WaitList>,
    capacity: Arc<dyn CapacitySource>,
    occupancy: Arc<dyn OccupancySource>,
    clock: Arc<dyn Clock>,
    policy: QueuePolicy,
    metrics_collector: Option<Arc<MetricsCollector>>,
}

impl AdmissionQueue {
    /// Create an empty queue reading the given capacity and occupancy
    pub fn new(capacity: Arc<dyn CapacitySource>, occupancy: Arc<dyn OccupancySource>) -> Self {
        Self {
            waitlist: Mutex::new(WaitList::default()),
            capacity,
            occupancy,
            clock: Arc::new(SystemClock),
            policy: QueuePolicy::default(),
            metrics_collector: None,
        }
    }

    /// Use a custom time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a custom retry policy
    pub fn with_policy(mut self, policy: QueuePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Record decisions and queue sizes into the given collector
    pub fn with_metrics(mut self, metrics_collector: Arc<MetricsCollector>) -> Self {
        self.metrics_collector = Some(metrics_collector);
        self
    }

    pub fn policy(&self) -> &QueuePolicy {
        &self.policy
    }

    /// Decide whether `client` may log in now
    pub fn try_admit<C: ClientDescriptor + ?Sized>(&self, client: &C) -> bool {
        self.evaluate(client).is_admitted()
    }

    /// Decide whether `client` may log in now, with the reason or the slot
    pub fn evaluate<C: ClientDescriptor + ?Sized>(&self, client: &C) -> AdmissionDecision {
        let timer = self
            .metrics_collector
            .as_ref()
            .map(|metrics| metrics.start_timer());
        let decision = self.decide(client);

        debug!(
            "Login attempt - client: {}, premium: {}, account: {}, decision: {:?}",
            client.client_id(),
            client.is_premium(),
            client.account_type(),
            decision
        );

        if let (Some(metrics), Some(timer)) = (&self.metrics_collector, timer) {
            metrics.record_admission_decision(&decision, timer.stop());
        }

        decision
    }

    fn decide<C: ClientDescriptor + ?Sized>(&self, client: &C) -> AdmissionDecision {
        if client.can_always_login() || client.account_type().is_administrative() {
            return AdmissionDecision::Admitted(AdmitReason::Bypass);
        }

        let max_players = self.capacity.max_players() as usize;
        if max_players == 0 {
            return AdmissionDecision::Admitted(AdmitReason::Uncapped);
        }
        let online = self.occupancy.online_players();

        let mut waitlist = self.lock();
        if waitlist.is_empty() && online < max_players {
            return AdmissionDecision::Admitted(AdmitReason::CapacityAvailable);
        }

        let now = self.clock.now();
        let expired = waitlist.sweep(now);
        if expired > 0 {
            debug!("Evicted {} expired waiting list entries", expired);
            if let Some(metrics) = &self.metrics_collector {
                metrics.record_entries_expired(expired);
            }
        }

        let client_id = client.client_id();
        let decision = match waitlist.position(client_id) {
            Some(index) => {
                let slot = index + 1;
                if online + slot <= max_players {
                    waitlist.remove_at(index);
                    AdmissionDecision::Admitted(AdmitReason::TurnReached)
                } else {
                    let timeout = self.policy.timeout_for(slot);
                    waitlist.entries[index].expires_at = now + timeout;
                    AdmissionDecision::Queued {
                        slot,
                        timeout,
                        newly_queued: false,
                    }
                }
            }
            None => {
                let (slot, timeout) = if client.is_premium() {
                    let timeout = self.policy.timeout_for(waitlist.priority_len + 1);
                    let slot = waitlist.insert_priority(WaitEntry {
                        expires_at: now + timeout,
                        client_id,
                    });
                    (slot, timeout)
                } else {
                    let timeout = self.policy.timeout_for(waitlist.entries.len() + 1);
                    let slot = waitlist.push_normal(WaitEntry {
                        expires_at: now + timeout,
                        client_id,
                    });
                    (slot, timeout)
                };

                AdmissionDecision::Queued {
                    slot,
                    timeout,
                    newly_queued: true,
                }
            }
        };

        if let Some(metrics) = &self.metrics_collector {
            metrics.update_queue_length(&waitlist.snapshot());
        }

        decision
    }

    /// 1-based place of `client` on the waiting list, or `0` if not queued
    pub fn queue_position<C: ClientDescriptor + ?Sized>(&self, client: &C) -> usize {
        self.position_of(client.client_id())
    }

    /// 1-based place of `client_id` on the waiting list, or `0` if not queued
    pub fn position_of(&self, client_id: ClientId) -> usize {
        self.lock()
            .position(client_id)
            .map_or(0, |index| index + 1)
    }

    /// Remove a waiting client, e.g. when its connection drops
    pub fn cancel(&self, client_id: ClientId) -> bool {
        let mut waitlist = self.lock();
        match waitlist.position(client_id) {
            Some(index) => {
                waitlist.remove_at(index);
                debug!("Cancelled waiting list entry for client {}", client_id);
                if let Some(metrics) = &self.metrics_collector {
                    metrics.update_queue_length(&waitlist.snapshot());
                }
                true
            }
            None => false,
        }
    }

    /// Evict expired entries without a login attempt
    pub fn sweep_expired(&self) -> usize {
        let mut waitlist = self.lock();
        let expired = waitlist.sweep(self.clock.now());

        if let Some(metrics) = &self.metrics_collector {
            if expired > 0 {
                metrics.record_entries_expired(expired);
            }
            metrics.update_queue_length(&waitlist.snapshot());
        }

        expired
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.lock().snapshot()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Waiting clients from the front of the list to the back
    pub fn waiting_clients(&self) -> Vec<ClientId> {
        self.lock()
            .entries
            .iter()
            .map(|entry| entry.client_id)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, WaitList> {
        self.waitlist.lock().unwrap_or_else(|poisoned| {
            warn!("Waiting list lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl std::fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("snapshot", &self.snapshot())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::capacity::{
        MockCapacitySource, MockOccupancySource, OnlinePlayers, ServerCapacity,
    };
    use crate::admission::clock::ManualClock;
    use crate::types::{AccountType, LoginClient};

    struct Fixture {
        queue: AdmissionQueue,
        online: Arc<OnlinePlayers>,
        capacity: Arc<ServerCapacity>,
        clock: Arc<ManualClock>,
    }

    fn fixture(max_players: u32, online: usize) -> Fixture {
        let capacity = Arc::new(ServerCapacity::new(max_players));
        let online = Arc::new(OnlinePlayers::new(online));
        let clock = Arc::new(ManualClock::new());
        let queue = AdmissionQueue::new(capacity.clone(), online.clone()).with_clock(clock.clone());

        Fixture {
            queue,
            online,
            capacity,
            clock,
        }
    }

    fn queued(slot: usize, timeout_secs: u64, newly_queued: bool) -> AdmissionDecision {
        AdmissionDecision::Queued {
            slot,
            timeout: Duration::from_secs(timeout_secs),
            newly_queued,
        }
    }

    #[test]
    fn test_bypass_and_administrative_clients_never_queue() {
        let mut capacity = MockCapacitySource::new();
        capacity.expect_max_players().never();
        let mut occupancy = MockOccupancySource::new();
        occupancy.expect_online_players().never();

        let queue = AdmissionQueue::new(Arc::new(capacity), Arc::new(occupancy));

        let bypass = LoginClient::normal(1, "Bypass").with_bypass();
        let gm = LoginClient::normal(2, "Gm").with_account_type(AccountType::GameMaster);
        let god = LoginClient::premium(3, "God").with_account_type(AccountType::God);

        assert_eq!(
            queue.evaluate(&bypass),
            AdmissionDecision::Admitted(AdmitReason::Bypass)
        );
        assert!(queue.try_admit(&gm));
        assert!(queue.try_admit(&god));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_senior_tutor_is_not_privileged() {
        let f = fixture(1, 1);
        let tutor = LoginClient::normal(1, "Tutor").with_account_type(AccountType::SeniorTutor);

        assert!(!f.queue.try_admit(&tutor));
        assert_eq!(f.queue.queue_position(&tutor), 1);
    }

    #[test]
    fn test_uncapped_server_admits_everyone() {
        let mut capacity = MockCapacitySource::new();
        capacity.expect_max_players().return_const(0u32);
        let mut occupancy = MockOccupancySource::new();
        occupancy.expect_online_players().return_const(10_000usize);

        let queue = AdmissionQueue::new(Arc::new(capacity), Arc::new(occupancy));

        for id in 0..50 {
            assert_eq!(
                queue.evaluate(&LoginClient::normal(id, "Player")),
                AdmissionDecision::Admitted(AdmitReason::Uncapped)
            );
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_room_available_admits_without_entry() {
        let f = fixture(10, 9);
        let client = LoginClient::normal(1, "Pawn");

        assert_eq!(
            f.queue.evaluate(&client),
            AdmissionDecision::Admitted(AdmitReason::CapacityAvailable)
        );
        assert_eq!(f.queue.queue_position(&client), 0);
        assert!(f.queue.is_empty());
    }

    #[test]
    fn test_full_server_queues_with_slot_timeouts() {
        let f = fixture(1, 1);
        let first = LoginClient::normal(1, "First");
        let second = LoginClient::normal(2, "Second");

        assert_eq!(f.queue.evaluate(&first), queued(1, 20, true));
        assert_eq!(f.queue.evaluate(&second), queued(2, 20, true));
        assert_eq!(f.queue.waiting_clients(), vec![1, 2]);
    }

    #[test]
    fn test_waiting_client_admitted_when_room_frees() {
        let f = fixture(1, 1);
        let first = LoginClient::normal(1, "First");
        let second = LoginClient::normal(2, "Second");

        assert!(!f.queue.try_admit(&first));
        assert!(!f.queue.try_admit(&second));

        f.online.set(0);
        assert_eq!(
            f.queue.evaluate(&first),
            AdmissionDecision::Admitted(AdmitReason::TurnReached)
        );
        assert_eq!(f.queue.queue_position(&first), 0);
        assert_eq!(f.queue.queue_position(&second), 1);
    }

    #[test]
    fn test_client_behind_waits_even_when_room_frees() {
        let f = fixture(2, 2);
        let first = LoginClient::normal(1, "First");
        let second = LoginClient::normal(2, "Second");
        let third = LoginClient::normal(3, "Third");

        f.queue.try_admit(&first);
        f.queue.try_admit(&second);
        f.queue.try_admit(&third);

        // One seat frees: only slot 1 fits (1 + 1 <= 2)
        f.online.set(1);
        assert_eq!(f.queue.evaluate(&third), queued(3, 20, false));
        assert_eq!(f.queue.evaluate(&second), queued(2, 20, false));
        assert!(f.queue.try_admit(&first));

        // Second moved up to slot 1 and now fits
        assert!(f.queue.try_admit(&second));
        assert_eq!(f.queue.queue_position(&third), 1);
    }

    #[test]
    fn test_premium_inserted_ahead_of_normal_clients() {
        let f = fixture(1, 1);
        f.queue.try_admit(&LoginClient::normal(1, "Normal1"));
        f.queue.try_admit(&LoginClient::normal(2, "Normal2"));

        let premium = LoginClient::premium(3, "Premium");
        assert_eq!(f.queue.evaluate(&premium), queued(1, 20, true));
        assert_eq!(f.queue.waiting_clients(), vec![3, 1, 2]);
    }

    #[test]
    fn test_premium_clients_keep_arrival_order() {
        let f = fixture(1, 1);
        f.queue.try_admit(&LoginClient::normal(1, "Normal"));
        f.queue.try_admit(&LoginClient::premium(2, "PremiumA"));
        f.queue.try_admit(&LoginClient::premium(3, "PremiumB"));
        f.queue.try_admit(&LoginClient::normal(4, "Late"));

        assert_eq!(f.queue.waiting_clients(), vec![2, 3, 1, 4]);
        let snapshot = f.queue.snapshot();
        assert_eq!(snapshot.priority, 2);
        assert_eq!(snapshot.normal, 2);
    }

    #[test]
    fn test_retries_do_not_duplicate_entries() {
        let f = fixture(1, 1);
        let client = LoginClient::premium(1, "Retrier");

        for _ in 0..10 {
            assert!(!f.queue.try_admit(&client));
        }
        assert_eq!(f.queue.len(), 1);
        assert_eq!(f.queue.snapshot().priority, 1);
    }

    #[test]
    fn test_slot_timeout_grows_with_queue_depth() {
        let f = fixture(1, 1);
        for id in 1..=30 {
            f.queue.try_admit(&LoginClient::normal(id, "Player"));
        }

        // Retry recomputes the timeout from the current slot
        assert_eq!(
            f.queue.evaluate(&LoginClient::normal(3, "Player")),
            queued(3, 20, false)
        );
        assert_eq!(
            f.queue.evaluate(&LoginClient::normal(30, "Player")),
            queued(30, 75, false)
        );
    }

    #[test]
    fn test_entry_expires_without_retry() {
        let f = fixture(1, 1);
        let sleeper = LoginClient::normal(1, "Sleeper");
        let other = LoginClient::normal(2, "Other");

        f.queue.try_admit(&sleeper);
        f.clock.advance(Duration::from_secs(20));

        // Expiry is inclusive of the deadline
        assert_eq!(f.queue.evaluate(&other), queued(1, 20, true));
        assert_eq!(f.queue.queue_position(&sleeper), 0);
    }

    #[test]
    fn test_stale_entries_block_shortcut_until_swept() {
        let f = fixture(2, 2);
        f.queue.try_admit(&LoginClient::normal(1, "Gone"));
        f.clock.advance(Duration::from_secs(21));
        f.online.set(1);

        // The list is not empty before the sweep, so the newcomer queues
        let newcomer = LoginClient::normal(2, "Newcomer");
        assert_eq!(f.queue.evaluate(&newcomer), queued(1, 20, true));
        assert_eq!(f.queue.waiting_clients(), vec![2]);

        assert_eq!(
            f.queue.evaluate(&newcomer),
            AdmissionDecision::Admitted(AdmitReason::TurnReached)
        );
        assert!(f.queue.is_empty());
    }

    #[test]
    fn test_retry_refreshes_expiry() {
        let f = fixture(1, 1);
        let client = LoginClient::normal(1, "Poller");

        f.queue.try_admit(&client);
        for _ in 0..5 {
            f.clock.advance(Duration::from_secs(10));
            assert_eq!(f.queue.evaluate(&client), queued(1, 20, false));
        }
        assert_eq!(f.queue.len(), 1);
    }

    #[test]
    fn test_sweep_removes_stale_entries_behind_live_ones() {
        let f = fixture(1, 1);
        let front = LoginClient::normal(1, "Front");
        let stale = LoginClient::normal(2, "Stale");

        f.queue.try_admit(&front);
        f.queue.try_admit(&stale);

        // Front keeps polling, the one behind it does not
        f.clock.advance(Duration::from_secs(10));
        f.queue.try_admit(&front);
        f.clock.advance(Duration::from_secs(11));

        assert_eq!(f.queue.sweep_expired(), 1);
        assert_eq!(f.queue.waiting_clients(), vec![1]);
    }

    #[test]
    fn test_priority_boundary_follows_removals() {
        let f = fixture(1, 1);
        f.queue.try_admit(&LoginClient::premium(1, "PremiumA"));
        f.queue.try_admit(&LoginClient::premium(2, "PremiumB"));
        f.queue.try_admit(&LoginClient::normal(3, "Normal"));

        assert!(f.queue.cancel(1));
        assert_eq!(f.queue.snapshot().priority, 1);

        f.queue.try_admit(&LoginClient::premium(4, "PremiumC"));
        assert_eq!(f.queue.waiting_clients(), vec![2, 4, 3]);
    }

    #[test]
    fn test_priority_boundary_follows_expiry() {
        let f = fixture(1, 1);
        f.queue.try_admit(&LoginClient::premium(1, "PremiumA"));
        f.queue.try_admit(&LoginClient::normal(2, "Normal"));

        f.clock.advance(Duration::from_secs(10));
        f.queue.try_admit(&LoginClient::normal(2, "Normal"));
        f.clock.advance(Duration::from_secs(15));

        // PremiumA expired at 20s, Normal lives until 30s
        f.queue.try_admit(&LoginClient::premium(3, "PremiumB"));
        assert_eq!(f.queue.waiting_clients(), vec![3, 2]);
        assert_eq!(f.queue.snapshot().priority, 1);
    }

    #[test]
    fn test_cancel_unknown_client() {
        let f = fixture(1, 1);
        assert!(!f.queue.cancel(42));
        assert_eq!(f.queue.position_of(42), 0);
    }

    #[test]
    fn test_queue_position_does_not_sweep() {
        let f = fixture(1, 1);
        let client = LoginClient::normal(1, "Idle");

        f.queue.try_admit(&client);
        f.clock.advance(Duration::from_secs(3600));

        // Documented limitation: nothing evicts without a login attempt or sweep
        assert_eq!(f.queue.queue_position(&client), 1);
        assert_eq!(f.queue.sweep_expired(), 1);
        assert_eq!(f.queue.queue_position(&client), 0);
    }

    #[test]
    fn test_capacity_change_takes_effect_immediately() {
        let f = fixture(1, 1);
        let client = LoginClient::normal(1, "Patient");
        assert!(!f.queue.try_admit(&client));

        f.capacity.set_max_players(5);
        assert_eq!(
            f.queue.evaluate(&client),
            AdmissionDecision::Admitted(AdmitReason::TurnReached)
        );
    }

    #[test]
    fn test_custom_policy_margin() {
        let f = fixture(1, 1);
        let queue = AdmissionQueue::new(f.capacity.clone(), f.online.clone())
            .with_clock(f.clock.clone())
            .with_policy(QueuePolicy::new(60).unwrap());

        assert_eq!(
            queue.evaluate(&LoginClient::normal(1, "Player")),
            queued(1, 65, true)
        );
    }

    #[test]
    fn test_metrics_recorded_when_attached() {
        let f = fixture(1, 1);
        let collector = Arc::new(MetricsCollector::new().unwrap());
        let queue = AdmissionQueue::new(f.capacity.clone(), f.online.clone())
            .with_clock(f.clock.clone())
            .with_metrics(collector.clone());

        queue.try_admit(&LoginClient::normal(1, "Player"));
        queue.try_admit(&LoginClient::premium(2, "Premium"));

        let admission = collector.admission();
        assert_eq!(
            admission
                .decisions_total
                .with_label_values(&["queued"])
                .get(),
            2
        );
        assert_eq!(
            admission.queue_length.with_label_values(&["priority"]).get(),
            1
        );
        assert_eq!(
            admission.queue_length.with_label_values(&["normal"]).get(),
            1
        );
        assert_eq!(
            collector.performance().decision_duration.get_sample_count(),
            2
        );
    }
}
