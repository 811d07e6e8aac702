//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the login queue service
//! using Prometheus metrics.

use crate::admission::queue::{AdmissionDecision, QueueSnapshot};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the login queue service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Admission and waiting list metrics
    admission_metrics: AdmissionMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Admission and waiting list metrics
#[derive(Clone)]
pub struct AdmissionMetrics {
    /// Login attempts by outcome
    pub decisions_total: IntCounterVec,

    /// Waiting list length by tier
    pub queue_length: IntGaugeVec,

    /// Entries evicted because their client stopped retrying
    pub entries_expired_total: IntCounter,

    /// Online players as last observed
    pub online_players: IntGauge,

    /// Configured player limit as last observed
    pub max_players: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Time spent deciding a single login attempt
    pub decision_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let admission_metrics = AdmissionMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            admission_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get admission metrics
    pub fn admission(&self) -> &AdmissionMetrics {
        &self.admission_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record the outcome of one login attempt
    pub fn record_admission_decision(&self, decision: &AdmissionDecision, duration: Duration) {
        let outcome = match decision {
            AdmissionDecision::Admitted(reason) => reason.as_str(),
            AdmissionDecision::Queued {
                newly_queued: true, ..
            } => "queued",
            AdmissionDecision::Queued {
                newly_queued: false,
                ..
            } => "requeued",
        };

        self.admission_metrics
            .decisions_total
            .with_label_values(&[outcome])
            .inc();

        self.performance_metrics
            .decision_duration
            .observe(duration.as_secs_f64());
    }

    /// Record entries evicted by a sweep
    pub fn record_entries_expired(&self, count: usize) {
        self.admission_metrics
            .entries_expired_total
            .inc_by(count as u64);
    }

    /// Update the waiting list length gauges
    pub fn update_queue_length(&self, snapshot: &QueueSnapshot) {
        self.admission_metrics
            .queue_length
            .with_label_values(&["priority"])
            .set(snapshot.priority as i64);

        self.admission_metrics
            .queue_length
            .with_label_values(&["normal"])
            .set(snapshot.normal as i64);
    }

    /// Update the observed occupancy and player limit
    pub fn update_occupancy(&self, online_players: usize, max_players: u32) {
        self.admission_metrics
            .online_players
            .set(online_players as i64);
        self.admission_metrics.max_players.set(max_players as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("login_queue_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "login_queue_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("login_queue_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl AdmissionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let decisions_total = IntCounterVec::new(
            Opts::new(
                "login_queue_decisions_total",
                "Login attempts by admission outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(decisions_total.clone()))?;

        let queue_length = IntGaugeVec::new(
            Opts::new("login_queue_length", "Waiting list length by tier"),
            &["tier"],
        )?;
        registry.register(Box::new(queue_length.clone()))?;

        let entries_expired_total = IntCounter::new(
            "login_queue_entries_expired_total",
            "Waiting list entries evicted after their timeout",
        )?;
        registry.register(Box::new(entries_expired_total.clone()))?;

        let online_players =
            IntGauge::new("login_queue_online_players", "Players currently online")?;
        registry.register(Box::new(online_players.clone()))?;

        let max_players = IntGauge::new(
            "login_queue_max_players",
            "Configured player limit (0 = uncapped)",
        )?;
        registry.register(Box::new(max_players.clone()))?;

        Ok(Self {
            decisions_total,
            queue_length,
            entries_expired_total,
            online_players,
            max_players,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let decision_duration = Histogram::with_opts(
            HistogramOpts::new(
                "login_queue_decision_duration_seconds",
                "Time spent deciding a login attempt",
            )
            .buckets(vec![
                0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01,
            ]),
        )?;
        registry.register(Box::new(decision_duration.clone()))?;

        Ok(Self { decision_duration })
    }
}
