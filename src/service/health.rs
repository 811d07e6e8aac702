//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the login queue
//! service, including readiness and liveness checks.

use crate::admission::capacity::{CapacitySource, OccupancySource};
use crate::admission::queue::QueueSnapshot;
use crate::service::app::ServiceContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional message when not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Waiting list size by tier
    pub queue: QueueSnapshot,
    /// Players currently online
    pub online_players: usize,
    /// Configured player limit (0 = uncapped)
    pub max_players: u32,
    /// Seconds since the service started
    pub uptime_seconds: i64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(context: &ServiceContext) -> Self {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(context).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        for check in [
            Self::check_admission_queue(context),
            Self::check_capacity(context),
        ] {
            overall_status = worst(overall_status, check.status);
            checks.push(check);
        }

        let stats = Self::gather_service_stats(context);
        debug!(
            "Health check completed: {} ({} components)",
            overall_status,
            checks.len()
        );

        HealthCheck {
            status: overall_status,
            service: context.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        }
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(context: &ServiceContext) -> HealthStatus {
        if context.is_running().await {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    /// Readiness check - verify service can handle login attempts
    pub async fn readiness_check(context: &ServiceContext) -> HealthStatus {
        if !context.is_running().await {
            return HealthStatus::Unhealthy;
        }

        Self::check_admission_queue(context).status
    }

    /// Check if service is running
    async fn check_service_running(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if context.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Check that the waiting list answers queries
    fn check_admission_queue(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();
        let snapshot = context.queue().snapshot();

        ComponentCheck {
            name: "admission_queue".to_string(),
            status: HealthStatus::Healthy,
            message: Some(format!("{} waiting", snapshot.total)),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Report whether the game server is full
    fn check_capacity(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();
        let max_players = context.capacity().max_players();
        let online = context.online_players().online_players();

        let (status, message) = if max_players != 0 && online >= max_players as usize {
            (
                HealthStatus::Degraded,
                Some(format!("Server full ({}/{})", online, max_players)),
            )
        } else {
            (HealthStatus::Healthy, None)
        };

        ComponentCheck {
            name: "capacity".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Gather current service statistics
    fn gather_service_stats(context: &ServiceContext) -> ServiceStats {
        ServiceStats {
            queue: context.queue().snapshot(),
            online_players: context.online_players().online_players(),
            max_players: context.capacity().max_players(),
            uptime_seconds: context.uptime().num_seconds(),
        }
    }

    /// Convert health check to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

fn worst(current: HealthStatus, component: HealthStatus) -> HealthStatus {
    match (current, component) {
        (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
        (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}
