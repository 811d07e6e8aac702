//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the admission
//! queue to its collaborators, the metrics service and background tasks.

use crate::admission::capacity::{CapacitySource, OccupancySource, OnlinePlayers, ServerCapacity};
use crate::admission::queue::AdmissionQueue;
use crate::auth::{hasher_for, Hasher};
use crate::config::{validate_config, AppConfig};
use crate::login::LoginGate;
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Shared handles to the running service components
#[derive(Clone)]
pub struct ServiceContext {
    config: Arc<AppConfig>,
    queue: Arc<AdmissionQueue>,
    login_gate: LoginGate,
    capacity: Arc<ServerCapacity>,
    online_players: Arc<OnlinePlayers>,
    hasher: Arc<dyn Hasher>,
    is_running: Arc<RwLock<bool>>,
    started_at: DateTime<Utc>,
}

impl ServiceContext {
    /// Build the admission components described by `config`
    pub fn new(
        config: AppConfig,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Result<Self, ServiceError> {
        let policy = config.queue_policy();
        policy
            .validate()
            .map_err(|e| ServiceError::Configuration {
                message: format!("Invalid queue policy: {}", e),
            })?;

        let hasher: Arc<dyn Hasher> = hasher_for(&config.auth.hash_algorithm)
            .map_err(|e| ServiceError::Configuration {
                message: e.to_string(),
            })?
            .into();

        let capacity = Arc::new(ServerCapacity::new(config.server.max_players));
        let online_players = Arc::new(OnlinePlayers::default());
        let queue = Arc::new(
            AdmissionQueue::new(capacity.clone(), online_players.clone())
                .with_policy(policy)
                .with_metrics(metrics_collector),
        );

        Ok(Self {
            config: Arc::new(config),
            login_gate: LoginGate::new(queue.clone()),
            queue,
            capacity,
            online_players,
            hasher,
            is_running: Arc::new(RwLock::new(false)),
            started_at: Utc::now(),
        })
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the admission queue
    pub fn queue(&self) -> Arc<AdmissionQueue> {
        self.queue.clone()
    }

    /// Get the login gate for connection handlers
    pub fn login_gate(&self) -> &LoginGate {
        &self.login_gate
    }

    /// Get the runtime-adjustable player limit
    pub fn capacity(&self) -> Arc<ServerCapacity> {
        self.capacity.clone()
    }

    /// Get the online player counter
    pub fn online_players(&self) -> Arc<OnlinePlayers> {
        self.online_players.clone()
    }

    /// Get the configured password hashing strategy
    pub fn hasher(&self) -> Arc<dyn Hasher> {
        self.hasher.clone()
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    /// Time since the context was created
    pub fn uptime(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.started_at)
    }
}

/// Main application state containing all service components
pub struct AppState {
    /// Shared component handles
    context: ServiceContext,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing login queue service");

        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;
        info!(
            "Configuration: service={}, max_players={}, grace_margin={}s",
            config.service.name, config.server.max_players, config.queue.grace_margin_seconds
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let health_config = HealthServerConfig {
            port: config.service.health_port,
            host: "0.0.0.0".to_string(),
        };

        let context = ServiceContext::new(config, metrics_collector.clone())?;

        let health_server = Arc::new(
            HealthServer::new(health_config, metrics_collector.clone())
                .with_context(context.clone()),
        );
        let metrics_service = Arc::new(MetricsService::new(metrics_collector, health_server));

        Ok(Self {
            context,
            metrics_service,
            background_tasks: Vec::new(),
        })
    }

    /// Start all background services
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting login queue service");

        self.context.set_running(true).await;

        self.start_metrics_service().await?;
        self.start_background_tasks();

        info!("✅ Login queue service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of login queue service");

        self.context.set_running(false).await;

        info!("Stopping metrics service...");
        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        self.stop_background_tasks().await;

        let final_snapshot = self.context.queue().snapshot();
        info!(
            "Final waiting list: {} entries ({} priority, {} normal)",
            final_snapshot.total, final_snapshot.priority, final_snapshot.normal
        );
        info!("✅ Login queue service shutdown completed");

        Ok(())
    }

    /// Get the shared component handles
    pub fn context(&self) -> ServiceContext {
        self.context.clone()
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        self.context.config()
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        self.context.is_running().await
    }

    /// Get metrics service
    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// Start metrics service
    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        info!("Starting metrics and health endpoints");

        let metrics_service = self.metrics_service.clone();
        let port = self.context.config().service.health_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });

        self.background_tasks.push(metrics_handle);

        // Give the server a moment to start up
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ Metrics service started on port {}", port);
        Ok(())
    }

    /// Start background maintenance tasks
    fn start_background_tasks(&mut self) {
        info!("Starting background maintenance tasks...");

        // Gauge refresh task
        let metrics_task = {
            let context = self.context.clone();
            let metrics_collector = self.metrics_service.collector();
            let refresh_interval = context.config().metrics_interval();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(refresh_interval);
                info!(
                    "Queue metrics task started ({}s interval)",
                    refresh_interval.as_secs()
                );

                while context.is_running().await {
                    interval.tick().await;

                    let snapshot = context.queue().snapshot();
                    let online = context.online_players().online_players();
                    let max_players = context.capacity().max_players();

                    debug!(
                        "Updating metrics - waiting: {}, online: {}/{}",
                        snapshot.total, online, max_players
                    );
                    metrics_collector.update_queue_length(&snapshot);
                    metrics_collector.update_occupancy(online, max_players);
                }

                info!("Queue metrics task stopped");
            })
        };
        self.background_tasks.push(metrics_task);

        // Expiry sweep task (if enabled)
        match self.context.config().sweep_interval() {
            Some(sweep_interval) => {
                let context = self.context.clone();

                let sweep_task = tokio::spawn(async move {
                    let mut interval = tokio::time::interval(sweep_interval);
                    info!(
                        "Waiting list sweep task started ({}s interval)",
                        sweep_interval.as_secs()
                    );

                    while context.is_running().await {
                        interval.tick().await;

                        let expired = context.queue().sweep_expired();
                        if expired > 0 {
                            info!("Swept {} expired waiting list entries", expired);
                        } else {
                            debug!("Sweep completed - no expired entries");
                        }
                    }

                    info!("Waiting list sweep task stopped");
                });
                self.background_tasks.push(sweep_task);
            }
            None => info!("Periodic sweep disabled - entries expire on login attempts only"),
        }

        // Service health metrics task
        let health_metrics_task = {
            let context = self.context.clone();
            let metrics_collector = self.metrics_service.collector();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                info!("Health metrics task started");

                while context.is_running().await {
                    interval.tick().await;

                    let uptime_seconds = context.uptime().num_seconds();
                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(uptime_seconds);

                    metrics_collector.update_health_status(2); // 2 = healthy
                    metrics_collector.update_component_health("admission_queue", true);
                    metrics_collector.update_component_health("metrics", true);
                }

                info!("Health metrics task stopped");
            })
        };
        self.background_tasks.push(health_metrics_task);

        info!(
            "{} background tasks started successfully",
            self.background_tasks.len()
        );
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
