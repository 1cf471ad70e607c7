//! Server coordinator: owns the registries and sequences startup and shutdown.

use crate::broadcaster::{RealtimeBroadcaster, ViewMap};
use crate::channel::ChannelHub;
use crate::client_ip::ClientIdentity;
use crate::error_log::ErrorLog;
use crate::metrics::MetricsRegistry;
use crate::registry::{MaintenanceRegistry, MonitorRegistry};
use crate::scheduler::{MaintenanceScheduler, PassReport, RecurringPass};
use crate::timezone::{ActiveTimezone, TimeAuthority};
use crate::types::{ClientConnection, ServerConfig, ServerEvent};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use uptime::types::UserId;
use uptime::{
    MaintenanceStore, MaintenanceWindow, MemoryStore, Monitor, MonitorStore, NoopProbeCache,
    ProbeCache, RecurringRollForward, RollForward, SettingsStore, TimeslotStore,
};

/// Coordinator error types
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Coordinator already initialized")]
    AlreadyInitialized,
}

/// External collaborators injected at construction
#[derive(Clone)]
pub struct Collaborators {
    pub monitors: Arc<dyn MonitorStore>,
    pub maintenances: Arc<dyn MaintenanceStore>,
    pub timeslots: Arc<dyn TimeslotStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub roll_forward: Arc<dyn RollForward>,
    pub probe_cache: Arc<dyn ProbeCache>,
}

impl Collaborators {
    /// Wire every collaborator to one in-memory store
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            monitors: store.clone(),
            maintenances: store.clone(),
            timeslots: store.clone(),
            settings: store.clone(),
            roll_forward: Arc::new(RecurringRollForward::new(store)),
            probe_cache: Arc::new(NoopProbeCache),
        }
    }
}

/// What `init_after_database_ready` did
#[derive(Debug, Clone)]
pub struct StartupReport {
    /// Timezone applied, if resolution succeeded
    pub timezone: Option<ActiveTimezone>,

    /// Result of the immediate scheduler pass
    pub first_pass: PassReport,

    /// Startup steps that failed and were skipped
    pub failed_steps: Vec<&'static str>,
}

/// Holds the single coordinator of a process.
///
/// The entry point owns one cell (or uses [`ServerCoordinator::get_instance`]);
/// the first call constructs the coordinator and later calls return it unchanged.
pub struct CoordinatorCell {
    cell: OnceLock<Arc<ServerCoordinator>>,
}

impl CoordinatorCell {
    /// Create an empty cell
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Get the coordinator, constructing it on first call.
    ///
    /// `config` and `collaborators` are ignored once the coordinator exists.
    pub fn get_instance(&self, config: ServerConfig, collaborators: Collaborators) -> Arc<ServerCoordinator> {
        Arc::clone(
            self.cell
                .get_or_init(|| Arc::new(ServerCoordinator::new(config, collaborators))),
        )
    }

    /// The coordinator, if already constructed
    pub fn get(&self) -> Option<Arc<ServerCoordinator>> {
        self.cell.get().cloned()
    }
}

impl Default for CoordinatorCell {
    fn default() -> Self {
        Self::new()
    }
}

static INSTANCE: CoordinatorCell = CoordinatorCell::new();

/// Runtime coordinator of the uptime service
pub struct ServerCoordinator {
    config: ServerConfig,
    monitors: MonitorRegistry,
    maintenances: MaintenanceRegistry,
    time: TimeAuthority,
    identity: ClientIdentity,
    scheduler: Arc<MaintenanceScheduler>,
    broadcaster: RealtimeBroadcaster,
    probe_cache: Arc<dyn ProbeCache>,
    error_log: Arc<ErrorLog>,
    metrics: Option<Arc<MetricsRegistry>>,
    initialized: AtomicBool,
    timer: Mutex<Option<RecurringPass>>,
}

impl ServerCoordinator {
    /// Process-wide coordinator, constructed on first call
    pub fn get_instance(config: ServerConfig, collaborators: Collaborators) -> Arc<Self> {
        INSTANCE.get_instance(config, collaborators)
    }

    fn new(config: ServerConfig, collaborators: Collaborators) -> Self {
        let metrics = if config.metrics_enabled {
            info!("Metrics enabled on {}", config.metrics_listen_addr);
            Some(Arc::new(MetricsRegistry::new()))
        } else {
            info!("Metrics disabled");
            None
        };

        let error_log = Arc::new(ErrorLog::new(&config.data_dir));
        let hub = Arc::new(ChannelHub::new(config.connection_buffer));

        let scheduler = MaintenanceScheduler::new(
            collaborators.timeslots.clone(),
            collaborators.maintenances.clone(),
            collaborators.roll_forward,
            config.scheduler_max_rounds,
        )
        .with_metrics(metrics.clone())
        .with_error_log(error_log.clone());

        let broadcaster = RealtimeBroadcaster::new(
            collaborators.monitors,
            collaborators.maintenances,
            collaborators.timeslots,
            hub,
            metrics.clone(),
        );

        Self {
            time: TimeAuthority::new(
                collaborators.settings.clone(),
                config.timezone_env_var.clone(),
                config.timezone_fallback.clone(),
            ),
            identity: ClientIdentity::new(collaborators.settings),
            scheduler: Arc::new(scheduler),
            broadcaster,
            probe_cache: collaborators.probe_cache,
            error_log,
            metrics,
            monitors: MonitorRegistry::new(),
            maintenances: MaintenanceRegistry::new(),
            initialized: AtomicBool::new(false),
            timer: Mutex::new(None),
            config,
        }
    }

    /// Start background work once durable storage is available.
    ///
    /// Runs, in order: probe cache refresh, timezone resolution, one scheduler
    /// pass, then arms the recurring pass. A failure in the first two steps is
    /// logged and reported but does not stop the rest.
    pub async fn init_after_database_ready(&self) -> Result<StartupReport, CoordinatorError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(CoordinatorError::AlreadyInitialized);
        }

        let mut failed_steps = Vec::new();

        if let Err(e) = self.probe_cache.refresh().await {
            warn!(error = %e, "Failed to refresh probe cache");
            self.log_error(format!("Probe cache refresh failed: {}", e), true).await;
            failed_steps.push("probe_cache");
        }

        let timezone = match self.time.init().await {
            Ok(active) => Some(active),
            Err(e) => {
                warn!(error = %e, "Failed to apply timezone");
                self.log_error(format!("Timezone resolution failed: {}", e), true).await;
                failed_steps.push("timezone");
                None
            }
        };

        let first_pass = self.scheduler.generate_maintenance_timeslots().await;

        let pass = self.scheduler.spawn_recurring(self.config.scheduler_interval);
        if let Some(previous) = self.timer.lock().await.replace(pass) {
            previous.cancel();
        }

        info!(failed_steps = failed_steps.len(), "Coordinator initialized");
        Ok(StartupReport {
            timezone,
            first_pass,
            failed_steps,
        })
    }

    /// Cancel the recurring scheduler pass. Safe to call repeatedly.
    pub async fn stop(&self) {
        match self.timer.lock().await.take() {
            Some(pass) => {
                pass.cancel();
                info!("Maintenance scheduler stopped");
            }
            None => debug!("Maintenance scheduler not armed"),
        }
    }

    /// Whether a recurring scheduler pass is armed
    pub async fn has_armed_timer(&self) -> bool {
        self.timer
            .lock()
            .await
            .as_ref()
            .is_some_and(RecurringPass::is_armed)
    }

    /// Subscribe an authenticated connection to its user channel
    pub fn connect(&self, connection: &ClientConnection) -> Option<mpsc::Receiver<ServerEvent>> {
        let user_id = connection.user_id?;
        let rx = self.broadcaster.hub().join(user_id, connection.id);
        self.update_connection_metrics();
        Some(rx)
    }

    /// Remove a connection from its user channel
    pub fn disconnect(&self, connection: &ClientConnection) {
        if let Some(user_id) = connection.user_id {
            self.broadcaster.hub().leave(user_id, connection.id);
            self.update_connection_metrics();
        }
    }

    /// Replace both registries
    pub fn rebuild_registries(&self, monitors: Vec<Monitor>, maintenances: Vec<MaintenanceWindow>) {
        self.monitors
            .replace_all(monitors.into_iter().map(|m| (m.id, m)));
        self.maintenances
            .replace_all(maintenances.into_iter().map(|w| (w.id, w)));

        debug!(
            monitors = self.monitors.len(),
            maintenances = self.maintenances.len(),
            "Registries rebuilt"
        );
        if let Some(ref m) = self.metrics {
            m.update_registry_sizes(self.monitors.len(), self.maintenances.len());
        }
    }

    pub async fn send_monitor_list(&self, connection: &ClientConnection) -> ViewMap {
        self.broadcaster.send_monitor_list(connection).await
    }

    pub async fn send_maintenance_list(&self, connection: &ClientConnection) -> ViewMap {
        self.broadcaster.send_maintenance_list(connection).await
    }

    pub async fn send_maintenance_list_by_user_id(&self, user_id: UserId) -> ViewMap {
        self.broadcaster
            .send_maintenance_list_by_user_id(user_id)
            .await
    }

    pub async fn resolve_client_ip(&self, connection: &ClientConnection) -> String {
        self.identity.resolve_client_ip(connection).await
    }

    pub async fn get_timezone(&self) -> String {
        self.time.get_timezone().await
    }

    pub async fn set_timezone(&self, name: &str) -> common::Result<()> {
        self.time.set_timezone(name).await
    }

    pub async fn get_timezone_offset(&self) -> String {
        self.time.get_timezone_offset().await
    }

    /// Append to the diagnostic error log
    pub async fn log_error(&self, payload: impl fmt::Display, also_print: bool) {
        self.error_log.append(payload, also_print).await;
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn monitors(&self) -> &MonitorRegistry {
        &self.monitors
    }

    pub fn maintenances(&self) -> &MaintenanceRegistry {
        &self.maintenances
    }

    pub fn time(&self) -> &TimeAuthority {
        &self.time
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn scheduler(&self) -> &Arc<MaintenanceScheduler> {
        &self.scheduler
    }

    pub fn broadcaster(&self) -> &RealtimeBroadcaster {
        &self.broadcaster
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsRegistry>> {
        self.metrics.as_ref()
    }

    fn update_connection_metrics(&self) {
        if let Some(ref m) = self.metrics {
            m.update_connection_count(self.broadcaster.hub().total_connections());
        }
    }
}

impl fmt::Debug for ServerCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCoordinator")
            .field("config", &self.config)
            .field("monitors", &self.monitors.len())
            .field("maintenances", &self.maintenances.len())
            .field("initialized", &self.initialized.load(Ordering::SeqCst))
            .finish()
    }
}
