//! Collaborator interfaces consumed by the coordinator.
//!
//! Persistence, settings, the roll-forward routine and the probe cache all live
//! outside the coordinator. Each is reached through one of these traits so the
//! coordinator can be wired against a database, the in-memory [`MemoryStore`]
//! or a test double.
//!
//! [`MemoryStore`]: crate::memory::MemoryStore

use crate::types::{
    MaintenanceId, MaintenanceTimeslot, MaintenanceWindow, Monitor, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Result;

/// Settings category for server-wide options
pub const GENERAL_CATEGORY: &str = "general";

/// Settings key holding the server timezone
pub const SERVER_TIMEZONE_KEY: &str = "serverTimezone";

/// Settings key holding the trust-proxy flag
pub const TRUST_PROXY_KEY: &str = "trustProxy";

/// Read access to monitor definitions
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// All monitors owned by `owner`
    async fn monitors_by_owner(&self, owner: UserId) -> Result<Vec<Monitor>>;
}

/// Read access to maintenance windows
#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    /// Load one window by ID
    async fn maintenance(&self, id: MaintenanceId) -> Result<Option<MaintenanceWindow>>;

    /// All windows owned by `owner`
    async fn maintenances_by_owner(&self, owner: UserId) -> Result<Vec<MaintenanceWindow>>;
}

/// Storage for maintenance timeslots
#[async_trait]
pub trait TimeslotStore: Send + Sync {
    /// Slots with `generated_next = false` and `start <= now`
    async fn due_timeslots(&self, now: DateTime<Utc>) -> Result<Vec<MaintenanceTimeslot>>;

    /// All slots of one window
    async fn timeslots_for(&self, maintenance_id: MaintenanceId) -> Result<Vec<MaintenanceTimeslot>>;

    /// Insert a slot unless one with the same window and start already exists.
    ///
    /// Returns the stored slot in both cases.
    async fn insert_timeslot(
        &self,
        maintenance_id: MaintenanceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<MaintenanceTimeslot>;

    /// Persist changes to an existing slot
    async fn update_timeslot(&self, slot: &MaintenanceTimeslot) -> Result<()>;

    /// Remove slots of one window that start after `after`. Returns how many were removed.
    async fn discard_future_timeslots(
        &self,
        maintenance_id: MaintenanceId,
        after: DateTime<Utc>,
    ) -> Result<usize>;
}

/// String-keyed settings namespaced by category
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a setting
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    /// Write a setting under `category`
    async fn set_setting(&self, key: &str, value: &str, category: &str) -> Result<()>;
}

/// Computes and persists the next timeslot of a maintenance window.
///
/// Implementations must be idempotent: calling twice for the same logical
/// next slot leaves exactly one slot behind.
#[async_trait]
pub trait RollForward: Send + Sync {
    /// Materialize the slot following `previous_end`.
    ///
    /// Returns `None` when the window has no further occurrence.
    async fn generate_next_timeslot(
        &self,
        window: &MaintenanceWindow,
        previous_end: DateTime<Utc>,
        force: bool,
    ) -> Result<Option<MaintenanceTimeslot>>;
}

/// Cached DNS and connection state used by outbound probes
#[async_trait]
pub trait ProbeCache: Send + Sync {
    /// Drop stale entries and reload
    async fn refresh(&self) -> Result<()>;
}

/// Probe cache for deployments without outbound probe caching
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProbeCache;

#[async_trait]
impl ProbeCache for NoopProbeCache {
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}
