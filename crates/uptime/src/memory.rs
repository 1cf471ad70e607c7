//! In-memory implementation of every store trait.

use crate::store::{MaintenanceStore, MonitorStore, SettingsStore, TimeslotStore};
use crate::types::{
    MaintenanceId, MaintenanceTimeslot, MaintenanceWindow, Monitor, MonitorId, TimeslotId, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Inner {
    monitors: BTreeMap<MonitorId, Monitor>,
    maintenances: BTreeMap<MaintenanceId, MaintenanceWindow>,
    timeslots: BTreeMap<TimeslotId, MaintenanceTimeslot>,
    next_timeslot_id: TimeslotId,
    /// key -> (category, value)
    settings: HashMap<String, (String, String)>,
}

/// Volatile store backing the binary and the tests
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a monitor
    pub async fn put_monitor(&self, monitor: Monitor) {
        self.inner.write().await.monitors.insert(monitor.id, monitor);
    }

    /// Add or replace a maintenance window
    pub async fn put_maintenance(&self, window: MaintenanceWindow) {
        self.inner
            .write()
            .await
            .maintenances
            .insert(window.id, window);
    }

    /// Add a timeslot as the maintenance-definition logic would
    pub async fn seed_timeslot(
        &self,
        maintenance_id: MaintenanceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        generated_next: bool,
    ) -> MaintenanceTimeslot {
        let mut inner = self.inner.write().await;
        inner.next_timeslot_id += 1;
        let slot = MaintenanceTimeslot {
            id: inner.next_timeslot_id,
            maintenance_id,
            start,
            end,
            generated_next,
        };
        inner.timeslots.insert(slot.id, slot.clone());
        slot
    }

    /// Snapshot of every stored timeslot, ordered by ID
    pub async fn all_timeslots(&self) -> Vec<MaintenanceTimeslot> {
        self.inner.read().await.timeslots.values().cloned().collect()
    }

    /// Category a setting was stored under
    pub async fn setting_category(&self, key: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .settings
            .get(key)
            .map(|(category, _)| category.clone())
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn monitors_by_owner(&self, owner: UserId) -> Result<Vec<Monitor>> {
        let inner = self.inner.read().await;
        let mut monitors: Vec<Monitor> = inner
            .monitors
            .values()
            .filter(|m| m.owner == owner)
            .cloned()
            .collect();
        monitors.sort_by(Monitor::list_order);
        Ok(monitors)
    }
}

#[async_trait]
impl MaintenanceStore for MemoryStore {
    async fn maintenance(&self, id: MaintenanceId) -> Result<Option<MaintenanceWindow>> {
        Ok(self.inner.read().await.maintenances.get(&id).cloned())
    }

    async fn maintenances_by_owner(&self, owner: UserId) -> Result<Vec<MaintenanceWindow>> {
        let inner = self.inner.read().await;
        let mut windows: Vec<MaintenanceWindow> = inner
            .maintenances
            .values()
            .filter(|w| w.owner == owner)
            .cloned()
            .collect();
        windows.sort_by(MaintenanceWindow::list_order);
        Ok(windows)
    }
}

#[async_trait]
impl TimeslotStore for MemoryStore {
    async fn due_timeslots(&self, now: DateTime<Utc>) -> Result<Vec<MaintenanceTimeslot>> {
        Ok(self
            .inner
            .read()
            .await
            .timeslots
            .values()
            .filter(|slot| !slot.generated_next && slot.start <= now)
            .cloned()
            .collect())
    }

    async fn timeslots_for(&self, maintenance_id: MaintenanceId) -> Result<Vec<MaintenanceTimeslot>> {
        Ok(self
            .inner
            .read()
            .await
            .timeslots
            .values()
            .filter(|slot| slot.maintenance_id == maintenance_id)
            .cloned()
            .collect())
    }

    async fn insert_timeslot(
        &self,
        maintenance_id: MaintenanceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<MaintenanceTimeslot> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner
            .timeslots
            .values()
            .find(|slot| slot.maintenance_id == maintenance_id && slot.start == start)
        {
            debug!(maintenance_id, slot_id = existing.id, "Timeslot already exists");
            return Ok(existing.clone());
        }

        inner.next_timeslot_id += 1;
        let slot = MaintenanceTimeslot {
            id: inner.next_timeslot_id,
            maintenance_id,
            start,
            end,
            generated_next: false,
        };
        inner.timeslots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn update_timeslot(&self, slot: &MaintenanceTimeslot) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.timeslots.get_mut(&slot.id) {
            Some(stored) => {
                *stored = slot.clone();
                Ok(())
            }
            None => Err(Error::not_found(format!("timeslot {}", slot.id))),
        }
    }

    async fn discard_future_timeslots(
        &self,
        maintenance_id: MaintenanceId,
        after: DateTime<Utc>,
    ) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let before = inner.timeslots.len();
        inner
            .timeslots
            .retain(|_, slot| !(slot.maintenance_id == maintenance_id && slot.start > after));
        Ok(before - inner.timeslots.len())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .inner
            .read()
            .await
            .settings
            .get(key)
            .map(|(_, value)| value.clone()))
    }

    async fn set_setting(&self, key: &str, value: &str, category: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .settings
            .insert(key.to_string(), (category.to_string(), value.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_insert_timeslot_deduplicates_on_start() {
        let store = MemoryStore::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap();
        let end = start + Duration::hours(1);

        let first = store.insert_timeslot(7, start, end).await.unwrap();
        let second = store.insert_timeslot(7, start, end).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.all_timeslots().await.len(), 1);

        // Same start on another window is a different slot
        store.insert_timeslot(8, start, end).await.unwrap();
        assert_eq!(store.all_timeslots().await.len(), 2);
    }

    #[tokio::test]
    async fn test_due_timeslots_filters_flag_and_start() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let due = store
            .seed_timeslot(1, now - Duration::hours(1), now, false)
            .await;
        store
            .seed_timeslot(1, now - Duration::hours(2), now, true)
            .await;
        store
            .seed_timeslot(1, now + Duration::hours(1), now + Duration::hours(2), false)
            .await;

        let found = store.due_timeslots(now).await.unwrap();
        assert_eq!(found, vec![due]);
    }

    #[tokio::test]
    async fn test_update_missing_timeslot_is_not_found() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let ghost = MaintenanceTimeslot {
            id: 42,
            maintenance_id: 1,
            start: now,
            end: now,
            generated_next: true,
        };
        assert!(matches!(
            store.update_timeslot(&ghost).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_settings_keep_category() {
        let store = MemoryStore::new();
        store
            .set_setting("serverTimezone", "Asia/Tokyo", "general")
            .await
            .unwrap();

        assert_eq!(
            store.get_setting("serverTimezone").await.unwrap().as_deref(),
            Some("Asia/Tokyo")
        );
        assert_eq!(
            store.setting_category("serverTimezone").await.as_deref(),
            Some("general")
        );
        assert_eq!(store.get_setting("missing").await.unwrap(), None);
    }
}
