//! Per-user monitor and maintenance snapshots pushed to real-time clients.

use crate::channel::ChannelHub;
use crate::metrics::MetricsRegistry;
use crate::types::{ClientConnection, MAINTENANCE_LIST_EVENT, MONITOR_LIST_EVENT, ServerEvent};
use chrono::Utc;
use common::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uptime::types::{MaintenanceId, MonitorId, UserId};
use uptime::{
    MaintenanceStore, MaintenanceView, MaintenanceWindow, Monitor, MonitorStore, MonitorView,
    TimeslotStore,
};

/// ID -> public JSON view, in listing order
pub type ViewMap = serde_json::Map<String, Value>;

/// Builds per-user JSON views and emits them to the user's channel
pub struct RealtimeBroadcaster {
    monitors: Arc<dyn MonitorStore>,
    maintenances: Arc<dyn MaintenanceStore>,
    timeslots: Arc<dyn TimeslotStore>,
    hub: Arc<ChannelHub>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl RealtimeBroadcaster {
    /// Create a new broadcaster
    pub fn new(
        monitors: Arc<dyn MonitorStore>,
        maintenances: Arc<dyn MaintenanceStore>,
        timeslots: Arc<dyn TimeslotStore>,
        hub: Arc<ChannelHub>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            monitors,
            maintenances,
            timeslots,
            hub,
            metrics,
        }
    }

    /// Channel hub the broadcaster emits into
    pub fn hub(&self) -> &Arc<ChannelHub> {
        &self.hub
    }

    /// Monitors of `user_id` as JSON views, weight descending then name ascending.
    ///
    /// Monitors whose view fails to serialize are left out.
    pub async fn monitor_json_list(&self, user_id: UserId) -> Result<Vec<(MonitorId, Value)>> {
        let mut monitors = self.monitors.monitors_by_owner(user_id).await?;
        monitors.sort_by(Monitor::list_order);

        Ok(monitors
            .iter()
            .filter_map(|monitor| {
                to_view_value("monitor", monitor.id, &MonitorView::from(monitor))
                    .map(|value| (monitor.id, value))
            })
            .collect())
    }

    /// Maintenance windows of `user_id` as JSON views, end date descending then title ascending.
    ///
    /// Windows whose timeslots cannot be loaded or whose view fails to
    /// serialize are left out.
    pub async fn maintenance_json_list(&self, user_id: UserId) -> Result<Vec<(MaintenanceId, Value)>> {
        let mut windows = self.maintenances.maintenances_by_owner(user_id).await?;
        windows.sort_by(MaintenanceWindow::list_order);

        let now = Utc::now();
        let mut list = Vec::with_capacity(windows.len());
        for window in &windows {
            let slots = match self.timeslots.timeslots_for(window.id).await {
                Ok(slots) => slots,
                Err(e) => {
                    warn!(maintenance_id = window.id, error = %e, "Failed to load timeslots, skipping maintenance");
                    continue;
                }
            };

            if let Some(value) = to_view_value("maintenance", window.id, &MaintenanceView::new(window, &slots, now)) {
                list.push((window.id, value));
            }
        }

        Ok(list)
    }

    /// Send the connection's user their monitor list as `monitorList`
    pub async fn send_monitor_list(&self, connection: &ClientConnection) -> ViewMap {
        match connection.user_id {
            Some(user_id) => self.send_monitor_list_by_user_id(user_id).await,
            None => {
                debug!(connection_id = connection.id, "Unauthenticated connection, no monitor list");
                ViewMap::new()
            }
        }
    }

    /// Send `user_id` their monitor list as `monitorList`
    pub async fn send_monitor_list_by_user_id(&self, user_id: UserId) -> ViewMap {
        match self.monitor_json_list(user_id).await {
            Ok(list) => self.emit_list(user_id, MONITOR_LIST_EVENT, list),
            Err(e) => {
                warn!(user_id, error = %e, "Failed to load monitors");
                self.record_error("persistence");
                ViewMap::new()
            }
        }
    }

    /// Send the connection's user their maintenance list as `maintenanceList`
    pub async fn send_maintenance_list(&self, connection: &ClientConnection) -> ViewMap {
        match connection.user_id {
            Some(user_id) => self.send_maintenance_list_by_user_id(user_id).await,
            None => {
                debug!(connection_id = connection.id, "Unauthenticated connection, no maintenance list");
                ViewMap::new()
            }
        }
    }

    /// Send `user_id` their maintenance list as `maintenanceList`
    pub async fn send_maintenance_list_by_user_id(&self, user_id: UserId) -> ViewMap {
        match self.maintenance_json_list(user_id).await {
            Ok(list) => self.emit_list(user_id, MAINTENANCE_LIST_EVENT, list),
            Err(e) => {
                warn!(user_id, error = %e, "Failed to load maintenance windows");
                self.record_error("persistence");
                ViewMap::new()
            }
        }
    }

    fn emit_list(&self, user_id: UserId, event: &'static str, list: Vec<(u64, Value)>) -> ViewMap {
        let map: ViewMap = list
            .into_iter()
            .map(|(id, value)| (id.to_string(), value))
            .collect();

        let delivered = self.hub.emit(
            user_id,
            &ServerEvent {
                event,
                data: Value::Object(map.clone()),
            },
        );
        debug!(user_id, event, entries = map.len(), delivered, "Emitted list");

        if let Some(ref m) = self.metrics {
            m.record_event(event, delivered);
        }

        map
    }

    fn record_error(&self, error_type: &str) {
        if let Some(ref m) = self.metrics {
            m.record_error(error_type);
        }
    }
}

fn to_view_value<T: Serialize>(kind: &str, id: u64, view: &T) -> Option<Value> {
    match serde_json::to_value(view) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(kind, id, error = %e, "Failed to serialize view, leaving it out");
            None
        }
    }
}
