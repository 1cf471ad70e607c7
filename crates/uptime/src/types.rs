//! Monitor and maintenance records and their public JSON views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Monitor ID
pub type MonitorId = u64;

/// Maintenance window ID
pub type MaintenanceId = u64;

/// Maintenance timeslot ID
pub type TimeslotId = u64;

/// Authenticated user ID
pub type UserId = u64;

/// A monitor definition as stored by the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: MonitorId,
    pub owner: UserId,
    pub name: String,

    /// Probe kind (http, port, ping, dns, ...)
    #[serde(rename = "type")]
    pub kind: String,

    pub url: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,

    /// Check interval in seconds
    pub interval: u32,

    /// Display weight, higher sorts first
    pub weight: i64,

    pub active: bool,
    pub parent: Option<MonitorId>,
    pub description: Option<String>,
}

impl Monitor {
    /// Listing order: weight descending, then name ascending.
    pub fn list_order(a: &Monitor, b: &Monitor) -> Ordering {
        b.weight.cmp(&a.weight).then_with(|| a.name.cmp(&b.name))
    }
}

/// Public JSON view of a monitor
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorView {
    pub id: MonitorId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub interval: u32,
    pub weight: i64,
    pub active: bool,
    pub parent: Option<MonitorId>,
    pub description: Option<String>,
}

impl From<&Monitor> for MonitorView {
    fn from(monitor: &Monitor) -> Self {
        Self {
            id: monitor.id,
            name: monitor.name.clone(),
            kind: monitor.kind.clone(),
            url: monitor.url.clone(),
            hostname: monitor.hostname.clone(),
            port: monitor.port,
            interval: monitor.interval,
            weight: monitor.weight,
            active: monitor.active,
            parent: monitor.parent,
            description: monitor.description.clone(),
        }
    }
}

/// How a maintenance window produces timeslots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum Strategy {
    /// Switched on and off by hand, never has timeslots
    Manual,

    /// One slot from `start_date` to `end_date`
    Single,

    /// Every `interval_days` days starting at `start_date`
    RecurringInterval { interval_days: u32 },

    /// On the listed ISO weekdays (1 = Monday .. 7 = Sunday) at the time of `start_date`
    RecurringWeekday { weekdays: Vec<u8> },
}

impl Strategy {
    /// Wire name of the strategy
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Manual => "manual",
            Strategy::Single => "single",
            Strategy::RecurringInterval { .. } => "recurring-interval",
            Strategy::RecurringWeekday { .. } => "recurring-weekday",
        }
    }
}

/// A user-defined maintenance window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub id: MaintenanceId,
    pub owner: UserId,
    pub title: String,
    pub description: String,
    pub active: bool,

    #[serde(flatten)]
    pub strategy: Strategy,

    /// First occurrence (single and recurring strategies)
    pub start_date: Option<DateTime<Utc>>,

    /// End of the single slot, or the last instant a recurring slot may start
    pub end_date: Option<DateTime<Utc>>,

    /// Length of each recurring slot in minutes
    pub duration_minutes: u32,
}

impl MaintenanceWindow {
    /// Listing order: end date descending (open-ended last), then title ascending.
    pub fn list_order(a: &MaintenanceWindow, b: &MaintenanceWindow) -> Ordering {
        let by_end = match (a.end_date, b.end_date) {
            (Some(a_end), Some(b_end)) => b_end.cmp(&a_end),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_end.then_with(|| a.title.cmp(&b.title))
    }

    /// Compute the current status from the window's timeslots.
    pub fn status(&self, timeslots: &[MaintenanceTimeslot], now: DateTime<Utc>) -> MaintenanceStatus {
        if !self.active {
            return MaintenanceStatus::Inactive;
        }

        if self.strategy == Strategy::Manual {
            return MaintenanceStatus::UnderMaintenance;
        }

        if timeslots.iter().any(|slot| slot.contains(now)) {
            MaintenanceStatus::UnderMaintenance
        } else if timeslots.iter().any(|slot| slot.start > now) {
            MaintenanceStatus::Scheduled
        } else if !timeslots.is_empty() {
            MaintenanceStatus::Ended
        } else {
            MaintenanceStatus::Unknown
        }
    }
}

/// One materialized occurrence of a maintenance window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceTimeslot {
    pub id: TimeslotId,
    pub maintenance_id: MaintenanceId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,

    /// Set once the successor slot has been created
    pub generated_next: bool,
}

impl MaintenanceTimeslot {
    /// Whether `at` falls inside this slot (end exclusive)
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Derived status of a maintenance window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaintenanceStatus {
    Inactive,
    UnderMaintenance,
    Scheduled,
    Ended,
    Unknown,
}

impl fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenanceStatus::Inactive => write!(f, "inactive"),
            MaintenanceStatus::UnderMaintenance => write!(f, "under-maintenance"),
            MaintenanceStatus::Scheduled => write!(f, "scheduled"),
            MaintenanceStatus::Ended => write!(f, "ended"),
            MaintenanceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Public JSON view of a timeslot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeslotView {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Public JSON view of a maintenance window
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceView {
    pub id: MaintenanceId,
    pub title: String,
    pub description: String,
    pub strategy: &'static str,
    pub active: bool,
    pub status: MaintenanceStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub duration: u32,
    pub interval_day: Option<u32>,
    pub weekdays: Vec<u8>,
    pub timeslot_list: Vec<TimeslotView>,
}

impl MaintenanceView {
    /// Build the view of `window` with its timeslots as of `now`
    pub fn new(
        window: &MaintenanceWindow,
        timeslots: &[MaintenanceTimeslot],
        now: DateTime<Utc>,
    ) -> Self {
        let (interval_day, weekdays) = match &window.strategy {
            Strategy::RecurringInterval { interval_days } => (Some(*interval_days), Vec::new()),
            Strategy::RecurringWeekday { weekdays } => (None, weekdays.clone()),
            Strategy::Manual | Strategy::Single => (None, Vec::new()),
        };

        let mut upcoming: Vec<&MaintenanceTimeslot> =
            timeslots.iter().filter(|slot| slot.end > now).collect();
        upcoming.sort_by_key(|slot| slot.start);

        Self {
            id: window.id,
            title: window.title.clone(),
            description: window.description.clone(),
            strategy: window.strategy.name(),
            active: window.active,
            status: window.status(timeslots, now),
            start_date: window.start_date,
            end_date: window.end_date,
            duration: window.duration_minutes,
            interval_day,
            weekdays,
            timeslot_list: upcoming
                .into_iter()
                .map(|slot| TimeslotView {
                    start_date: slot.start,
                    end_date: slot.end,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn monitor(id: MonitorId, name: &str, weight: i64) -> Monitor {
        Monitor {
            id,
            owner: 1,
            name: name.to_string(),
            kind: "http".to_string(),
            url: Some("https://example.com".to_string()),
            hostname: None,
            port: None,
            interval: 60,
            weight,
            active: true,
            parent: None,
            description: None,
        }
    }

    fn window(id: MaintenanceId, title: &str, end: Option<DateTime<Utc>>) -> MaintenanceWindow {
        MaintenanceWindow {
            id,
            owner: 1,
            title: title.to_string(),
            description: String::new(),
            active: true,
            strategy: Strategy::Single,
            start_date: None,
            end_date: end,
            duration_minutes: 60,
        }
    }

    fn slot(start: DateTime<Utc>, minutes: i64) -> MaintenanceTimeslot {
        MaintenanceTimeslot {
            id: 1,
            maintenance_id: 1,
            start,
            end: start + Duration::minutes(minutes),
            generated_next: false,
        }
    }

    #[test]
    fn test_monitor_order_weight_then_name() {
        let mut monitors = vec![
            monitor(1, "beta", 100),
            monitor(2, "alpha", 100),
            monitor(3, "zulu", 2000),
            monitor(4, "Alpha", 100),
        ];
        monitors.sort_by(Monitor::list_order);

        let names: Vec<_> = monitors.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["zulu", "Alpha", "alpha", "beta"]);
    }

    #[test]
    fn test_maintenance_order_end_desc_open_ended_last() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut windows = vec![
            window(1, "open", None),
            window(2, "b-early", Some(early)),
            window(3, "late", Some(late)),
            window(4, "a-early", Some(early)),
        ];
        windows.sort_by(MaintenanceWindow::list_order);

        let titles: Vec<_> = windows.iter().map(|w| w.title.as_str()).collect();
        assert_eq!(titles, vec!["late", "a-early", "b-early", "open"]);
    }

    #[test]
    fn test_status_transitions() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let mut w = window(1, "w", None);

        assert_eq!(w.status(&[], now), MaintenanceStatus::Unknown);
        assert_eq!(
            w.status(&[slot(now - Duration::minutes(30), 60)], now),
            MaintenanceStatus::UnderMaintenance
        );
        assert_eq!(
            w.status(&[slot(now + Duration::hours(1), 60)], now),
            MaintenanceStatus::Scheduled
        );
        assert_eq!(
            w.status(&[slot(now - Duration::hours(3), 60)], now),
            MaintenanceStatus::Ended
        );

        w.strategy = Strategy::Manual;
        assert_eq!(w.status(&[], now), MaintenanceStatus::UnderMaintenance);

        w.active = false;
        assert_eq!(w.status(&[], now), MaintenanceStatus::Inactive);
    }

    #[test]
    fn test_strategy_serde_is_flattened() {
        let mut w = window(9, "weekly", None);
        w.strategy = Strategy::RecurringWeekday { weekdays: vec![1, 3] };

        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["strategy"], "recurring-weekday");
        assert_eq!(json["weekdays"], serde_json::json!([1, 3]));

        let back: MaintenanceWindow = serde_json::from_value(json).unwrap();
        assert_eq!(back, w);
    }

    #[test]
    fn test_maintenance_view_lists_only_unfinished_slots() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let w = window(1, "w", None);
        let slots = vec![
            slot(now + Duration::days(1), 60),
            slot(now - Duration::days(1), 60),
            slot(now - Duration::minutes(10), 60),
        ];

        let view = MaintenanceView::new(&w, &slots, now);
        assert_eq!(view.status, MaintenanceStatus::UnderMaintenance);
        assert_eq!(view.timeslot_list.len(), 2);
        assert!(view.timeslot_list[0].start_date < view.timeslot_list[1].start_date);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "under-maintenance");
        assert_eq!(json["strategy"], "single");
        assert!(json.get("timeslotList").is_some());
    }
}
