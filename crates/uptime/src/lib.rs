//! Domain model for the uptime coordinator.
//!
//! This crate holds the records the coordinator works with and the interfaces
//! of the collaborators it relies on:
//! - Monitor definitions and their public JSON views
//! - Maintenance windows, their timeslots and derived status
//! - Store traits for persistence and settings
//! - The roll-forward interface, with a reference implementation for
//!   recurring windows
//!
//! # Example
//!
//! ```no_run
//! use uptime::{MemoryStore, RecurringRollForward, RollForward};
//! use uptime::types::{MaintenanceWindow, Strategy};
//! use chrono::{Duration, Utc};
//! use std::sync::Arc;
//!
//! # async fn example() -> common::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let roll_forward = RecurringRollForward::new(store.clone());
//!
//! let start = Utc::now();
//! let window = MaintenanceWindow {
//!     id: 1,
//!     owner: 1,
//!     title: "Nightly backup".to_string(),
//!     description: String::new(),
//!     active: true,
//!     strategy: Strategy::RecurringInterval { interval_days: 1 },
//!     start_date: Some(start),
//!     end_date: None,
//!     duration_minutes: 30,
//! };
//!
//! let next = roll_forward
//!     .generate_next_timeslot(&window, start + Duration::minutes(30), false)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod roll_forward;
pub mod store;
pub mod types;

pub use memory::MemoryStore;
pub use roll_forward::RecurringRollForward;
pub use store::{
    MaintenanceStore, MonitorStore, NoopProbeCache, ProbeCache, RollForward, SettingsStore,
    TimeslotStore,
};
pub use types::{
    MaintenanceStatus, MaintenanceTimeslot, MaintenanceView, MaintenanceWindow, Monitor,
    MonitorView, Strategy,
};
