//! Uptime monitoring server runtime coordinator.
//!
//! Owns the process-wide pieces of the uptime service once storage is ready:
//! the monitor and maintenance registries, the maintenance scheduler, timezone
//! resolution, client address resolution and per-user real-time snapshots.
//!
//! # Components
//!
//! - **Coordinator**: single instance per process, sequences startup and shutdown
//! - **Scheduler**: rolls due maintenance timeslots forward on a fixed period
//! - **Time authority**: resolves and persists the server timezone
//! - **Broadcaster**: pushes `monitorList`/`maintenanceList` snapshots to user channels
//! - **Client identity**: resolves the client IP, honouring proxy headers when trusted

pub mod broadcaster;
pub mod channel;
pub mod client_ip;
pub mod config;
pub mod coordinator;
pub mod error_log;
pub mod http_server;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod timezone;
pub mod types;

pub use broadcaster::{RealtimeBroadcaster, ViewMap};
pub use channel::ChannelHub;
pub use client_ip::ClientIdentity;
pub use config::{Config, ConfigError};
pub use coordinator::{Collaborators, CoordinatorCell, CoordinatorError, ServerCoordinator, StartupReport};
pub use error_log::ErrorLog;
pub use http_server::MetricsServer;
pub use metrics::MetricsRegistry;
pub use registry::{MaintenanceRegistry, MonitorRegistry, Registry};
pub use scheduler::{MaintenanceScheduler, PassReport, RecurringPass};
pub use timezone::{ActiveTimezone, TimeAuthority, TimezoneSource};
pub use types::{ClientConnection, ConnectionInfo, ServerConfig, ServerEvent};
