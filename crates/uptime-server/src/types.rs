//! Types shared by the coordinator components.

use http::HeaderMap;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use uptime::types::UserId;

/// Connection ID assigned by the real-time transport
pub type ConnectionId = u64;

/// Event name for monitor list snapshots
pub const MONITOR_LIST_EVENT: &str = "monitorList";

/// Event name for maintenance list snapshots
pub const MAINTENANCE_LIST_EVENT: &str = "maintenanceList";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding process-local files such as the error log
    pub data_dir: PathBuf,

    /// Interval between maintenance scheduler passes
    pub scheduler_interval: Duration,

    /// Maximum catch-up rounds within one scheduler pass
    pub scheduler_max_rounds: usize,

    /// Environment variable mirroring the active timezone
    pub timezone_env_var: String,

    /// Timezone used when neither the setting nor the environment names one
    pub timezone_fallback: String,

    /// Per-connection event queue size
    pub connection_buffer: usize,

    /// Whether the metrics endpoint is served
    pub metrics_enabled: bool,

    /// Metrics listen address
    pub metrics_listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            scheduler_interval: Duration::from_secs(60),
            scheduler_max_rounds: 64,
            timezone_env_var: "TZ".to_string(),
            timezone_fallback: "UTC".to_string(),
            connection_buffer: 64,
            metrics_enabled: false,
            metrics_listen_addr: "127.0.0.1:9102".to_string(),
        }
    }
}

/// What the transport knows about one client connection
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    /// Request headers of the handshake
    pub headers: HeaderMap,

    /// Raw peer address as reported by the socket, e.g. `::ffff:10.0.0.7`
    pub remote_addr: Option<String>,
}

/// A live real-time connection
#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub id: ConnectionId,

    /// Set once the session is authenticated
    pub user_id: Option<UserId>,

    pub info: ConnectionInfo,
}

/// Event pushed to a user's channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEvent {
    pub event: &'static str,
    pub data: serde_json::Value,
}
