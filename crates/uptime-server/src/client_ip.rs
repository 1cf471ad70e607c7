//! Client IP derivation behind optional reverse proxies.

use crate::types::{ClientConnection, ConnectionInfo};
use http::HeaderMap;
use std::sync::Arc;
use tracing::warn;
use uptime::SettingsStore;
use uptime::store::TRUST_PROXY_KEY;

/// Resolves client addresses using the `trustProxy` setting
pub struct ClientIdentity {
    settings: Arc<dyn SettingsStore>,
}

impl ClientIdentity {
    /// Create a resolver reading `trustProxy` from `settings`
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Current value of the `trustProxy` setting. Read failures count as `false`.
    pub async fn trust_proxy(&self) -> bool {
        match self.settings.get_setting(TRUST_PROXY_KEY).await {
            Ok(Some(value)) => parse_flag(&value),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read trustProxy setting, not trusting proxies");
                false
            }
        }
    }

    /// Trustworthy client IP of `connection`, or an empty string
    pub async fn resolve_client_ip(&self, connection: &ClientConnection) -> String {
        resolve_client_ip(&connection.info, self.trust_proxy().await)
    }
}

/// Derive the client IP from connection metadata.
///
/// The baseline is `cf-connecting-ip` or the raw peer address. With
/// `trust_proxy` set, the first `x-forwarded-for` entry and then `x-real-ip`
/// take precedence over the baseline. Everything up to the last `:` is
/// stripped from the result.
pub fn resolve_client_ip(info: &ConnectionInfo, trust_proxy: bool) -> String {
    let baseline = header_value(&info.headers, "cf-connecting-ip")
        .or_else(|| info.remote_addr.clone().filter(|addr| !addr.is_empty()))
        .unwrap_or_default();

    let chosen = if trust_proxy {
        first_forwarded_for(&info.headers)
            .or_else(|| header_value(&info.headers, "x-real-ip"))
            .unwrap_or(baseline)
    } else {
        baseline
    };

    strip_to_last_colon(&chosen).to_string()
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn first_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let chain = headers.get("x-forwarded-for")?.to_str().ok()?;
    chain
        .split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// `::ffff:10.0.0.1` becomes `10.0.0.1`
fn strip_to_last_colon(value: &str) -> &str {
    match value.rfind(':') {
        Some(idx) => &value[idx + 1..],
        None => value,
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1")
}
