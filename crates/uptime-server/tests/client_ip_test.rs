//! Integration tests for client IP resolution

use http::HeaderMap;
use std::sync::Arc;
use uptime::store::TRUST_PROXY_KEY;
use uptime::{MemoryStore, SettingsStore};
use uptime_server::{ClientConnection, ClientIdentity, ConnectionInfo};

fn connection(headers: &[(&'static str, &str)], remote: Option<&str>) -> ClientConnection {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(*name, value.parse().unwrap());
    }
    ClientConnection {
        id: 1,
        user_id: Some(1),
        info: ConnectionInfo {
            headers: map,
            remote_addr: remote.map(str::to_string),
        },
    }
}

async fn identity(trust_proxy: Option<&str>) -> ClientIdentity {
    let store = Arc::new(MemoryStore::new());
    if let Some(value) = trust_proxy {
        store.set_setting(TRUST_PROXY_KEY, value, "security").await.unwrap();
    }
    ClientIdentity::new(store)
}

#[tokio::test]
async fn test_proxy_headers_ignored_when_not_trusted() {
    let identity = identity(None).await;
    let conn = connection(
        &[("x-forwarded-for", "1.2.3.4"), ("x-real-ip", "9.9.9.9")],
        Some("::ffff:10.0.0.5"),
    );

    assert!(!identity.trust_proxy().await);
    assert_eq!(identity.resolve_client_ip(&conn).await, "10.0.0.5");
}

#[tokio::test]
async fn test_first_forwarded_for_entry_wins_when_trusted() {
    let identity = identity(Some("true")).await;
    let conn = connection(
        &[("x-forwarded-for", "1.2.3.4, 5.6.7.8"), ("x-real-ip", "9.9.9.9")],
        Some("::ffff:10.0.0.5"),
    );

    assert_eq!(identity.resolve_client_ip(&conn).await, "1.2.3.4");
}

#[tokio::test]
async fn test_real_ip_used_without_forwarded_for() {
    let identity = identity(Some("1")).await;
    let conn = connection(&[("x-real-ip", "9.9.9.9")], Some("10.0.0.5"));

    assert!(identity.trust_proxy().await);
    assert_eq!(identity.resolve_client_ip(&conn).await, "9.9.9.9");
}

#[tokio::test]
async fn test_trusted_proxy_falls_back_to_baseline() {
    let identity = identity(Some("true")).await;
    let conn = connection(&[("cf-connecting-ip", "203.0.113.9")], Some("10.0.0.5"));

    assert_eq!(identity.resolve_client_ip(&conn).await, "203.0.113.9");
}

#[tokio::test]
async fn test_disabled_flag_values() {
    for value in ["false", "0", ""] {
        let identity = identity(Some(value)).await;
        let conn = connection(&[("x-forwarded-for", "1.2.3.4")], Some("10.0.0.5"));
        assert_eq!(identity.resolve_client_ip(&conn).await, "10.0.0.5", "trustProxy={:?}", value);
    }
}

#[tokio::test]
async fn test_no_address_information_yields_empty_string() {
    let identity = identity(Some("true")).await;
    assert_eq!(identity.resolve_client_ip(&connection(&[], None)).await, "");
}
