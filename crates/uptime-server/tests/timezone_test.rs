//! Integration tests for timezone resolution and updates
//!
//! Each test uses its own environment variable so tests can run in parallel.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use uptime::store::{GENERAL_CATEGORY, SERVER_TIMEZONE_KEY};
use uptime::{MemoryStore, SettingsStore};
use uptime_server::TimeAuthority;

#[tokio::test]
async fn test_set_timezone_persists_and_applies() {
    let env_var = "UPTIME_TZ_TEST_SET";
    let store = Arc::new(MemoryStore::new());
    let authority = TimeAuthority::new(store.clone(), env_var, "UTC");

    authority.set_timezone("Europe/London").await.unwrap();

    assert_eq!(authority.get_timezone().await, "Europe/London");
    assert_eq!(
        store.get_setting(SERVER_TIMEZONE_KEY).await.unwrap().as_deref(),
        Some("Europe/London")
    );
    assert_eq!(
        store.setting_category(SERVER_TIMEZONE_KEY).await.as_deref(),
        Some(GENERAL_CATEGORY)
    );
    assert_eq!(std::env::var(env_var).unwrap(), "Europe/London");
    assert_eq!(authority.active().await.name, "Europe/London");

    let winter = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
    let summer = Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap();
    assert_eq!(authority.offset_at(winter).await, "+00:00");
    assert_eq!(authority.offset_at(summer).await, "+01:00");

    let offset = authority.get_timezone_offset().await;
    assert!(offset == "+00:00" || offset == "+01:00");
}

#[tokio::test]
async fn test_unknown_timezone_is_rejected() {
    let env_var = "UPTIME_TZ_TEST_REJECT";
    let store = Arc::new(MemoryStore::new());
    let authority = TimeAuthority::new(store.clone(), env_var, "UTC");
    authority.set_timezone("Asia/Kolkata").await.unwrap();

    assert!(authority.set_timezone("Mars/Olympus_Mons").await.is_err());
    assert_eq!(authority.get_timezone().await, "Asia/Kolkata");
    assert_eq!(authority.get_timezone_offset().await, "+05:30");
}

#[tokio::test]
async fn test_environment_used_when_setting_absent() {
    let env_var = "UPTIME_TZ_TEST_ENV";
    // SAFETY: this variable is private to this test
    unsafe { std::env::set_var(env_var, "Asia/Tokyo") };

    let store = Arc::new(MemoryStore::new());
    let authority = TimeAuthority::new(store, env_var, "UTC");

    assert_eq!(authority.get_timezone().await, "Asia/Tokyo");

    let active = authority.init().await.unwrap();
    assert_eq!(active.name, "Asia/Tokyo");
    assert_eq!(authority.get_timezone_offset().await, "+09:00");
}

#[tokio::test]
async fn test_stored_setting_beats_environment() {
    let env_var = "UPTIME_TZ_TEST_PRIORITY";
    // SAFETY: this variable is private to this test
    unsafe { std::env::set_var(env_var, "Asia/Tokyo") };

    let store = Arc::new(MemoryStore::new());
    store
        .set_setting(SERVER_TIMEZONE_KEY, "America/Sao_Paulo", GENERAL_CATEGORY)
        .await
        .unwrap();
    let authority = TimeAuthority::new(store, env_var, "UTC");

    let active = authority.init().await.unwrap();
    assert_eq!(active.name, "America/Sao_Paulo");
    assert_eq!(std::env::var(env_var).unwrap(), "America/Sao_Paulo");
}

#[tokio::test]
async fn test_fallback_when_nothing_configured() {
    let env_var = "UPTIME_TZ_TEST_FALLBACK_UNSET";
    let store = Arc::new(MemoryStore::new());
    let authority = TimeAuthority::new(store, env_var, "Europe/Berlin");

    assert_eq!(authority.get_timezone().await, "Europe/Berlin");
    assert_eq!(authority.init().await.unwrap().name, "Europe/Berlin");
}

#[tokio::test]
async fn test_invalid_stored_setting_is_skipped_on_init() {
    let env_var = "UPTIME_TZ_TEST_BAD_SETTING";
    let store = Arc::new(MemoryStore::new());
    store
        .set_setting(SERVER_TIMEZONE_KEY, "Not/AZone", GENERAL_CATEGORY)
        .await
        .unwrap();
    let authority = TimeAuthority::new(store, env_var, "UTC");

    assert_eq!(authority.init().await.unwrap().name, "UTC");
    assert_eq!(authority.get_timezone().await, "UTC");
    assert_eq!(authority.active().await.name, authority.get_timezone().await);
    assert_eq!(authority.get_timezone_offset().await, "+00:00");
}

#[tokio::test]
async fn test_invalid_environment_value_is_skipped() {
    let env_var = "UPTIME_TZ_TEST_BAD_ENV";
    // SAFETY: this variable is private to this test
    unsafe { std::env::set_var(env_var, "Nowhere/Special") };

    let store = Arc::new(MemoryStore::new());
    let authority = TimeAuthority::new(store, env_var, "Europe/Berlin");

    assert_eq!(authority.get_timezone().await, "Europe/Berlin");
    assert_eq!(authority.init().await.unwrap().name, "Europe/Berlin");
}
