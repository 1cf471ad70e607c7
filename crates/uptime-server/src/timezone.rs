//! Active timezone resolution and updates.

use chrono::{DateTime, Offset, Utc};
use chrono_tz::Tz;
use common::{Error, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uptime::SettingsStore;
use uptime::store::{GENERAL_CATEGORY, SERVER_TIMEZONE_KEY};

/// The timezone used for time-based logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTimezone {
    pub name: String,
    pub tz: Tz,
}

/// Where a resolved timezone came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimezoneSource {
    Setting,
    Environment,
    Fallback,
}

/// Owns the active timezone.
///
/// The stored setting is the authority. The environment variable and the
/// in-process [`ActiveTimezone`] are caches refreshed by [`TimeAuthority::set_timezone`].
pub struct TimeAuthority {
    settings: Arc<dyn SettingsStore>,
    env_var: String,
    fallback: String,
    active: RwLock<ActiveTimezone>,
}

impl TimeAuthority {
    /// Create an authority reading `env_var` and falling back to `fallback`
    pub fn new(settings: Arc<dyn SettingsStore>, env_var: impl Into<String>, fallback: impl Into<String>) -> Self {
        let fallback = fallback.into();
        let active = match fallback.parse::<Tz>() {
            Ok(tz) => ActiveTimezone {
                name: fallback.clone(),
                tz,
            },
            Err(_) => ActiveTimezone {
                name: "UTC".to_string(),
                tz: Tz::UTC,
            },
        };

        Self {
            settings,
            env_var: env_var.into(),
            fallback,
            active: RwLock::new(active),
        }
    }

    /// Timezone name by priority: stored setting, environment, host default.
    ///
    /// Sources naming an unknown zone are passed over, the same way
    /// [`TimeAuthority::init`] skips them.
    pub async fn get_timezone(&self) -> String {
        let active = self.active.read().await;

        match self.settings.get_setting(SERVER_TIMEZONE_KEY).await {
            Ok(Some(name)) if is_known(&name) => return name,
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read timezone setting"),
        }

        if let Some(name) = self.env_timezone().filter(|name| is_known(name)) {
            return name;
        }

        if is_known(&self.fallback) {
            self.fallback.clone()
        } else {
            active.name.clone()
        }
    }

    /// Resolve the startup timezone and apply it to the caches.
    ///
    /// Sources naming an unknown zone are skipped with a warning.
    pub async fn init(&self) -> Result<ActiveTimezone> {
        let stored = match self.settings.get_setting(SERVER_TIMEZONE_KEY).await {
            Ok(value) => value.filter(|name| !name.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read timezone setting");
                None
            }
        };

        let candidates = [
            (TimezoneSource::Setting, stored),
            (TimezoneSource::Environment, self.env_timezone()),
            (TimezoneSource::Fallback, Some(self.fallback.clone())),
        ];

        for (source, name) in candidates {
            let Some(name) = name else { continue };
            match name.parse::<Tz>() {
                Ok(tz) => {
                    let mut active = self.active.write().await;
                    self.export_env(&name);
                    *active = ActiveTimezone { name, tz };
                    info!(timezone = %active.name, source = ?source, "Active timezone resolved");
                    return Ok(active.clone());
                }
                Err(_) => warn!(timezone = %name, source = ?source, "Ignoring unknown timezone"),
            }
        }

        Err(Error::timezone(format!(
            "no usable timezone, fallback {} is unknown",
            self.fallback
        )))
    }

    /// Persist `name` and refresh the caches before returning
    pub async fn set_timezone(&self, name: &str) -> Result<()> {
        let tz = name
            .parse::<Tz>()
            .map_err(|_| Error::timezone(format!("unknown timezone {}", name)))?;

        let mut active = self.active.write().await;
        self.settings
            .set_setting(SERVER_TIMEZONE_KEY, name, GENERAL_CATEGORY)
            .await?;
        self.export_env(name);
        *active = ActiveTimezone {
            name: name.to_string(),
            tz,
        };

        info!(timezone = name, "Server timezone updated");
        Ok(())
    }

    /// Current UTC offset of the active timezone as `±HH:mm`
    pub async fn get_timezone_offset(&self) -> String {
        self.offset_at(Utc::now()).await
    }

    /// UTC offset of the active timezone at `at`
    pub async fn offset_at(&self, at: DateTime<Utc>) -> String {
        let tz = self.active.read().await.tz;
        format_offset(at.with_timezone(&tz).offset().fix().local_minus_utc())
    }

    /// Snapshot of the active timezone
    pub async fn active(&self) -> ActiveTimezone {
        self.active.read().await.clone()
    }

    fn env_timezone(&self) -> Option<String> {
        std::env::var(&self.env_var)
            .ok()
            .filter(|name| !name.trim().is_empty())
    }

    fn export_env(&self, name: &str) {
        // SAFETY: set_var is unsound if another thread reads the environment
        // through libc (getenv, localtime) at the same time. Nothing in this
        // process does: timezone math goes through chrono-tz, and std::env
        // readers are serialized with this write by std's own lock.
        unsafe { std::env::set_var(&self.env_var, name) };
    }
}

fn is_known(name: &str) -> bool {
    !name.trim().is_empty() && name.parse::<Tz>().is_ok()
}

/// Format an offset in seconds as `±HH:mm`
pub fn format_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.unsigned_abs() / 60;
    format!("{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uptime::MemoryStore;

    #[test]
    fn test_format_offset() {
        assert_eq!(format_offset(0), "+00:00");
        assert_eq!(format_offset(3600), "+01:00");
        assert_eq!(format_offset(-5 * 3600), "-05:00");
        assert_eq!(format_offset(5 * 3600 + 45 * 60), "+05:45");
        assert_eq!(format_offset(-(9 * 3600 + 30 * 60)), "-09:30");
    }

    #[tokio::test]
    async fn test_offset_at_follows_dst() {
        let store = Arc::new(MemoryStore::new());
        let authority = TimeAuthority::new(store, "UPTIME_TEST_TZ_DST", "UTC");
        authority.set_timezone("America/New_York").await.unwrap();

        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let summer = Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap();
        assert_eq!(authority.offset_at(winter).await, "-05:00");
        assert_eq!(authority.offset_at(summer).await, "-04:00");
    }

    #[tokio::test]
    async fn test_unknown_fallback_defaults_to_utc() {
        let store = Arc::new(MemoryStore::new());
        let authority = TimeAuthority::new(store, "UPTIME_TEST_TZ_BAD_FALLBACK", "Nowhere/Atlantis");

        assert_eq!(authority.active().await.tz, Tz::UTC);
        assert!(authority.init().await.is_err());
    }
}
