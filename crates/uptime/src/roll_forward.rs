//! Reference roll-forward routine for recurring maintenance windows.

use crate::store::{RollForward, TimeslotStore};
use crate::types::{MaintenanceTimeslot, MaintenanceWindow, Strategy};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use common::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Rolls recurring windows forward one slot at a time.
///
/// Occurrences are computed in UTC from the window's `start_date`. Uniqueness
/// of (window, start) is delegated to [`TimeslotStore::insert_timeslot`].
pub struct RecurringRollForward {
    timeslots: Arc<dyn TimeslotStore>,
}

impl RecurringRollForward {
    /// Create a roll-forward writing into `timeslots`
    pub fn new(timeslots: Arc<dyn TimeslotStore>) -> Self {
        Self { timeslots }
    }
}

#[async_trait]
impl RollForward for RecurringRollForward {
    async fn generate_next_timeslot(
        &self,
        window: &MaintenanceWindow,
        previous_end: DateTime<Utc>,
        force: bool,
    ) -> Result<Option<MaintenanceTimeslot>> {
        if force {
            let removed = self
                .timeslots
                .discard_future_timeslots(window.id, Utc::now())
                .await?;
            debug!(maintenance_id = window.id, removed, "Discarded future timeslots");
        }

        let Some((start, end)) = next_occurrence(window, previous_end) else {
            debug!(
                maintenance_id = window.id,
                strategy = window.strategy.name(),
                "No further occurrence"
            );
            return Ok(None);
        };

        let slot = self.timeslots.insert_timeslot(window.id, start, end).await?;
        info!(
            maintenance_id = window.id,
            slot_id = slot.id,
            start = %slot.start,
            end = %slot.end,
            "Materialized maintenance timeslot"
        );
        Ok(Some(slot))
    }
}

/// First occurrence of `window` starting at or after `after`.
///
/// `None` when the strategy has no further occurrence, including one past the
/// representable date range.
pub fn next_occurrence(
    window: &MaintenanceWindow,
    after: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let anchor = window.start_date?;
    let duration = Duration::minutes(i64::from(window.duration_minutes));

    let start = match &window.strategy {
        Strategy::Manual | Strategy::Single => return None,
        Strategy::RecurringInterval { interval_days } => {
            next_interval_start(anchor, i64::from(*interval_days), after)?
        }
        Strategy::RecurringWeekday { weekdays } => next_weekday_start(anchor, weekdays, after)?,
    };

    if let Some(last) = window.end_date {
        if start > last {
            return None;
        }
    }

    Some((start, start.checked_add_signed(duration)?))
}

fn next_interval_start(
    anchor: DateTime<Utc>,
    interval_days: i64,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if interval_days <= 0 {
        return None;
    }
    if anchor >= after {
        return Some(anchor);
    }

    let step = Duration::try_days(interval_days)?.num_seconds();
    let elapsed = (after - anchor).num_seconds();
    let steps = elapsed.checked_add(step - 1)? / step;
    let offset = Duration::try_seconds(steps.checked_mul(step)?)?;
    anchor.checked_add_signed(offset)
}

fn next_weekday_start(
    anchor: DateTime<Utc>,
    weekdays: &[u8],
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let base = after.max(anchor);
    let time_of_day = anchor.time();

    // A full week plus today covers every weekday at least once
    (0..8).find_map(|offset| {
        let day = base.date_naive().checked_add_signed(Duration::days(offset))?;
        let candidate = day.and_time(time_of_day).and_utc();
        let iso_weekday = day.weekday().number_from_monday() as u8;
        (candidate >= base && weekdays.contains(&iso_weekday)).then_some(candidate)
    })
}
