//! Maintenance scheduler: rolls due timeslots forward exactly once.

use crate::error_log::ErrorLog;
use crate::metrics::MetricsRegistry;
use chrono::Utc;
use common::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};
use uptime::types::TimeslotId;
use uptime::{MaintenanceStore, MaintenanceTimeslot, RollForward, TimeslotStore};

/// Outcome of one scheduler pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Query rounds that returned unattempted slots
    pub rounds: usize,
    /// Due slots picked up
    pub due: usize,
    /// Slots flagged `generated_next`
    pub rolled: usize,
    /// Successor slots created by this pass
    pub generated: usize,
    /// Slots left unflagged because a step failed
    pub failed: usize,
}

/// Finds due maintenance timeslots and materializes their successors
pub struct MaintenanceScheduler {
    timeslots: Arc<dyn TimeslotStore>,
    maintenances: Arc<dyn MaintenanceStore>,
    roll_forward: Arc<dyn RollForward>,
    max_rounds: usize,
    metrics: Option<Arc<MetricsRegistry>>,
    error_log: Option<Arc<ErrorLog>>,

    /// Serializes passes within this process
    pass_lock: Mutex<()>,
}

impl MaintenanceScheduler {
    /// Create a new scheduler
    pub fn new(
        timeslots: Arc<dyn TimeslotStore>,
        maintenances: Arc<dyn MaintenanceStore>,
        roll_forward: Arc<dyn RollForward>,
        max_rounds: usize,
    ) -> Self {
        Self {
            timeslots,
            maintenances,
            roll_forward,
            max_rounds: max_rounds.max(1),
            metrics: None,
            error_log: None,
            pass_lock: Mutex::new(()),
        }
    }

    /// Record pass metrics in `metrics`
    pub fn with_metrics(mut self, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Write per-slot failures to `error_log`
    pub fn with_error_log(mut self, error_log: Arc<ErrorLog>) -> Self {
        self.error_log = Some(error_log);
        self
    }

    /// Run one pass over every due timeslot.
    ///
    /// Each slot is handled on its own: a failure leaves that slot unflagged
    /// for the next pass and does not stop its siblings. After the first
    /// snapshot the store is queried again so slots that became due during
    /// the pass (e.g. successors of long-overdue slots) are picked up too.
    pub async fn generate_maintenance_timeslots(&self) -> PassReport {
        let _pass = self.pass_lock.lock().await;
        let started = Instant::now();
        let mut attempted: HashSet<TimeslotId> = HashSet::new();
        let mut report = PassReport::default();

        for _ in 0..self.max_rounds {
            let due = match self.timeslots.due_timeslots(Utc::now()).await {
                Ok(slots) => slots,
                Err(e) => {
                    warn!(error = %e, "Failed to query due maintenance timeslots");
                    self.record_failure("persistence", &e).await;
                    break;
                }
            };

            let fresh: Vec<MaintenanceTimeslot> = due
                .into_iter()
                .filter(|slot| attempted.insert(slot.id))
                .collect();
            if fresh.is_empty() {
                break;
            }

            report.rounds += 1;
            report.due += fresh.len();

            for slot in fresh {
                let slot_id = slot.id;
                let maintenance_id = slot.maintenance_id;
                match self.roll_slot(slot).await {
                    Ok(created) => {
                        report.rolled += 1;
                        if created {
                            report.generated += 1;
                        }
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!(slot_id, maintenance_id, error = %e, "Failed to roll maintenance timeslot forward");
                        self.record_failure("timeslot", &e).await;
                    }
                }
            }
        }

        let elapsed = started.elapsed();
        if let Some(ref m) = self.metrics {
            m.record_pass(report.rolled, report.generated, report.failed, elapsed);
        }

        if report.due > 0 {
            info!(
                due = report.due,
                rolled = report.rolled,
                generated = report.generated,
                failed = report.failed,
                rounds = report.rounds,
                duration_ms = elapsed.as_millis(),
                "Maintenance scheduler pass finished"
            );
        } else {
            debug!("No maintenance timeslots due");
        }

        report
    }

    /// Roll one slot forward, then flag it. Returns whether a new successor
    /// slot was stored, as opposed to an existing one being returned.
    ///
    /// The flag is written only after the roll-forward succeeded. A crash in
    /// between re-runs the idempotent roll-forward on the next pass.
    async fn roll_slot(&self, mut slot: MaintenanceTimeslot) -> Result<bool> {
        let window = self
            .maintenances
            .maintenance(slot.maintenance_id)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!(
                    "maintenance {} of timeslot {}",
                    slot.maintenance_id, slot.id
                ))
            })?;

        let known: HashSet<TimeslotId> = self
            .timeslots
            .timeslots_for(window.id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let next = self
            .roll_forward
            .generate_next_timeslot(&window, slot.end, false)
            .await?;

        slot.generated_next = true;
        self.timeslots.update_timeslot(&slot).await?;

        debug!(
            slot_id = slot.id,
            maintenance_id = slot.maintenance_id,
            next_slot_id = next.as_ref().map(|n| n.id),
            "Maintenance timeslot rolled forward"
        );
        Ok(next.is_some_and(|n| !known.contains(&n.id)))
    }

    async fn record_failure(&self, error_type: &str, error: &Error) {
        if let Some(ref m) = self.metrics {
            m.record_error(error_type);
        }
        if let Some(ref log) = self.error_log {
            log.append(error, false).await;
        }
    }

    /// Arm a pass every `period`, first firing one period from now.
    ///
    /// The timer task waits for each pass, so a slow pass delays the next
    /// tick instead of overlapping with it. Each pass runs in its own task: a
    /// panicking pass is logged and the timer keeps going.
    pub fn spawn_recurring(self: &Arc<Self>, period: Duration) -> RecurringPass {
        let scheduler = Arc::clone(self);
        let stop_signal = Arc::new(Notify::new());
        let stop = stop_signal.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = stop.notified() => {
                        info!("Maintenance scheduler stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let pass = Arc::clone(&scheduler);
                        let run = tokio::spawn(async move { pass.generate_maintenance_timeslots().await });
                        if let Err(e) = run.await {
                            error!(error = %e, "Maintenance scheduler pass aborted");
                            if let Some(ref m) = scheduler.metrics {
                                m.record_error("scheduler_pass");
                            }
                        }
                    }
                }
            }
        });

        info!(period_secs = period.as_secs(), "Maintenance scheduler armed");
        RecurringPass {
            handle,
            stop_signal,
        }
    }
}

/// Handle to an armed recurring pass
pub struct RecurringPass {
    handle: JoinHandle<()>,
    stop_signal: Arc<Notify>,
}

impl RecurringPass {
    /// Whether the timer task is still running
    pub fn is_armed(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the next scheduled pass. An in-flight pass runs to completion.
    ///
    /// The returned handle resolves once the timer task has exited.
    pub fn cancel(self) -> JoinHandle<()> {
        self.stop_signal.notify_one();
        self.handle
    }
}
