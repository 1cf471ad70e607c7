//! Prometheus metrics for the uptime coordinator.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Labels for timeslot outcome metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    /// Outcome (rolled, generated, failed)
    pub outcome: String,
}

/// Labels for real-time event metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EventLabels {
    /// Event name (monitorList, maintenanceList)
    pub event: String,
}

/// Labels for error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    /// Error type (persistence, settings, error_log, ...)
    pub error_type: String,
}

/// Metrics registry with all coordinator metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    // Scheduler metrics
    /// Scheduler passes completed
    scheduler_passes_total: Counter,
    /// Timeslots processed by outcome
    timeslots_total: Family<OutcomeLabels, Counter>,
    /// Scheduler pass duration
    scheduler_pass_duration_seconds: Histogram,

    // Real-time metrics
    /// Events emitted to user channels
    events_emitted_total: Family<EventLabels, Counter>,
    /// Connections that received an event
    event_deliveries_total: Family<EventLabels, Counter>,
    /// Live real-time connections
    connections_active: Gauge,

    // Registry metrics
    /// Monitors in the registry
    monitors_registered: Gauge,
    /// Maintenance windows in the registry
    maintenances_registered: Gauge,

    /// Errors by type
    errors_total: Family<ErrorLabels, Counter>,
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let scheduler_passes_total = Counter::default();
        registry.register(
            "uptime_scheduler_passes",
            "Total maintenance scheduler passes",
            scheduler_passes_total.clone(),
        );

        let timeslots_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "uptime_timeslots",
            "Maintenance timeslots processed by outcome",
            timeslots_total.clone(),
        );

        // Exponential buckets from 1ms to ~16s
        let scheduler_pass_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 15));
        registry.register(
            "uptime_scheduler_pass_duration_seconds",
            "Maintenance scheduler pass duration",
            scheduler_pass_duration_seconds.clone(),
        );

        let events_emitted_total = Family::<EventLabels, Counter>::default();
        registry.register(
            "uptime_events_emitted",
            "Real-time events emitted to user channels",
            events_emitted_total.clone(),
        );

        let event_deliveries_total = Family::<EventLabels, Counter>::default();
        registry.register(
            "uptime_event_deliveries",
            "Real-time events queued on individual connections",
            event_deliveries_total.clone(),
        );

        let connections_active = Gauge::default();
        registry.register(
            "uptime_connections_active",
            "Live real-time connections",
            connections_active.clone(),
        );

        let monitors_registered = Gauge::default();
        registry.register(
            "uptime_monitors_registered",
            "Monitors in the in-memory registry",
            monitors_registered.clone(),
        );

        let maintenances_registered = Gauge::default();
        registry.register(
            "uptime_maintenances_registered",
            "Maintenance windows in the in-memory registry",
            maintenances_registered.clone(),
        );

        let errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "uptime_errors",
            "Total errors by type",
            errors_total.clone(),
        );

        Self {
            registry,
            scheduler_passes_total,
            timeslots_total,
            scheduler_pass_duration_seconds,
            events_emitted_total,
            event_deliveries_total,
            connections_active,
            monitors_registered,
            maintenances_registered,
            errors_total,
        }
    }

    /// Record a completed scheduler pass
    pub fn record_pass(&self, rolled: usize, generated: usize, failed: usize, duration: Duration) {
        self.scheduler_passes_total.inc();
        self.scheduler_pass_duration_seconds
            .observe(duration.as_secs_f64());

        for (outcome, count) in [("rolled", rolled), ("generated", generated), ("failed", failed)] {
            if count > 0 {
                self.timeslots_total
                    .get_or_create(&OutcomeLabels {
                        outcome: outcome.to_string(),
                    })
                    .inc_by(count as u64);
            }
        }
    }

    /// Record an event emitted to a user channel
    pub fn record_event(&self, event: &str, deliveries: usize) {
        let labels = EventLabels {
            event: event.to_string(),
        };
        self.events_emitted_total.get_or_create(&labels).inc();
        self.event_deliveries_total
            .get_or_create(&labels)
            .inc_by(deliveries as u64);
    }

    /// Update live connection count
    pub fn update_connection_count(&self, count: usize) {
        self.connections_active.set(count as i64);
    }

    /// Update registry sizes
    pub fn update_registry_sizes(&self, monitors: usize, maintenances: usize) {
        self.monitors_registered.set(monitors as i64);
        self.maintenances_registered.set(maintenances as i64);
    }

    /// Record an error
    pub fn record_error(&self, error_type: &str) {
        self.errors_total
            .get_or_create(&ErrorLabels {
                error_type: error_type.to_string(),
            })
            .inc();
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    fn encoded(registry: &MetricsRegistry) -> String {
        let mut buffer = String::new();
        encode(&mut buffer, &registry.registry).unwrap();
        buffer
    }

    #[test]
    fn test_record_pass() {
        let registry = MetricsRegistry::new();
        registry.record_pass(3, 2, 1, Duration::from_millis(40));

        let text = encoded(&registry);
        assert!(text.contains("uptime_scheduler_passes_total 1"));
        assert!(text.contains(r#"uptime_timeslots_total{outcome="rolled"} 3"#));
        assert!(text.contains(r#"uptime_timeslots_total{outcome="failed"} 1"#));
    }

    #[test]
    fn test_record_event() {
        let registry = MetricsRegistry::new();
        registry.record_event("monitorList", 2);
        registry.record_event("monitorList", 1);

        let text = encoded(&registry);
        assert!(text.contains(r#"uptime_events_emitted_total{event="monitorList"} 2"#));
        assert!(text.contains(r#"uptime_event_deliveries_total{event="monitorList"} 3"#));
    }

    #[test]
    fn test_gauges() {
        let registry = MetricsRegistry::new();
        registry.update_connection_count(4);
        registry.update_registry_sizes(10, 2);
        registry.record_error("persistence");

        let text = encoded(&registry);
        assert!(text.contains("uptime_connections_active 4"));
        assert!(text.contains("uptime_monitors_registered 10"));
        assert!(text.contains(r#"uptime_errors_total{error_type="persistence"} 1"#));
    }
}
