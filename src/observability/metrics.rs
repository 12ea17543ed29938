use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::provision::ProvisionOutcome;

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Total provisioning requests handled
    pub provisions_total: AtomicU64,

    /// Provisioning requests by outcome
    pub provisions_changed: AtomicU64,
    pub provisions_unchanged: AtomicU64,
    pub provision_errors: AtomicU64,

    /// Rule files newly registered in the host config
    pub config_registrations: AtomicU64,

    /// Provisioning latency buckets (compare + write, excluding reload)
    pub latency_under_1ms: AtomicU64,
    pub latency_1_10ms: AtomicU64,
    pub latency_10_100ms: AtomicU64,
    pub latency_over_100ms: AtomicU64,
    pub latency_sum_micros: AtomicU64,

    /// Reload calls
    pub reloads_total: AtomicU64,
    pub reload_errors: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record a successful provisioning run.
    pub fn record_provision(&self, outcome: &ProvisionOutcome) {
        self.provisions_total.fetch_add(1, Ordering::Relaxed);

        if outcome.changed() {
            self.provisions_changed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.provisions_unchanged.fetch_add(1, Ordering::Relaxed);
        }

        if outcome.config_changed {
            self.config_registrations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a failed provisioning run.
    pub fn record_provision_error(&self) {
        self.provisions_total.fetch_add(1, Ordering::Relaxed);
        self.provision_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record provisioning latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;
        self.latency_sum_micros.fetch_add(micros, Ordering::Relaxed);

        if micros < 1_000 {
            self.latency_under_1ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 10_000 {
            self.latency_1_10ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 100_000 {
            self.latency_10_100ms.fetch_add(1, Ordering::Relaxed);
        } else {
            self.latency_over_100ms.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a reload attempt.
    pub fn record_reload(&self, success: bool) {
        self.reloads_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.reload_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let under_1 = self.latency_under_1ms.load(Ordering::Relaxed);
        let under_10 = under_1 + self.latency_1_10ms.load(Ordering::Relaxed);
        let under_100 = under_10 + self.latency_10_100ms.load(Ordering::Relaxed);
        let all = under_100 + self.latency_over_100ms.load(Ordering::Relaxed);

        format!(
            r#"# HELP ruleprov_provisions_total Total number of provisioning requests
# TYPE ruleprov_provisions_total counter
ruleprov_provisions_total {}

# HELP ruleprov_provisions Provisioning requests by outcome
# TYPE ruleprov_provisions counter
ruleprov_provisions{{outcome="changed"}} {}
ruleprov_provisions{{outcome="unchanged"}} {}
ruleprov_provisions{{outcome="error"}} {}

# HELP ruleprov_config_registrations_total Rule files newly registered in the host config
# TYPE ruleprov_config_registrations_total counter
ruleprov_config_registrations_total {}

# HELP ruleprov_provision_latency Provisioning latency in seconds
# TYPE ruleprov_provision_latency histogram
ruleprov_provision_latency_bucket{{le="0.001"}} {}
ruleprov_provision_latency_bucket{{le="0.01"}} {}
ruleprov_provision_latency_bucket{{le="0.1"}} {}
ruleprov_provision_latency_bucket{{le="+Inf"}} {}
ruleprov_provision_latency_sum {}
ruleprov_provision_latency_count {}

# HELP ruleprov_reloads_total Reload requests sent to the monitoring engine
# TYPE ruleprov_reloads_total counter
ruleprov_reloads_total {}

# HELP ruleprov_reload_errors_total Failed reload requests
# TYPE ruleprov_reload_errors_total counter
ruleprov_reload_errors_total {}
"#,
            self.provisions_total.load(Ordering::Relaxed),
            self.provisions_changed.load(Ordering::Relaxed),
            self.provisions_unchanged.load(Ordering::Relaxed),
            self.provision_errors.load(Ordering::Relaxed),
            self.config_registrations.load(Ordering::Relaxed),
            under_1,
            under_10,
            under_100,
            all,
            self.latency_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            all,
            self.reloads_total.load(Ordering::Relaxed),
            self.reload_errors.load(Ordering::Relaxed),
        )
    }
}
