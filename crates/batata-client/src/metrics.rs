//! Prometheus metrics monitoring
//!
//! Provides metrics collection for:
//! - Request latency (histogram)
//! - Service info size (gauge)
//! - Config listener count (gauge)
//! - Failed request count (counter)

use std::time::Duration;

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramVec, Opts, Registry, TextEncoder};

/// Prometheus metrics collector.
///
/// Holds its own [`Registry`] rather than registering against
/// `prometheus`'s process-wide default — this crate is embedded inside a
/// host application, which may run its own metrics and must not collide
/// with (or be reset by) ours.
pub struct MetricsMonitor {
    registry: Registry,

    /// Request latency histogram
    pub request_latency: HistogramVec,

    /// Service info size gauge
    pub service_info_size: GaugeVec,

    /// Config listener count gauge
    pub config_listener_count: GaugeVec,

    /// Failed request count counter
    pub failed_request_count: CounterVec,

    /// Success request count counter
    pub success_request_count: CounterVec,
}

impl MetricsMonitor {
    /// Create a new metrics monitor backed by a fresh private registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let request_latency = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "batata_request_latency_seconds",
                "Request latency in seconds",
            ),
            &["operation", "status"],
        )?;
        registry.register(Box::new(request_latency.clone()))?;

        let service_info_size = GaugeVec::new(
            Opts::new("batata_service_info_size_bytes", "Service info size in bytes"),
            &["service_name", "namespace_id"],
        )?;
        registry.register(Box::new(service_info_size.clone()))?;

        let config_listener_count = GaugeVec::new(
            Opts::new("batata_config_listener_count", "Number of config listeners"),
            &["data_id", "group", "tenant"],
        )?;
        registry.register(Box::new(config_listener_count.clone()))?;

        let failed_request_count = CounterVec::new(
            Opts::new("batata_failed_requests_total", "Total number of failed requests"),
            &["operation", "error_type"],
        )?;
        registry.register(Box::new(failed_request_count.clone()))?;

        let success_request_count = CounterVec::new(
            Opts::new("batata_success_requests_total", "Total number of successful requests"),
            &["operation"],
        )?;
        registry.register(Box::new(success_request_count.clone()))?;

        Ok(Self {
            registry,
            request_latency,
            service_info_size,
            config_listener_count,
            failed_request_count,
            success_request_count,
        })
    }

    /// Record request latency
    pub fn record_latency(&self, operation: &str, status: &str, duration: Duration) {
        self.request_latency
            .with_label_values(&[operation, status])
            .observe(duration.as_secs_f64());
    }

    /// Update service info size
    pub fn update_service_info_size(&self, service_name: &str, namespace_id: &str, size: u64) {
        self.service_info_size
            .with_label_values(&[service_name, namespace_id])
            .set(size as f64);
    }

    /// Update config listener count
    pub fn update_config_listener_count(
        &self,
        data_id: &str,
        group: &str,
        tenant: &str,
        count: u64,
    ) {
        self.config_listener_count
            .with_label_values(&[data_id, group, tenant])
            .set(count as f64);
    }

    /// Increment failed request count
    pub fn increment_failed_request(&self, operation: &str, error_type: &str) {
        self.failed_request_count
            .with_label_values(&[operation, error_type])
            .inc();
    }

    /// Increment success request count
    pub fn increment_success_request(&self, operation: &str) {
        self.success_request_count
            .with_label_values(&[operation])
            .inc();
    }

    /// Get metrics in Prometheus text exposition format, scraped from this
    /// monitor's own registry only.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap()
    }
}

impl Default for MetricsMonitor {
    fn default() -> Self {
        Self::new().expect("failed to create metrics monitor")
    }
}
