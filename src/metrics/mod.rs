//! Prometheus metrics for radshift
//!
//! This module provides metrics tracking for:
//! - Ingestion: batches by final state, rows persisted
//! - Promotion: attempts by outcome
//! - Coverage: data-source calls and calculation time per query
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

struct EngineMetrics {
    batches: CounterVec,
    rows_imported: CounterVec,
    promotions: CounterVec,
    coverage_fetches: Histogram,
    coverage_duration: HistogramVec,
}

/// Global storage for engine metrics
static ENGINE_METRICS: OnceLock<EngineMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, subsequent metric operations become no-ops.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = EngineMetrics {
        batches: register_counter_vec!(
            "radshift_batches_total",
            "Scrape batches by final state",
            &["hospital", "state"]
        )?,
        rows_imported: register_counter_vec!(
            "radshift_rows_imported_total",
            "Shift and assignment rows persisted by imports",
            &["hospital"]
        )?,
        promotions: register_counter_vec!(
            "radshift_promotions_total",
            "Promotion attempts by outcome",
            &["outcome"]
        )?,
        coverage_fetches: register_histogram!(
            "radshift_coverage_fetches",
            "Data-source calls per coverage query",
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 10.0]
        )?,
        coverage_duration: register_histogram_vec!(
            "radshift_coverage_duration_seconds",
            "Coverage query duration in seconds",
            &["query"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
        )?,
    };

    ENGINE_METRICS
        .set(metrics)
        .map_err(|_| "Engine metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    ENGINE_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a batch reaching a terminal state
pub fn record_batch(hospital: &str, state: &str, rows: u32) {
    let Some(m) = ENGINE_METRICS.get() else {
        return;
    };

    m.batches.with_label_values(&[hospital, state]).inc();
    if rows > 0 {
        m.rows_imported
            .with_label_values(&[hospital])
            .inc_by(f64::from(rows));
    }
}

/// Record a promotion attempt (`promoted`, `blocked`, `rejected`, `error`)
pub fn record_promotion(outcome: &str) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.promotions.with_label_values(&[outcome]).inc();
    }
}

/// Record the number of data-source calls used by a coverage query
pub fn record_coverage_fetches(fetches: usize) {
    if let Some(m) = ENGINE_METRICS.get() {
        m.coverage_fetches.observe(fetches as f64);
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a coverage query timer
pub fn start_coverage_timer(query: &str) -> MetricsTimer {
    match ENGINE_METRICS.get() {
        Some(m) => MetricsTimer::new(m.coverage_duration.with_label_values(&[query]).start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
