/*!
 * # Metrics Module
 *
 * Prometheus instruments for the forecasting engine:
 *
 * - forecasts produced, by algorithm and period
 * - per-item failures, by error kind
 * - forecast computation latency
 * - bulk generation runs and their outcome
 *
 * Everything is registered on a crate-local registry; [`render`] returns the
 * Prometheus text exposition format.
 */

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;

use crate::models::{ForecastAlgorithm, ForecastPeriod};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new_custom(Some("pharmastock".to_string()), None)
        .expect("registry can be created");
    static ref FORECASTS_GENERATED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "forecasts_generated_total",
            "Total number of forecasts computed"
        ),
        &["algorithm", "period"]
    )
    .expect("metric can be created");
    static ref FORECAST_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "forecast_failures_total",
            "Total number of forecasts that could not be produced"
        ),
        &["reason"]
    )
    .expect("metric can be created");
    static ref FORECAST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "forecast_computation_seconds",
            "Time spent fetching data for and computing a single forecast"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
    )
    .expect("metric can be created");
    static ref BULK_RUNS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "bulk_generation_runs_total",
            "Total number of bulk generation runs"
        ),
        &["outcome"]
    )
    .expect("metric can be created");
    static ref BULK_ITEMS_SKIPPED: IntCounter = IntCounter::new(
        "bulk_generation_skipped_total",
        "Items never dispatched because a bulk run was cancelled"
    )
    .expect("metric can be created");
}

fn ensure_registered() {
    use std::sync::Once;
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        // Registration only fails on duplicate names, which the Once rules out.
        let _ = REGISTRY.register(Box::new(FORECASTS_GENERATED.clone()));
        let _ = REGISTRY.register(Box::new(FORECAST_FAILURES.clone()));
        let _ = REGISTRY.register(Box::new(FORECAST_DURATION.clone()));
        let _ = REGISTRY.register(Box::new(BULK_RUNS.clone()));
        let _ = REGISTRY.register(Box::new(BULK_ITEMS_SKIPPED.clone()));
    });
}

pub fn record_forecast(algorithm: ForecastAlgorithm, period: ForecastPeriod, seconds: f64) {
    ensure_registered();
    FORECASTS_GENERATED
        .with_label_values(&[algorithm.as_ref(), period.as_ref()])
        .inc();
    FORECAST_DURATION.observe(seconds);
}

pub fn record_failure(reason: &str) {
    ensure_registered();
    FORECAST_FAILURES.with_label_values(&[reason]).inc();
}

pub fn record_bulk_run(cancelled: bool, skipped: usize) {
    ensure_registered();
    let outcome = if cancelled { "cancelled" } else { "completed" };
    BULK_RUNS.with_label_values(&[outcome]).inc();
    BULK_ITEMS_SKIPPED.inc_by(skipped as u64);
}

pub fn forecasts_generated(algorithm: ForecastAlgorithm, period: ForecastPeriod) -> u64 {
    FORECASTS_GENERATED
        .with_label_values(&[algorithm.as_ref(), period.as_ref()])
        .get()
}

pub fn failures(reason: &str) -> u64 {
    FORECAST_FAILURES.with_label_values(&[reason]).get()
}

/// Prometheus text format of every registered instrument.
pub fn render() -> Result<String, MetricsError> {
    ensure_registered();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| MetricsError::ExportError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| MetricsError::ExportError(e.to_string()))
}
