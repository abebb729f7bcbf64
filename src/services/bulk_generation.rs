//! Forecast regeneration for a whole catalog.
//!
//! Items run through a bounded `buffer_unordered` stream so collaborators never
//! see more than `bulk_concurrency` requests at once. A failed item is recorded
//! in the report and the run carries on; only a catalog failure aborts it.

use chrono::{DateTime, Utc};
use futures::{future, stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use strum::{AsRefStr, Display, IntoEnumIterator};
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::forecasting::ForecastingService;
use crate::{
    config::InsufficientDataPolicy,
    errors::ServiceError,
    events::Event,
    metrics,
    models::{ForecastPeriod, ForecastResult},
};

/// Which forecasts to regenerate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkGenerationRequest {
    /// Restricts the catalog to one hospital area.
    #[serde(default)]
    pub area_id: Option<Uuid>,
    /// Every period when `None`.
    #[serde(default)]
    pub period: Option<ForecastPeriod>,
}

impl BulkGenerationRequest {
    pub fn periods(&self) -> Vec<ForecastPeriod> {
        match self.period {
            Some(period) => vec![period],
            None => ForecastPeriod::iter().collect(),
        }
    }
}

/// Shared stop signal, checked before each item is dispatched.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Point-in-time view of a running batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct ProgressCounters {
    total: AtomicUsize,
    completed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

/// Progress counters a caller can poll while `generate_all` runs.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    counters: Arc<ProgressCounters>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BatchProgress {
        BatchProgress {
            completed: self.counters.completed.load(Ordering::SeqCst),
            total: self.counters.total.load(Ordering::SeqCst),
            succeeded: self.counters.succeeded.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    fn start(&self, total: usize) {
        self.counters.completed.store(0, Ordering::SeqCst);
        self.counters.succeeded.store(0, Ordering::SeqCst);
        self.counters.failed.store(0, Ordering::SeqCst);
        self.counters.total.store(total, Ordering::SeqCst);
    }

    fn record(&self, success: bool) -> BatchProgress {
        if success {
            self.counters.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
        self.snapshot()
    }
}

pub type ProgressCallback = Arc<dyn Fn(BatchProgress) + Send + Sync>;

/// Caller-side handles for one bulk run.
#[derive(Clone, Default)]
pub struct BulkRunControl {
    pub cancellation: CancellationFlag,
    pub tracker: ProgressTracker,
    /// Invoked after every completed item.
    pub on_progress: Option<ProgressCallback>,
}

impl BulkRunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(BatchProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for BulkRunControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkRunControl")
            .field("cancellation", &self.cancellation)
            .field("tracker", &self.tracker)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Why a single item of a batch produced no stored forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatchFailureReason {
    InsufficientData,
    DataUnavailable,
    Timeout,
    Persistence,
    Internal,
}

impl From<&ServiceError> for BatchFailureReason {
    fn from(err: &ServiceError) -> Self {
        match err {
            ServiceError::DataUnavailable(_)
            | ServiceError::NotFound(_)
            | ServiceError::InvalidInput(_)
            | ServiceError::ValidationError(_) => Self::DataUnavailable,
            ServiceError::Timeout(_) => Self::Timeout,
            ServiceError::PersistenceError(_) => Self::Persistence,
            ServiceError::EventError(_) | ServiceError::InternalError(_) | ServiceError::Other(_) => {
                Self::Internal
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub product_id: Uuid,
    pub period: ForecastPeriod,
    pub reason: BatchFailureReason,
    pub error: String,
}

impl BatchFailure {
    fn from_error(product_id: Uuid, period: ForecastPeriod, err: &ServiceError) -> Self {
        Self {
            product_id,
            period,
            reason: err.into(),
            error: err.to_string(),
        }
    }
}

/// Outcome of one `generate_all` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub succeeded: Vec<ForecastResult>,
    pub failed: Vec<BatchFailure>,
    /// (product, period) pairs planned from the catalog.
    pub total_scheduled: usize,
    /// Pairs actually dispatched; lower than scheduled only after cancellation.
    pub total_attempted: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn skipped(&self) -> usize {
        self.total_scheduled.saturating_sub(self.total_attempted)
    }

    pub fn failures_by(&self, reason: BatchFailureReason) -> usize {
        self.failed.iter().filter(|f| f.reason == reason).count()
    }
}

impl ForecastingService {
    /// Regenerates and stores forecasts for every catalog product.
    #[instrument(skip(self, control), fields(area_id = ?request.area_id, period = ?request.period))]
    pub async fn generate_all(
        &self,
        request: BulkGenerationRequest,
        control: BulkRunControl,
    ) -> Result<BatchReport, ServiceError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let products = timeout(
            self.config().fetch_timeout(),
            self.catalog().get_product_catalog(request.area_id),
        )
        .await
        .map_err(|_| {
            ServiceError::Timeout(format!(
                "product catalog after {} ms",
                self.config().fetch_timeout_ms
            ))
        })?
        .map_err(|e| match e {
            ServiceError::DataUnavailable(_) | ServiceError::Timeout(_) => e,
            other => ServiceError::DataUnavailable(format!("product catalog: {}", other)),
        })
        .map_err(|e| {
            error!(%run_id, error = %e, "Catalog fetch failed; bulk generation aborted");
            metrics::record_failure(e.kind());
            e
        })?;

        let periods = request.periods();
        let pairs: Vec<(Uuid, ForecastPeriod)> = products
            .iter()
            .flat_map(|product| periods.iter().map(move |&period| (product.id, period)))
            .collect();
        let total_scheduled = pairs.len();

        control.tracker.start(total_scheduled);
        info!(
            %run_id,
            products = products.len(),
            total = total_scheduled,
            concurrency = self.config().bulk_concurrency,
            "Bulk forecast generation started"
        );
        self.publish(Event::BulkGenerationStarted {
            run_id,
            total: total_scheduled,
        })
        .await;

        let cancellation = control.cancellation.clone();
        let outcomes: Vec<Result<ForecastResult, BatchFailure>> = stream::iter(pairs)
            .take_while(move |_| future::ready(!cancellation.is_cancelled()))
            .map(|(product_id, period)| self.generate_one(product_id, period, &control))
            .buffer_unordered(self.config().bulk_concurrency.max(1))
            .collect()
            .await;

        let total_attempted = outcomes.len();
        let (succeeded, failed): (Vec<_>, Vec<_>) = outcomes.into_iter().partition(Result::is_ok);
        let succeeded: Vec<ForecastResult> = succeeded.into_iter().filter_map(Result::ok).collect();
        let failed: Vec<BatchFailure> = failed.into_iter().filter_map(Result::err).collect();

        let skipped = total_scheduled - total_attempted;
        let cancelled = skipped > 0;
        metrics::record_bulk_run(cancelled, skipped);

        let report = BatchReport {
            run_id,
            succeeded,
            failed,
            total_scheduled,
            total_attempted,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            %run_id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            attempted = total_attempted,
            skipped,
            cancelled,
            "Bulk forecast generation finished"
        );
        self.publish(Event::BulkGenerationCompleted {
            run_id,
            succeeded: report.succeeded.len(),
            failed: report.failed.len(),
            cancelled,
        })
        .await;

        Ok(report)
    }

    async fn generate_one(
        &self,
        product_id: Uuid,
        period: ForecastPeriod,
        control: &BulkRunControl,
    ) -> Result<ForecastResult, BatchFailure> {
        let outcome = self.forecast_and_store(product_id, period).await;

        if let Err(failure) = &outcome {
            warn!(
                %product_id,
                %period,
                reason = %failure.reason,
                error = %failure.error,
                "Forecast item failed"
            );
        }

        let progress = control.tracker.record(outcome.is_ok());
        if let Some(callback) = &control.on_progress {
            callback(progress);
        }
        outcome
    }

    async fn forecast_and_store(
        &self,
        product_id: Uuid,
        period: ForecastPeriod,
    ) -> Result<ForecastResult, BatchFailure> {
        let started = Instant::now();
        let outcome = self.calculate(product_id, period).await;

        // Rejected before anything counts it as generated.
        if matches!(&outcome, Ok(result) if result.is_insufficient())
            && self.config().insufficient_data_policy == InsufficientDataPolicy::Fail
        {
            metrics::record_failure(BatchFailureReason::InsufficientData.as_ref());
            return Err(BatchFailure {
                product_id,
                period,
                reason: BatchFailureReason::InsufficientData,
                error: "no consumption history in the lookback window".to_string(),
            });
        }

        let result = self
            .conclude(outcome, period, started)
            .await
            .map_err(|e| BatchFailure::from_error(product_id, period, &e))?;

        self.persist_forecast(&result)
            .await
            .map_err(|e| BatchFailure::from_error(product_id, period, &e))?;
        Ok(result)
    }
}
