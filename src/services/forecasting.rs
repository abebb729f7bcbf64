use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::ForecastConfig,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    ml::{calculate_statistics, recommend, AlgorithmSelector, ConfidenceScorer, SAFETY_STOCK_RATIO},
    models::{
        ConsumptionSeries, ForecastAlgorithm, ForecastPeriod, ForecastResult, MethodologyTrail,
        StepStatus,
    },
    repositories::{ConsumptionHistory, ForecastRepository, ProductCatalog, StockLevels},
};

/// Computes, persists and retrieves consumption forecasts.
///
/// One instance is shared across requests; it holds no per-request state.
#[derive(Clone)]
pub struct ForecastingService {
    history: Arc<dyn ConsumptionHistory>,
    stock: Arc<dyn StockLevels>,
    catalog: Arc<dyn ProductCatalog>,
    repository: Arc<dyn ForecastRepository>,
    config: ForecastConfig,
    selector: AlgorithmSelector,
    scorer: ConfidenceScorer,
    event_sender: Option<EventSender>,
}

impl ForecastingService {
    /// Creates a new forecasting service instance
    pub fn new(
        history: Arc<dyn ConsumptionHistory>,
        stock: Arc<dyn StockLevels>,
        catalog: Arc<dyn ProductCatalog>,
        repository: Arc<dyn ForecastRepository>,
        config: ForecastConfig,
    ) -> Self {
        let thresholds = config.thresholds();
        Self {
            history,
            stock,
            catalog,
            repository,
            selector: AlgorithmSelector::new(thresholds),
            scorer: ConfidenceScorer::new(thresholds, config.insufficient_data_confidence),
            config,
            event_sender: None,
        }
    }

    /// Publishes a `ForecastGenerated` event for every computed forecast.
    pub fn with_events(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub(crate) fn catalog(&self) -> &Arc<dyn ProductCatalog> {
        &self.catalog
    }

    pub(crate) async fn publish(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Event receiver is gone; event dropped");
            }
        }
    }

    /// Fetches history and stock for one product and forecasts `period`.
    #[instrument(skip(self), fields(product_id = %product_id, period = %period))]
    pub async fn compute_forecast(
        &self,
        product_id: Uuid,
        period: ForecastPeriod,
    ) -> Result<ForecastResult, ServiceError> {
        let started = Instant::now();
        let outcome = self.calculate(product_id, period).await;
        self.conclude(outcome, period, started).await
    }

    /// Fetches and calculates without recording the outcome anywhere.
    pub(crate) async fn calculate(
        &self,
        product_id: Uuid,
        period: ForecastPeriod,
    ) -> Result<ForecastResult, ServiceError> {
        let (series, current_stock) = tokio::try_join!(
            self.fetch_series(product_id, period),
            self.fetch_stock(product_id)
        )?;
        self.forecast_from_series(product_id, period, &series, current_stock)
    }

    /// Records metrics, logs and publishes the event for a finished calculation.
    pub(crate) async fn conclude(
        &self,
        outcome: Result<ForecastResult, ServiceError>,
        period: ForecastPeriod,
        started: Instant,
    ) -> Result<ForecastResult, ServiceError> {
        match outcome {
            Ok(result) => {
                metrics::record_forecast(
                    result.algorithm_used,
                    period,
                    started.elapsed().as_secs_f64(),
                );
                info!(
                    product_id = %result.product_id,
                    algorithm = %result.algorithm_used,
                    predicted_quantity = result.predicted_quantity,
                    confidence_level = result.confidence_level,
                    reorder_quantity = result.recommendation.reorder_quantity,
                    "Forecast computed"
                );
                self.publish(Event::forecast_generated(&result)).await;
                Ok(result)
            }
            Err(e) => {
                metrics::record_failure(e.kind());
                error!(%period, error = %e, "Forecast failed");
                Err(e)
            }
        }
    }

    /// Runs the whole calculation on data the caller already holds.
    ///
    /// The methodology opens with the series statistics, continues with the
    /// estimator's own steps and closes with projection, confidence and
    /// recommendation, numbered in that order.
    pub fn forecast_from_series(
        &self,
        product_id: Uuid,
        period: ForecastPeriod,
        series: &ConsumptionSeries,
        current_stock: i64,
    ) -> Result<ForecastResult, ServiceError> {
        series
            .validate()
            .map_err(|detail| ServiceError::data_unavailable(product_id, detail))?;
        let current_stock = u64::try_from(current_stock).map_err(|_| {
            ServiceError::data_unavailable(
                product_id,
                format!("negative stock level {}", current_stock),
            )
        })?;

        let quantities = series.daily_quantities();
        let statistics = calculate_statistics(&quantities);
        let mut trail = MethodologyTrail::new();

        let statistics_status = if statistics.data_points == 0 {
            StepStatus::Insufficient
        } else {
            StepStatus::Completed
        };
        trail
            .record(
                "Consumption statistics",
                statistics_status,
                "mean = Σxᵢ / n; σ = √(Σ(xᵢ - mean)² / n); CV = σ / mean × 100",
            )
            .input("data_points", statistics.data_points as f64)
            .output("mean", statistics.mean)
            .output("std_deviation", statistics.std_deviation)
            .output("coefficient_of_variation", statistics.coefficient_of_variation)
            .output("min", statistics.min)
            .output("max", statistics.max)
            .finish();

        let estimate = self.selector.estimate(&quantities);
        trail.extend(estimate.trail);

        let horizon_days = period.horizon_days();
        let daily_average = estimate.daily_average.max(0.0);
        let predicted_quantity = (daily_average * f64::from(horizon_days)).round().max(0.0) as u64;
        trail
            .record(
                "Horizon projection",
                StepStatus::Completed,
                "predicted_quantity = round(daily_average × horizon_days)",
            )
            .input("daily_average", daily_average)
            .input("horizon_days", f64::from(horizon_days))
            .output("predicted_quantity", predicted_quantity as f64)
            .finish();

        let assessment = self.scorer.score(&statistics, period, estimate.algorithm);
        let confidence_status = if estimate.algorithm == ForecastAlgorithm::InsufficientData {
            StepStatus::Insufficient
        } else {
            StepStatus::Completed
        };
        let adjustments: f64 = assessment.factors.iter().map(|f| f.impact).sum();
        trail
            .record(
                "Confidence score",
                confidence_status,
                "confidence = clamp(baseline + Σ adjustments, 0, 100)",
            )
            .input("baseline", assessment.baseline)
            .input("adjustments", adjustments)
            .input("coefficient_of_variation", statistics.coefficient_of_variation)
            .output("confidence_level", f64::from(assessment.confidence_level))
            .finish();

        let recommendation = recommend(predicted_quantity, current_stock);
        trail
            .record(
                "Stock recommendation",
                StepStatus::Completed,
                "safety_stock = round(0.20 × predicted); deficit = max(0, predicted - stock); \
                 reorder = max(0, predicted - stock + safety_stock)",
            )
            .input("predicted_quantity", predicted_quantity as f64)
            .input("current_stock", current_stock as f64)
            .input("safety_stock_ratio", SAFETY_STOCK_RATIO)
            .output("safety_stock", recommendation.safety_stock as f64)
            .output("deficit", recommendation.deficit as f64)
            .output("reorder_quantity", recommendation.reorder_quantity as f64)
            .finish();

        debug!(
            %product_id,
            %period,
            algorithm = %estimate.algorithm,
            steps = trail.len(),
            "Methodology assembled"
        );

        Ok(ForecastResult {
            product_id,
            period,
            predicted_quantity,
            algorithm_used: estimate.algorithm,
            confidence_level: assessment.confidence_level,
            methodology: trail.into_steps(),
            recommended_safety_stock: recommendation.safety_stock,
            calculation_date: Utc::now(),
            daily_average,
            horizon_days,
            statistics,
            confidence_factors: assessment.factors,
            recommendation,
        })
    }

    /// Stores a forecast, replacing any earlier one for the same product and period.
    #[instrument(skip(self, forecast), fields(product_id = %forecast.product_id, period = %forecast.period))]
    pub async fn persist_forecast(&self, forecast: &ForecastResult) -> Result<(), ServiceError> {
        let saved = timeout(self.config.persist_timeout(), self.repository.save(forecast))
            .await
            .map_err(|_| {
                ServiceError::Timeout(format!(
                    "saving forecast for product {} after {} ms",
                    forecast.product_id, self.config.persist_timeout_ms
                ))
            })
            .and_then(|result| {
                result.map_err(|e| match e {
                    ServiceError::PersistenceError(_) | ServiceError::Timeout(_) => e,
                    other => ServiceError::PersistenceError(other.to_string()),
                })
            });

        if let Err(e) = &saved {
            metrics::record_failure(e.kind());
            error!(error = %e, "Failed to persist forecast");
        } else {
            debug!("Forecast persisted");
        }
        saved
    }

    /// Returns the stored forecast for a product and period.
    #[instrument(skip(self))]
    pub async fn load_forecast(
        &self,
        product_id: Uuid,
        period: ForecastPeriod,
    ) -> Result<ForecastResult, ServiceError> {
        timeout(
            self.config.persist_timeout(),
            self.repository.find(product_id, period),
        )
        .await
        .map_err(|_| {
            ServiceError::Timeout(format!(
                "loading forecast for product {} after {} ms",
                product_id, self.config.persist_timeout_ms
            ))
        })??
        .ok_or_else(|| ServiceError::forecast_not_found(product_id, period))
    }

    async fn fetch_series(
        &self,
        product_id: Uuid,
        period: ForecastPeriod,
    ) -> Result<ConsumptionSeries, ServiceError> {
        timeout(
            self.config.fetch_timeout(),
            self.history.get_consumption_series(product_id, period),
        )
        .await
        .map_err(|_| {
            ServiceError::Timeout(format!(
                "consumption history for product {} after {} ms",
                product_id, self.config.fetch_timeout_ms
            ))
        })?
        .map_err(|e| as_data_unavailable(product_id, e))
    }

    async fn fetch_stock(&self, product_id: Uuid) -> Result<i64, ServiceError> {
        timeout(
            self.config.fetch_timeout(),
            self.stock.get_current_stock(product_id),
        )
        .await
        .map_err(|_| {
            ServiceError::Timeout(format!(
                "stock level for product {} after {} ms",
                product_id, self.config.fetch_timeout_ms
            ))
        })?
        .map_err(|e| as_data_unavailable(product_id, e))
    }
}

// Collaborator failures reach callers as DataUnavailable unless they already
// say what went wrong in engine terms.
fn as_data_unavailable(product_id: Uuid, err: ServiceError) -> ServiceError {
    match err {
        ServiceError::DataUnavailable(_) | ServiceError::Timeout(_) => err,
        other => ServiceError::data_unavailable(product_id, other),
    }
}
