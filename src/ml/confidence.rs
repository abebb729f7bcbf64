//! Confidence scoring for consumption forecasts.

use super::forecasting::HistoryThresholds;
use crate::models::{ConfidenceFactor, ForecastAlgorithm, ForecastPeriod, Statistics};
use serde::{Deserialize, Serialize};

const MEDIUM_HISTORY_BASELINE: f64 = 50.0;
const LONG_HISTORY_BASELINE: f64 = 70.0;
const FULL_HISTORY_BASELINE: f64 = 90.0;

const VARIABILITY_THRESHOLD: f64 = 50.0;
const VARIABILITY_PENALTY_RATE: f64 = 0.5;
const MAX_VARIABILITY_PENALTY: f64 = 30.0;

pub const DEFAULT_MINIMUM_CONFIDENCE: u8 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    pub confidence_level: u8,
    pub baseline: f64,
    pub factors: Vec<ConfidenceFactor>,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    thresholds: HistoryThresholds,
    minimum_confidence: u8,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(HistoryThresholds::default(), DEFAULT_MINIMUM_CONFIDENCE)
    }
}

impl ConfidenceScorer {
    /// `minimum_confidence` is both the baseline for very short histories and
    /// the fixed score of a forecast made without any history.
    pub fn new(thresholds: HistoryThresholds, minimum_confidence: u8) -> Self {
        Self {
            thresholds,
            minimum_confidence: minimum_confidence.min(100),
        }
    }

    pub fn score(
        &self,
        stats: &Statistics,
        period: ForecastPeriod,
        algorithm: ForecastAlgorithm,
    ) -> ConfidenceAssessment {
        let floor = f64::from(self.minimum_confidence);

        if algorithm == ForecastAlgorithm::InsufficientData {
            return ConfidenceAssessment {
                confidence_level: self.minimum_confidence,
                baseline: floor,
                factors: vec![ConfidenceFactor {
                    factor_name: "insufficient history".to_string(),
                    impact: 0.0,
                    triggering_value: stats.data_points as f64,
                    reason: "no consumption recorded; confidence fixed at the minimum".to_string(),
                }],
            };
        }

        let baseline = self.baseline(stats.data_points);
        let mut factors = Vec::new();

        if stats.coefficient_of_variation > VARIABILITY_THRESHOLD {
            let penalty = ((stats.coefficient_of_variation - VARIABILITY_THRESHOLD)
                * VARIABILITY_PENALTY_RATE)
                .min(MAX_VARIABILITY_PENALTY);
            factors.push(ConfidenceFactor {
                factor_name: "high consumption variability".to_string(),
                impact: -penalty,
                triggering_value: stats.coefficient_of_variation,
                reason: format!(
                    "coefficient of variation {:.1}% exceeds {}%",
                    stats.coefficient_of_variation, VARIABILITY_THRESHOLD
                ),
            });
        }

        if let Some(adjustment) = period_adjustment(period) {
            factors.push(adjustment);
        }

        let total: f64 = baseline + factors.iter().map(|f| f.impact).sum::<f64>();
        let confidence_level = total.clamp(0.0, 100.0).round() as u8;

        ConfidenceAssessment {
            confidence_level,
            baseline,
            factors,
        }
    }

    fn baseline(&self, data_points: usize) -> f64 {
        if data_points < self.thresholds.short {
            f64::from(self.minimum_confidence)
        } else if data_points < self.thresholds.medium {
            MEDIUM_HISTORY_BASELINE
        } else if data_points < self.thresholds.long {
            LONG_HISTORY_BASELINE
        } else {
            FULL_HISTORY_BASELINE
        }
    }
}

/// Longer horizons carry more uncertainty; a month needs no adjustment.
fn period_adjustment(period: ForecastPeriod) -> Option<ConfidenceFactor> {
    let (impact, reason) = match period {
        ForecastPeriod::Month => return None,
        ForecastPeriod::Quarter => (-10.0, "quarterly horizon extrapolates 90 days ahead"),
        ForecastPeriod::Year => (-20.0, "yearly horizon extrapolates 365 days ahead"),
    };
    Some(ConfidenceFactor {
        factor_name: format!("{} horizon", period),
        impact,
        triggering_value: f64::from(period.horizon_days()),
        reason: reason.to_string(),
    })
}
