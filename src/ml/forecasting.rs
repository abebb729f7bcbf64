//! Daily demand estimation.
//!
//! The method is picked from how many days of history a product has: the more
//! data, the more structure the estimator is allowed to exploit. Every branch
//! writes its formula and numbers into a [`MethodologyTrail`] while it computes,
//! so the trail always matches the value returned.

use crate::models::{ForecastAlgorithm, MethodologyTrail, StepStatus};
use serde::{Deserialize, Serialize};

/// History lengths (in days) at which a more elaborate method takes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryThresholds {
    /// Below this, a plain moving average.
    pub short: usize,
    /// Below this, a linearly weighted moving average.
    pub medium: usize,
    /// Below this, an exponential moving average; from here on, regression.
    pub long: usize,
}

impl Default for HistoryThresholds {
    fn default() -> Self {
        Self {
            short: 7,
            medium: 30,
            long: 90,
        }
    }
}

impl HistoryThresholds {
    pub fn new(short: usize, medium: usize, long: usize) -> Result<Self, String> {
        let thresholds = Self {
            short,
            medium,
            long,
        };
        thresholds.check()?;
        Ok(thresholds)
    }

    pub fn check(&self) -> Result<(), String> {
        if self.short >= 1 && self.short < self.medium && self.medium < self.long {
            Ok(())
        } else {
            Err(format!(
                "history thresholds must satisfy 1 <= short < medium < long (got {}, {}, {})",
                self.short, self.medium, self.long
            ))
        }
    }
}

/// Decision table mapping history length to a method. First match wins.
pub fn select_algorithm(data_points: usize, thresholds: &HistoryThresholds) -> ForecastAlgorithm {
    match data_points {
        0 => ForecastAlgorithm::InsufficientData,
        n if n < thresholds.short => ForecastAlgorithm::MovingAverage,
        n if n < thresholds.medium => ForecastAlgorithm::WeightedMovingAverage,
        n if n < thresholds.long => ForecastAlgorithm::ExponentialMovingAverage,
        _ => ForecastAlgorithm::LinearRegressionCombined,
    }
}

/// Outcome of the selector: the method actually applied, the estimated daily
/// consumption and the derivation that produced it.
#[derive(Debug, Clone)]
pub struct DailyEstimate {
    pub algorithm: ForecastAlgorithm,
    pub daily_average: f64,
    pub trail: MethodologyTrail,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlgorithmSelector {
    thresholds: HistoryThresholds,
}

impl AlgorithmSelector {
    pub fn new(thresholds: HistoryThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &HistoryThresholds {
        &self.thresholds
    }

    pub fn estimate(&self, quantities: &[f64]) -> DailyEstimate {
        let mut trail = MethodologyTrail::new();
        let n = quantities.len();

        if n > 0 && quantities.iter().all(|&q| q == 0.0) {
            trail
                .record(
                    "Zero consumption history",
                    StepStatus::Info,
                    "all recorded quantities are 0 -> moving average over available points",
                )
                .input("data_points", n as f64)
                .output("daily_average", 0.0)
                .finish();
            return DailyEstimate {
                algorithm: ForecastAlgorithm::MovingAverage,
                daily_average: 0.0,
                trail,
            };
        }

        let algorithm = select_algorithm(n, &self.thresholds);
        let raw = match algorithm {
            ForecastAlgorithm::InsufficientData => {
                trail
                    .record(
                        "Insufficient data",
                        StepStatus::Insufficient,
                        "no consumption history -> daily_average = 0",
                    )
                    .input("data_points", 0.0)
                    .output("daily_average", 0.0)
                    .finish();
                0.0
            }
            ForecastAlgorithm::MovingAverage => {
                let average = mean(quantities);
                trail
                    .record(
                        "Moving average",
                        StepStatus::Completed,
                        "daily_average = Σxᵢ / n",
                    )
                    .input("data_points", n as f64)
                    .input("sum", quantities.iter().sum())
                    .output("daily_average", average)
                    .finish();
                average
            }
            ForecastAlgorithm::WeightedMovingAverage => {
                record_weighted_moving_average(quantities, &mut trail)
            }
            ForecastAlgorithm::ExponentialMovingAverage => {
                let alpha = 2.0 / (n as f64 + 1.0);
                let ema = exponential_moving_average(quantities, alpha);
                trail
                    .record(
                        "Exponential moving average",
                        StepStatus::Completed,
                        "α = 2/(n+1); EMA₁ = x₁; EMAₜ = α·xₜ + (1-α)·EMAₜ₋₁; daily_average = EMAₙ",
                    )
                    .input("data_points", n as f64)
                    .input("alpha", alpha)
                    .input("first_value", quantities[0])
                    .output("daily_average", ema)
                    .finish();
                ema
            }
            ForecastAlgorithm::LinearRegressionCombined => {
                let weighted = record_weighted_moving_average(quantities, &mut trail);
                let (slope, intercept) = least_squares(quantities);
                let next_index = n as f64 + 1.0;
                let trend_prediction = slope * next_index + intercept;
                trail
                    .record(
                        "Linear regression trend",
                        StepStatus::Completed,
                        "OLS fit y = m·t + b over t = 1..n; trend_prediction = m·(n+1) + b",
                    )
                    .input("data_points", n as f64)
                    .output("slope", slope)
                    .output("intercept", intercept)
                    .output("trend_prediction", trend_prediction)
                    .finish();

                let combined = 0.5 * weighted + 0.5 * trend_prediction;
                trail
                    .record(
                        "Combined estimate",
                        StepStatus::Completed,
                        "daily_average = 0.5·weighted_moving_average + 0.5·trend_prediction",
                    )
                    .input("weighted_moving_average", weighted)
                    .input("trend_prediction", trend_prediction)
                    .output("daily_average", combined.max(0.0))
                    .finish();
                combined
            }
        };

        DailyEstimate {
            algorithm,
            daily_average: raw.max(0.0),
            trail,
        }
    }
}

fn mean(quantities: &[f64]) -> f64 {
    if quantities.is_empty() {
        return 0.0;
    }
    quantities.iter().sum::<f64>() / quantities.len() as f64
}

fn record_weighted_moving_average(quantities: &[f64], trail: &mut MethodologyTrail) -> f64 {
    let (weighted_sum, weight_total) = weighted_sums(quantities);
    let average = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    };
    trail
        .record(
            "Weighted moving average",
            StepStatus::Completed,
            "wᵢ = i (most recent day heaviest); daily_average = Σ(wᵢ·xᵢ) / Σwᵢ",
        )
        .input("data_points", quantities.len() as f64)
        .input("weighted_sum", weighted_sum)
        .input("weight_total", weight_total)
        .output("daily_average", average)
        .finish();
    average
}

/// Σ(i·xᵢ) and Σi for i = 1..n.
fn weighted_sums(quantities: &[f64]) -> (f64, f64) {
    quantities
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, weights), (index, &x)| {
            let weight = (index + 1) as f64;
            (sum + weight * x, weights + weight)
        })
}

fn exponential_moving_average(quantities: &[f64], alpha: f64) -> f64 {
    let Some((&first, rest)) = quantities.split_first() else {
        return 0.0;
    };
    rest.iter()
        .fold(first, |ema, &x| alpha * x + (1.0 - alpha) * ema)
}

/// Ordinary least squares of quantity against day index t = 1..n.
/// Returns `(slope, intercept)`.
fn least_squares(quantities: &[f64]) -> (f64, f64) {
    let n = quantities.len() as f64;
    if quantities.is_empty() {
        return (0.0, 0.0);
    }
    let t_mean = (n + 1.0) / 2.0;
    let y_mean = mean(quantities);

    let (sxy, sxx) = quantities
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sxy, sxx), (index, &y)| {
            let dt = (index + 1) as f64 - t_mean;
            (sxy + dt * (y - y_mean), sxx + dt * dt)
        });

    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    (slope, y_mean - slope * t_mean)
}
