use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// Forecast target window.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ForecastPeriod {
    Month,
    Quarter,
    Year,
}

impl ForecastPeriod {
    pub fn horizon_days(self) -> u32 {
        match self {
            ForecastPeriod::Month => 30,
            ForecastPeriod::Quarter => 90,
            ForecastPeriod::Year => 365,
        }
    }
}

/// Forecasting method, chosen by how much history a product has.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ForecastAlgorithm {
    InsufficientData,
    MovingAverage,
    WeightedMovingAverage,
    ExponentialMovingAverage,
    LinearRegressionCombined,
}

/// Descriptive statistics of a daily consumption series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub mean: f64,
    pub std_deviation: f64,
    pub coefficient_of_variation: f64,
    pub min: f64,
    pub max: f64,
    pub data_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Completed,
    Insufficient,
    Info,
}

/// One entry of the audit trail attached to a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodologyStep {
    pub step_number: u32,
    pub name: String,
    pub status: StepStatus,
    pub formula: String,
    pub inputs: BTreeMap<String, f64>,
    pub outputs: BTreeMap<String, f64>,
}

/// Append-only builder for the methodology steps of one computation.
#[derive(Debug, Clone, Default)]
pub struct MethodologyTrail {
    steps: Vec<MethodologyStep>,
}

impl MethodologyTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str, status: StepStatus, formula: impl Into<String>) -> StepBuilder<'_> {
        let step_number = self.steps.len() as u32 + 1;
        StepBuilder {
            trail: self,
            step: MethodologyStep {
                step_number,
                name: name.to_string(),
                status,
                formula: formula.into(),
                inputs: BTreeMap::new(),
                outputs: BTreeMap::new(),
            },
        }
    }

    /// Moves the steps of another trail onto the end of this one, renumbering them.
    pub fn extend(&mut self, other: MethodologyTrail) {
        for mut step in other.steps {
            step.step_number = self.steps.len() as u32 + 1;
            self.steps.push(step);
        }
    }

    pub fn steps(&self) -> &[MethodologyStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<MethodologyStep> {
        self.steps
    }
}

/// Collects the numbers of a step; the step is appended on [`StepBuilder::finish`].
#[must_use = "a step is only recorded once finished"]
pub struct StepBuilder<'a> {
    trail: &'a mut MethodologyTrail,
    step: MethodologyStep,
}

impl StepBuilder<'_> {
    pub fn input(mut self, name: &str, value: f64) -> Self {
        self.step.inputs.insert(name.to_string(), finite_or_zero(value));
        self
    }

    pub fn output(mut self, name: &str, value: f64) -> Self {
        self.step.outputs.insert(name.to_string(), finite_or_zero(value));
        self
    }

    pub fn finish(self) {
        self.trail.steps.push(self.step);
    }
}

// serde_json cannot encode NaN/inf; the engine never produces them, but the
// audit trail must stay serializable regardless.
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactor {
    pub factor_name: String,
    /// Signed percentage-point delta applied to the baseline.
    pub impact: f64,
    pub triggering_value: f64,
    pub reason: String,
}

/// Stock advice derived from a prediction and the on-hand quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecommendation {
    pub current_stock: u64,
    pub safety_stock: u64,
    pub deficit: u64,
    pub reorder_quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub product_id: Uuid,
    pub period: ForecastPeriod,
    pub predicted_quantity: u64,
    pub algorithm_used: ForecastAlgorithm,
    pub confidence_level: u8,
    pub methodology: Vec<MethodologyStep>,
    pub recommended_safety_stock: u64,
    pub calculation_date: DateTime<Utc>,
    pub daily_average: f64,
    pub horizon_days: u32,
    pub statistics: Statistics,
    pub confidence_factors: Vec<ConfidenceFactor>,
    pub recommendation: StockRecommendation,
}

impl ForecastResult {
    pub fn is_insufficient(&self) -> bool {
        self.algorithm_used == ForecastAlgorithm::InsufficientData
    }

    /// Key under which the result is persisted.
    pub fn key(&self) -> (Uuid, ForecastPeriod) {
        (self.product_id, self.period)
    }
}
