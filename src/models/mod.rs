// Domain models
pub mod consumption;
pub mod forecast;

pub use consumption::{ConsumptionRecord, ConsumptionSeries, Product};
pub use forecast::{
    ConfidenceFactor, ForecastAlgorithm, ForecastPeriod, ForecastResult, MethodologyStep,
    MethodologyTrail, Statistics, StepBuilder, StepStatus, StockRecommendation,
};
