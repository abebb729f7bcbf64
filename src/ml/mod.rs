/*!
 * # Forecasting Engine
 *
 * Pure, synchronous building blocks of a consumption forecast:
 *
 * - `statistics` - descriptive statistics of a daily series
 * - `forecasting` - method selection and daily-average estimation
 * - `confidence` - multi-factor confidence scoring
 * - `recommendations` - safety stock and reorder quantities
 *
 * None of these touch collaborators or shared state; the orchestration lives in
 * `services::forecasting`.
 */

pub mod confidence;
pub mod forecasting;
pub mod recommendations;
pub mod statistics;

pub use confidence::{ConfidenceAssessment, ConfidenceScorer};
pub use forecasting::{select_algorithm, AlgorithmSelector, DailyEstimate, HistoryThresholds};
pub use recommendations::{recommend, safety_stock, SAFETY_STOCK_RATIO};
pub use statistics::calculate_statistics;
