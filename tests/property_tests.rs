//! Property-based tests for the forecasting engine.
//!
//! Random consumption histories and stock levels are pushed through the full
//! calculation to check the invariants every forecast must satisfy.

mod common;

use pharmastock_forecast::{
    ml::{calculate_statistics, recommend},
    models::{ForecastAlgorithm, ForecastPeriod},
};
use proptest::prelude::*;
use uuid::Uuid;

use common::{offline_service, series};

fn history_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![Just(0.0), 0.0f64..50.0, 100.0f64..5_000.0],
        0..200,
    )
}

fn period_strategy() -> impl Strategy<Value = ForecastPeriod> {
    prop_oneof![
        Just(ForecastPeriod::Month),
        Just(ForecastPeriod::Quarter),
        Just(ForecastPeriod::Year),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn forecasts_stay_within_bounds(
        history in history_strategy(),
        period in period_strategy(),
        stock in 0i64..10_000,
    ) {
        let result = offline_service()
            .forecast_from_series(Uuid::new_v4(), period, &series(&history), stock)
            .unwrap();

        prop_assert!(result.confidence_level <= 100);
        prop_assert!(result.daily_average >= 0.0);
        prop_assert!(result.daily_average.is_finite());
        prop_assert_eq!(
            result.recommended_safety_stock,
            (0.2 * result.predicted_quantity as f64).round() as u64
        );
        prop_assert!(result.recommendation.reorder_quantity >= result.recommendation.deficit);
        prop_assert_eq!(result.statistics.data_points, history.len());
    }

    #[test]
    fn empty_history_is_always_insufficient(period in period_strategy(), stock in 0i64..1_000) {
        let result = offline_service()
            .forecast_from_series(Uuid::new_v4(), period, &series(&[]), stock)
            .unwrap();

        prop_assert_eq!(result.algorithm_used, ForecastAlgorithm::InsufficientData);
        prop_assert_eq!(result.predicted_quantity, 0);
        prop_assert_eq!(result.confidence_level, 20);
    }

    #[test]
    fn confidence_never_rises_with_horizon(history in history_strategy()) {
        let service = offline_service();
        let history = series(&history);
        let confidence = |period| {
            service
                .forecast_from_series(Uuid::nil(), period, &history, 0)
                .map(|r| r.confidence_level)
        };

        let month = confidence(ForecastPeriod::Month).unwrap();
        let quarter = confidence(ForecastPeriod::Quarter).unwrap();
        let year = confidence(ForecastPeriod::Year).unwrap();
        prop_assert!(year <= quarter && quarter <= month);
    }

    #[test]
    fn methodology_is_numbered_contiguously(history in history_strategy()) {
        let result = offline_service()
            .forecast_from_series(Uuid::nil(), ForecastPeriod::Month, &series(&history), 0)
            .unwrap();

        for (index, step) in result.methodology.iter().enumerate() {
            prop_assert_eq!(step.step_number as usize, index + 1);
        }
    }

    #[test]
    fn statistics_bracket_the_mean(history in prop::collection::vec(0.0f64..1_000.0, 1..100)) {
        let stats = calculate_statistics(&history);
        prop_assert!(stats.min <= stats.mean + 1e-9);
        prop_assert!(stats.mean <= stats.max + 1e-9);
        prop_assert!(stats.std_deviation >= 0.0);
        prop_assert!(stats.coefficient_of_variation >= 0.0);
    }

    #[test]
    fn reorder_covers_demand_and_buffer(predicted in 0u64..100_000, stock in 0u64..100_000) {
        let advice = recommend(predicted, stock);
        prop_assert_eq!(advice.deficit, predicted.saturating_sub(stock));
        prop_assert_eq!(
            advice.reorder_quantity,
            (predicted + advice.safety_stock).saturating_sub(stock)
        );
    }
}
