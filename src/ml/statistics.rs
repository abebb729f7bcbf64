//! Descriptive statistics over daily consumption quantities.

use crate::models::Statistics;

/// Computes mean, population standard deviation, coefficient of variation and
/// extrema. Never fails: an empty series yields all zeros.
pub fn calculate_statistics(quantities: &[f64]) -> Statistics {
    let data_points = quantities.len();
    if data_points == 0 {
        return Statistics::default();
    }

    let n = data_points as f64;
    let mean = quantities.iter().sum::<f64>() / n;

    let std_deviation = if data_points > 1 {
        let squared: f64 = quantities.iter().map(|x| (x - mean).powi(2)).sum();
        (squared / n).sqrt()
    } else {
        0.0
    };

    // A zero-mean series has no meaningful relative spread.
    let coefficient_of_variation = if mean > 0.0 {
        std_deviation / mean * 100.0
    } else {
        0.0
    };

    let min = quantities.iter().copied().fold(f64::INFINITY, f64::min);
    let max = quantities.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Statistics {
        mean,
        std_deviation,
        coefficient_of_variation,
        min,
        max,
        data_points,
    }
}
