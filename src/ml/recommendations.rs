//! Safety stock and reorder advice.

use crate::models::StockRecommendation;

/// Share of predicted demand held back as a buffer against forecast error.
pub const SAFETY_STOCK_RATIO: f64 = 0.20;

pub fn safety_stock(predicted_quantity: u64) -> u64 {
    (SAFETY_STOCK_RATIO * predicted_quantity as f64).round() as u64
}

pub fn recommend(predicted_quantity: u64, current_stock: u64) -> StockRecommendation {
    let safety_stock = safety_stock(predicted_quantity);
    let deficit = predicted_quantity.saturating_sub(current_stock);
    let reorder_quantity = predicted_quantity
        .saturating_add(safety_stock)
        .saturating_sub(current_stock);

    StockRecommendation {
        current_stock,
        safety_stock,
        deficit,
        reorder_quantity,
    }
}
