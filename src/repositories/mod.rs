//! Collaborator seams of the forecasting engine.
//!
//! The engine never talks to a database or device directly: consumption
//! history, stock levels, the product catalog and forecast storage are all
//! reached through these traits. `in_memory` provides reference
//! implementations backed by a JSON dataset.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{ConsumptionSeries, ForecastPeriod, ForecastResult, Product};

pub mod in_memory;

pub use in_memory::{InMemoryForecastRepository, InMemoryPharmacyData, PharmacyDataset};

/// Historical daily consumption lookup.
#[async_trait]
pub trait ConsumptionHistory: Send + Sync {
    /// Consumption over the lookback window that feeds a forecast for `period`.
    async fn get_consumption_series(
        &self,
        product_id: Uuid,
        period: ForecastPeriod,
    ) -> Result<ConsumptionSeries, ServiceError>;
}

/// On-hand quantity lookup.
#[async_trait]
pub trait StockLevels: Send + Sync {
    async fn get_current_stock(&self, product_id: Uuid) -> Result<i64, ServiceError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Products of one area, or every product when `area_id` is `None`.
    async fn get_product_catalog(&self, area_id: Option<Uuid>)
        -> Result<Vec<Product>, ServiceError>;
}

/// Forecast storage keyed by (product, period).
///
/// `save` replaces any previous record for the same key in full; there is no
/// partial update.
#[async_trait]
pub trait ForecastRepository: Send + Sync {
    async fn save(&self, forecast: &ForecastResult) -> Result<(), ServiceError>;

    async fn find(
        &self,
        product_id: Uuid,
        period: ForecastPeriod,
    ) -> Result<Option<ForecastResult>, ServiceError>;
}
