use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{ConsumptionHistory, ForecastRepository, ProductCatalog, StockLevels};
use crate::config::LookbackConfig;
use crate::errors::{ResultExt, ServiceError};
use crate::models::{
    ConsumptionRecord, ConsumptionSeries, ForecastPeriod, ForecastResult, Product,
};

/// Serialized form of a pharmacy snapshot: catalog, on-hand stock and
/// dispensing history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PharmacyDataset {
    /// Last day of every lookback window; today when absent.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub stock: HashMap<Uuid, i64>,
    #[serde(default)]
    pub consumption: HashMap<Uuid, Vec<ConsumptionRecord>>,
}

/// History, stock and catalog collaborators served from memory.
#[derive(Debug, Clone)]
pub struct InMemoryPharmacyData {
    products: Arc<Vec<Product>>,
    stock: Arc<DashMap<Uuid, i64>>,
    consumption: Arc<DashMap<Uuid, ConsumptionSeries>>,
    lookback: LookbackConfig,
    as_of: NaiveDate,
}

impl InMemoryPharmacyData {
    pub fn from_dataset(dataset: PharmacyDataset, lookback: LookbackConfig) -> Self {
        let as_of = dataset.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let consumption = dataset
            .consumption
            .into_iter()
            .map(|(product_id, records)| (product_id, ConsumptionSeries::new(records)))
            .collect::<DashMap<_, _>>();

        Self {
            products: Arc::new(dataset.products),
            stock: Arc::new(dataset.stock.into_iter().collect()),
            consumption: Arc::new(consumption),
            lookback,
            as_of,
        }
    }

    pub async fn from_json_file(
        path: impl AsRef<Path>,
        lookback: LookbackConfig,
    ) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            ServiceError::DataUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let dataset: PharmacyDataset = serde_json::from_str(&raw).map_err_to_service()?;
        info!(
            path = %path.display(),
            products = dataset.products.len(),
            "Loaded pharmacy dataset"
        );
        Ok(Self::from_dataset(dataset, lookback))
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn set_stock(&self, product_id: Uuid, quantity: i64) {
        self.stock.insert(product_id, quantity);
    }

    pub fn set_consumption(&self, product_id: Uuid, series: ConsumptionSeries) {
        self.consumption.insert(product_id, series);
    }

    fn is_known(&self, product_id: Uuid) -> bool {
        self.products.iter().any(|product| product.id == product_id)
            || self.consumption.contains_key(&product_id)
            || self.stock.contains_key(&product_id)
    }
}

#[async_trait]
impl ConsumptionHistory for InMemoryPharmacyData {
    async fn get_consumption_series(
        &self,
        product_id: Uuid,
        period: ForecastPeriod,
    ) -> Result<ConsumptionSeries, ServiceError> {
        if !self.is_known(product_id) {
            return Err(ServiceError::data_unavailable(product_id, "unknown product"));
        }

        let days = i64::from(self.lookback.days_for(period));
        let from = self.as_of - Duration::days(days - 1);
        let series = self
            .consumption
            .get(&product_id)
            .map(|series| series.window(from, self.as_of))
            .unwrap_or_default();

        debug!(
            %product_id,
            %period,
            %from,
            to = %self.as_of,
            records = series.records().len(),
            "Consumption history fetched"
        );
        Ok(series)
    }
}

#[async_trait]
impl StockLevels for InMemoryPharmacyData {
    async fn get_current_stock(&self, product_id: Uuid) -> Result<i64, ServiceError> {
        if !self.is_known(product_id) {
            return Err(ServiceError::data_unavailable(product_id, "unknown product"));
        }
        Ok(self.stock.get(&product_id).map(|entry| *entry).unwrap_or(0))
    }
}

#[async_trait]
impl ProductCatalog for InMemoryPharmacyData {
    async fn get_product_catalog(
        &self,
        area_id: Option<Uuid>,
    ) -> Result<Vec<Product>, ServiceError> {
        Ok(self
            .products
            .iter()
            .filter(|product| area_id.is_none() || product.area_id == area_id)
            .cloned()
            .collect())
    }
}

/// Forecast store in which each save replaces the whole record for its key.
#[derive(Debug, Clone, Default)]
pub struct InMemoryForecastRepository {
    store: Arc<DashMap<(Uuid, ForecastPeriod), ForecastResult>>,
}

impl InMemoryForecastRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl ForecastRepository for InMemoryForecastRepository {
    async fn save(&self, forecast: &ForecastResult) -> Result<(), ServiceError> {
        self.store.insert(forecast.key(), forecast.clone());
        Ok(())
    }

    async fn find(
        &self,
        product_id: Uuid,
        period: ForecastPeriod,
    ) -> Result<Option<ForecastResult>, ServiceError> {
        Ok(self
            .store
            .get(&(product_id, period))
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ForecastAlgorithm, Statistics, StockRecommendation};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dataset() -> (PharmacyDataset, Uuid, Uuid) {
        let ward = Uuid::new_v4();
        let paracetamol = Uuid::new_v4();
        let insulin = Uuid::new_v4();
        let as_of = date(2024, 6, 30);
        let history: Vec<ConsumptionRecord> = (0..200)
            .map(|offset| ConsumptionRecord::new(as_of - Duration::days(offset), 2.0))
            .collect();

        let dataset = PharmacyDataset {
            as_of: Some(as_of),
            products: vec![
                Product {
                    id: paracetamol,
                    name: "Paracetamol 500mg".into(),
                    area_id: Some(ward),
                },
                Product {
                    id: insulin,
                    name: "Insulin glargine".into(),
                    area_id: None,
                },
            ],
            stock: HashMap::from([(paracetamol, 40)]),
            consumption: HashMap::from([(paracetamol, history)]),
        };
        (dataset, paracetamol, insulin)
    }

    fn forecast(product_id: Uuid, predicted_quantity: u64) -> ForecastResult {
        ForecastResult {
            product_id,
            period: ForecastPeriod::Month,
            predicted_quantity,
            algorithm_used: ForecastAlgorithm::MovingAverage,
            confidence_level: 20,
            methodology: Vec::new(),
            recommended_safety_stock: 0,
            calculation_date: Utc::now(),
            daily_average: 0.0,
            horizon_days: 30,
            statistics: Statistics::default(),
            confidence_factors: Vec::new(),
            recommendation: StockRecommendation {
                current_stock: 0,
                safety_stock: 0,
                deficit: 0,
                reorder_quantity: 0,
            },
        }
    }

    #[tokio::test]
    async fn history_is_limited_to_lookback_window() {
        let (dataset, paracetamol, _) = dataset();
        let data = InMemoryPharmacyData::from_dataset(dataset, LookbackConfig::default());

        let month = data
            .get_consumption_series(paracetamol, ForecastPeriod::Month)
            .await
            .unwrap();
        assert_eq!(month.daily_quantities().len(), 90);

        let quarter = data
            .get_consumption_series(paracetamol, ForecastPeriod::Quarter)
            .await
            .unwrap();
        assert_eq!(quarter.daily_quantities().len(), 180);

        // Only 200 days were recorded.
        let year = data
            .get_consumption_series(paracetamol, ForecastPeriod::Year)
            .await
            .unwrap();
        assert_eq!(year.daily_quantities().len(), 200);
    }

    #[tokio::test]
    async fn known_product_without_history_gets_empty_series() {
        let (dataset, _, insulin) = dataset();
        let data = InMemoryPharmacyData::from_dataset(dataset, LookbackConfig::default());
        let series = data
            .get_consumption_series(insulin, ForecastPeriod::Month)
            .await
            .unwrap();
        assert!(series.is_empty());
        assert_eq!(data.get_current_stock(insulin).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_product_is_unavailable() {
        let (dataset, _, _) = dataset();
        let data = InMemoryPharmacyData::from_dataset(dataset, LookbackConfig::default());
        let err = data.get_current_stock(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn catalog_filters_by_area() {
        let (dataset, paracetamol, _) = dataset();
        let ward = dataset.products[0].area_id;
        let data = InMemoryPharmacyData::from_dataset(dataset, LookbackConfig::default());

        assert_eq!(data.get_product_catalog(None).await.unwrap().len(), 2);
        let ward_products = data.get_product_catalog(ward).await.unwrap();
        assert_eq!(ward_products.len(), 1);
        assert_eq!(ward_products[0].id, paracetamol);
    }

    #[tokio::test]
    async fn dataset_round_trips_through_json_file() {
        let (dataset, paracetamol, _) = dataset();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pharmacy.json");
        std::fs::write(&path, serde_json::to_string(&dataset).unwrap()).unwrap();

        let data = InMemoryPharmacyData::from_json_file(&path, LookbackConfig::default())
            .await
            .unwrap();
        assert_eq!(data.as_of(), date(2024, 6, 30));
        assert_eq!(data.get_current_stock(paracetamol).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn malformed_dataset_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let result = InMemoryPharmacyData::from_json_file(&path, LookbackConfig::default()).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn save_replaces_previous_record() {
        let repository = InMemoryForecastRepository::new();
        let product_id = Uuid::new_v4();

        repository.save(&forecast(product_id, 10)).await.unwrap();
        repository.save(&forecast(product_id, 25)).await.unwrap();

        assert_eq!(repository.len(), 1);
        let stored = repository
            .find(product_id, ForecastPeriod::Month)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.predicted_quantity, 25);
        assert!(repository
            .find(product_id, ForecastPeriod::Year)
            .await
            .unwrap()
            .is_none());
    }
}
