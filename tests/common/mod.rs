#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use pharmastock_forecast::{
    config::{ForecastConfig, LookbackConfig},
    models::{ConsumptionRecord, ConsumptionSeries, Product},
    repositories::{InMemoryForecastRepository, InMemoryPharmacyData, PharmacyDataset},
    services::ForecastingService,
};
use uuid::Uuid;

/// Last day of every fixture history.
pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

pub fn series(quantities: &[f64]) -> ConsumptionSeries {
    ConsumptionSeries::from_daily_quantities(as_of(), quantities)
}

/// Builder for an in-memory pharmacy with a known catalog.
#[derive(Default)]
pub struct PharmacyFixture {
    dataset: PharmacyDataset,
}

impl PharmacyFixture {
    pub fn new() -> Self {
        Self {
            dataset: PharmacyDataset {
                as_of: Some(as_of()),
                ..PharmacyDataset::default()
            },
        }
    }

    /// Adds a product with a daily history ending on [`as_of`].
    pub fn product(
        mut self,
        name: &str,
        area_id: Option<Uuid>,
        quantities: &[f64],
        stock: i64,
    ) -> (Self, Uuid) {
        let id = Uuid::new_v4();
        self.dataset.products.push(Product {
            id,
            name: name.to_string(),
            area_id,
        });
        self.dataset.stock.insert(id, stock);
        if !quantities.is_empty() {
            let records: Vec<ConsumptionRecord> = series(quantities).records().to_vec();
            self.dataset.consumption.insert(id, records);
        }
        (self, id)
    }

    pub fn build(self) -> Arc<InMemoryPharmacyData> {
        Arc::new(InMemoryPharmacyData::from_dataset(
            self.dataset,
            LookbackConfig::default(),
        ))
    }
}

/// Ten products; the fourth has never been dispensed.
pub fn ten_product_pharmacy() -> (Arc<InMemoryPharmacyData>, Vec<Uuid>) {
    let histories: [&[f64]; 10] = [
        &[10.0, 12.0, 11.0, 13.0, 12.0, 14.0, 13.0],
        &[4.0, 6.0, 5.0],
        &[8.0; 20],
        &[],
        &[3.0; 45],
        &[20.0; 120],
        &[1.0, 0.0, 2.0, 0.0, 1.0],
        &[7.5; 30],
        &[2.0; 90],
        &[50.0; 6],
    ];

    let mut fixture = PharmacyFixture::new();
    let mut ids = Vec::new();
    for (index, history) in histories.iter().enumerate() {
        let (next, id) = fixture.product(&format!("Product {}", index + 1), None, history, 10);
        fixture = next;
        ids.push(id);
    }
    (fixture.build(), ids)
}

pub fn test_config() -> ForecastConfig {
    ForecastConfig {
        fetch_timeout_ms: 1_000,
        persist_timeout_ms: 1_000,
        ..ForecastConfig::default()
    }
}

pub fn service_over(
    data: Arc<InMemoryPharmacyData>,
    repository: Arc<InMemoryForecastRepository>,
    config: ForecastConfig,
) -> ForecastingService {
    ForecastingService::new(data.clone(), data.clone(), data, repository, config)
}

/// Service for calculations on inline series; its collaborators hold nothing.
pub fn offline_service() -> ForecastingService {
    let data = PharmacyFixture::new().build();
    service_over(
        data,
        Arc::new(InMemoryForecastRepository::new()),
        test_config(),
    )
}

pub fn sample_dataset_path() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data/sample_pharmacy.json")
}

pub fn by_id(ids: &[Uuid]) -> HashMap<Uuid, usize> {
    ids.iter().enumerate().map(|(i, id)| (*id, i)).collect()
}
