use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One day of recorded dispensing for a product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub date: NaiveDate,
    pub quantity: f64,
}

impl ConsumptionRecord {
    pub fn new(date: NaiveDate, quantity: f64) -> Self {
        Self { date, quantity }
    }
}

/// Historical daily consumption of a single product over a lookback window.
///
/// Records are kept in chronological order. The series is sparse: a day
/// without an entry contributes no data point, and several entries on the
/// same date are summed into one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumptionSeries {
    records: Vec<ConsumptionRecord>,
}

impl ConsumptionSeries {
    pub fn new(mut records: Vec<ConsumptionRecord>) -> Self {
        records.sort_by_key(|record| record.date);
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a contiguous series ending on `last_day` from raw quantities,
    /// oldest first.
    pub fn from_daily_quantities(last_day: NaiveDate, quantities: &[f64]) -> Self {
        let len = quantities.len() as i64;
        let records = quantities
            .iter()
            .enumerate()
            .map(|(offset, &quantity)| {
                let date = last_day - Duration::days(len - 1 - offset as i64);
                ConsumptionRecord::new(date, quantity)
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[ConsumptionRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|record| record.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|record| record.date)
    }

    /// Rejects quantities a dispensing log can never contain, and histories
    /// whose totals no longer fit in an `f64`.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(record) = self
            .records
            .iter()
            .find(|record| !record.quantity.is_finite() || record.quantity < 0.0)
        {
            return Err(format!(
                "invalid consumption quantity {} on {}",
                record.quantity, record.date
            ));
        }

        let (sum, sum_of_squares) = self
            .daily_quantities()
            .iter()
            .fold((0.0f64, 0.0f64), |(sum, squares), q| (sum + q, squares + q * q));
        if !sum.is_finite() || !sum_of_squares.is_finite() {
            return Err("consumption totals exceed the representable range".to_string());
        }
        Ok(())
    }

    /// One quantity per recorded day, oldest first.
    pub fn daily_quantities(&self) -> Vec<f64> {
        let mut days: Vec<f64> = Vec::with_capacity(self.records.len());
        let mut current: Option<NaiveDate> = None;
        for record in &self.records {
            match days.last_mut() {
                Some(total) if current == Some(record.date) => *total += record.quantity,
                _ => {
                    days.push(record.quantity);
                    current = Some(record.date);
                }
            }
        }
        days
    }

    /// Keeps the records falling inside `[from, to]`.
    pub fn window(&self, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|record| record.date >= from && record.date <= to)
                .copied()
                .collect(),
        }
    }
}

/// Catalog entry for a stocked pharmaceutical product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub area_id: Option<Uuid>,
}
