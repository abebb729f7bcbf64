use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pharmastock_forecast::{
    config::{ForecastConfig, LookbackConfig},
    ml::{calculate_statistics, AlgorithmSelector},
    models::{ConsumptionSeries, ForecastPeriod, Product},
    repositories::{InMemoryForecastRepository, InMemoryPharmacyData, PharmacyDataset},
    services::{BulkGenerationRequest, BulkRunControl, ForecastingService},
};
use std::sync::Arc;
use uuid::Uuid;

fn history(days: usize) -> Vec<f64> {
    (0..days)
        .map(|i| 20.0 + (i % 7) as f64 * 1.5 + i as f64 * 0.01)
        .collect()
}

fn last_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn service_for(products: usize) -> ForecastingService {
    let mut dataset = PharmacyDataset {
        as_of: Some(last_day()),
        ..PharmacyDataset::default()
    };
    for index in 0..products {
        let id = Uuid::new_v4();
        dataset.products.push(Product {
            id,
            name: format!("Product {}", index),
            area_id: None,
        });
        dataset.stock.insert(id, 100);
        let series = ConsumptionSeries::from_daily_quantities(last_day(), &history(365));
        dataset.consumption.insert(id, series.records().to_vec());
    }

    let data = Arc::new(InMemoryPharmacyData::from_dataset(
        dataset,
        LookbackConfig::default(),
    ));
    ForecastingService::new(
        data.clone(),
        data.clone(),
        data,
        Arc::new(InMemoryForecastRepository::new()),
        ForecastConfig::default(),
    )
}

// Daily-average estimation across every method branch
fn estimation_benchmark(c: &mut Criterion) {
    let selector = AlgorithmSelector::default();
    let mut group = c.benchmark_group("daily_estimate");

    for days in [5usize, 20, 60, 365].iter() {
        let quantities = history(*days);
        group.bench_with_input(BenchmarkId::from_parameter(days), &quantities, |b, q| {
            b.iter(|| selector.estimate(black_box(q)))
        });
    }

    group.finish();
}

fn statistics_benchmark(c: &mut Criterion) {
    let quantities = history(365);
    c.bench_function("statistics_365_days", |b| {
        b.iter(|| calculate_statistics(black_box(&quantities)))
    });
}

// Full single-product calculation including methodology trail
fn forecast_from_series_benchmark(c: &mut Criterion) {
    let service = service_for(0);
    let series = ConsumptionSeries::from_daily_quantities(last_day(), &history(180));

    c.bench_function("forecast_from_series_180_days", |b| {
        b.iter(|| {
            service
                .forecast_from_series(Uuid::nil(), ForecastPeriod::Quarter, black_box(&series), 50)
                .unwrap()
        })
    });
}

fn bulk_generation_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let service = service_for(100);
    let mut group = c.benchmark_group("generate_all");
    group.sample_size(20);

    group.bench_function("100_products_all_periods", |b| {
        b.to_async(&runtime).iter(|| async {
            service
                .generate_all(BulkGenerationRequest::default(), BulkRunControl::new())
                .await
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    estimation_benchmark,
    statistics_benchmark,
    forecast_from_series_benchmark,
    bulk_generation_benchmark
);
criterion_main!(benches);
