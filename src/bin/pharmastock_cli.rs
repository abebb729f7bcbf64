use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use pharmastock_forecast::{
    config::{self, AppConfig},
    events::{process_events, EventSender},
    metrics,
    models::{ConsumptionSeries, ForecastPeriod, ForecastResult},
    repositories::{InMemoryForecastRepository, InMemoryPharmacyData, PharmacyDataset},
    services::{
        BatchProgress, BatchReport, BulkGenerationRequest, BulkRunControl, CancellationFlag,
        ForecastingService,
    },
};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_DATA_FILE: &str = "data/sample_pharmacy.json";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json || config.is_production());
    let context = CliContext::new(config, cli.data.clone());

    match cli.command {
        Commands::Forecast(args) => handle_forecast(&context, args, cli.json).await?,
        Commands::GenerateAll(args) => handle_generate_all(&context, args, cli.json).await?,
        Commands::Explain(args) => handle_explain(&context, args, cli.json)?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "pharmastock",
    about = "Consumption forecasts and reorder advice for hospital pharmacy stock",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(
        long,
        global = true,
        help = "Pharmacy dataset (JSON); overrides `data_file` from the configuration"
    )]
    data: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast one product for one period
    Forecast(ForecastArgs),
    /// Regenerate forecasts for every product in the catalog
    GenerateAll(GenerateAllArgs),
    /// Run the calculation on an inline series and print the full derivation
    Explain(ExplainArgs),
}

#[derive(Args)]
struct ForecastArgs {
    #[arg(long, help = "Product identifier")]
    product: Uuid,
    #[arg(long, default_value = "month", help = "month, quarter or year")]
    period: ForecastPeriod,
}

#[derive(Args)]
struct GenerateAllArgs {
    #[arg(long, help = "Only products of this hospital area")]
    area: Option<Uuid>,
    #[arg(long, help = "Only this period; all periods when omitted")]
    period: Option<ForecastPeriod>,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Print Prometheus metrics after the run"
    )]
    metrics: bool,
}

#[derive(Args)]
struct ExplainArgs {
    #[arg(
        long,
        value_delimiter = ',',
        help = "Daily quantities, oldest first (e.g. 10,12,11,13)"
    )]
    quantities: Vec<f64>,
    #[arg(long, default_value_t = 0, help = "Units currently on hand")]
    stock: i64,
    #[arg(long, default_value = "month", help = "month, quarter or year")]
    period: ForecastPeriod,
    #[arg(long, help = "Date of the last quantity; defaults to today")]
    last_day: Option<NaiveDate>,
}

async fn handle_forecast(context: &CliContext, args: ForecastArgs, json: bool) -> Result<()> {
    let service = context.dataset_service().await?;
    let result = service
        .compute_forecast(args.product, args.period)
        .await
        .with_context(|| format!("failed to forecast product {}", args.product))?;
    service
        .persist_forecast(&result)
        .await
        .context("failed to store forecast")?;

    if json {
        print_json(&result)?;
    } else {
        render_forecast(&result, false);
    }
    Ok(())
}

async fn handle_generate_all(
    context: &CliContext,
    args: GenerateAllArgs,
    json: bool,
) -> Result<()> {
    let service = context.dataset_service().await?;
    let cancellation = CancellationFlag::new();

    let ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight forecasts");
            ctrl_c.cancel();
        }
    });

    let mut control = BulkRunControl::new().with_cancellation(cancellation);
    if !json {
        control = control.with_progress_callback(|progress: BatchProgress| {
            eprintln!(
                "[{}/{}] {} ok, {} failed",
                progress.completed, progress.total, progress.succeeded, progress.failed
            );
        });
    }

    let request = BulkGenerationRequest {
        area_id: args.area,
        period: args.period,
    };
    let report = service
        .generate_all(request, control)
        .await
        .context("bulk generation failed")?;

    if json {
        print_json(&report)?;
    } else {
        render_report(&report);
    }

    if args.metrics {
        let exposition = metrics::render().map_err(|e| anyhow!(e.to_string()))?;
        println!("{}", exposition);
    }
    Ok(())
}

fn handle_explain(context: &CliContext, args: ExplainArgs, json: bool) -> Result<()> {
    if args.quantities.is_empty() {
        bail!("--quantities needs at least one value");
    }
    let last_day = args.last_day.unwrap_or_else(|| Utc::now().date_naive());
    let series = ConsumptionSeries::from_daily_quantities(last_day, &args.quantities);

    let result = context
        .inline_service()
        .forecast_from_series(Uuid::nil(), args.period, &series, args.stock)
        .context("cannot forecast the given series")?;

    if json {
        print_json(&result)?;
    } else {
        render_forecast(&result, true);
    }
    Ok(())
}

struct CliContext {
    config: AppConfig,
    data_override: Option<PathBuf>,
    repository: Arc<InMemoryForecastRepository>,
    event_sender: EventSender,
}

impl CliContext {
    fn new(config: AppConfig, data_override: Option<PathBuf>) -> Self {
        let (event_sender, event_rx) = EventSender::channel(config.event_channel_capacity);
        tokio::spawn(process_events(event_rx));

        Self {
            config,
            data_override,
            repository: Arc::new(InMemoryForecastRepository::new()),
            event_sender,
        }
    }

    fn data_file(&self) -> PathBuf {
        self.data_override
            .clone()
            .or_else(|| self.config.data_file.clone().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE))
    }

    /// Service over the pharmacy dataset file.
    async fn dataset_service(&self) -> Result<ForecastingService> {
        let data_file = self.data_file();
        debug!(target: "pharmastock_cli", path = %data_file.display(), "loading dataset");

        let data = InMemoryPharmacyData::from_json_file(
            &data_file,
            self.config.forecast.lookback_days.clone(),
        )
        .await
        .with_context(|| format!("failed to load dataset {}", data_file.display()))?;
        Ok(self.service_over(Arc::new(data)))
    }

    /// Service for inline series; its collaborators hold nothing.
    fn inline_service(&self) -> ForecastingService {
        let data = InMemoryPharmacyData::from_dataset(
            PharmacyDataset::default(),
            self.config.forecast.lookback_days.clone(),
        );
        self.service_over(Arc::new(data))
    }

    fn service_over(&self, data: Arc<InMemoryPharmacyData>) -> ForecastingService {
        ForecastingService::new(
            data.clone(),
            data.clone(),
            data,
            self.repository.clone(),
            self.config.forecast.clone(),
        )
        .with_events(self.event_sender.clone())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_forecast(result: &ForecastResult, with_methodology: bool) {
    println!(
        "Product {} • {} • {} units ({:.2}/day over {} days)",
        result.product_id,
        result.period,
        result.predicted_quantity,
        result.daily_average,
        result.horizon_days
    );
    println!(
        "  algorithm {} • confidence {}%",
        result.algorithm_used, result.confidence_level
    );
    for factor in &result.confidence_factors {
        println!("    {:+.1} {} ({})", factor.impact, factor.factor_name, factor.reason);
    }
    println!(
        "  stock {} • safety stock {} • deficit {} • reorder {}",
        result.recommendation.current_stock,
        result.recommended_safety_stock,
        result.recommendation.deficit,
        result.recommendation.reorder_quantity
    );

    if with_methodology {
        println!("  methodology:");
        for step in &result.methodology {
            println!(
                "    {}. {} [{:?}] {}",
                step.step_number, step.name, step.status, step.formula
            );
            for (name, value) in &step.outputs {
                println!("         {} = {:.4}", name, value);
            }
        }
    }
}

fn render_report(report: &BatchReport) {
    println!(
        "Run {} • {} succeeded • {} failed • {}/{} attempted{}",
        report.run_id,
        report.succeeded.len(),
        report.failed.len(),
        report.total_attempted,
        report.total_scheduled,
        if report.cancelled { " • cancelled" } else { "" }
    );
    for result in &report.succeeded {
        if result.recommendation.reorder_quantity > 0 {
            println!(
                "- reorder {} units of {} ({})",
                result.recommendation.reorder_quantity, result.product_id, result.period
            );
        }
    }
    for failure in &report.failed {
        println!(
            "! {} ({}): {} - {}",
            failure.product_id, failure.period, failure.reason, failure.error
        );
    }
}
