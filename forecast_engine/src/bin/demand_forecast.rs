use anyhow::Context;
use clap::{Parser, Subcommand};
use forecast_engine::bulk::BulkRequest;
use forecast_engine::prelude::*;
use forecast_engine::utils::{generate_demand_records, parse_date, SyntheticShape};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "demand-forecast", about = "Train demand models and forecast SKUs")]
struct Args {
    /// CSV file of demand records. Synthetic data is generated when omitted.
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Days of synthetic history per store/SKU
    #[arg(long, global = true, default_value_t = 180)]
    synthetic_days: usize,

    /// Held-out share of examples (overrides DEMAND_TEST_FRACTION)
    #[arg(long, global = true)]
    test_fraction: Option<f64>,

    /// Seed for the split and the ensembles (overrides DEMAND_SEED)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print dataset statistics
    Stats,
    /// Train every model family and print the report
    Train,
    /// Forecast one store/SKU
    Predict {
        #[arg(long)]
        store: Option<String>,
        #[arg(long)]
        sku: String,
        /// First forecast day (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last forecast day (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        #[arg(long)]
        interval: bool,
        /// random_forest, gradient_boosting or linear_regression
        #[arg(long)]
        model: Option<ModelKind>,
    },
    /// Forecast many SKUs of one store
    Bulk {
        #[arg(long)]
        store: Option<String>,
        /// Comma-separated SKUs, every SKU of the store when omitted
        #[arg(long, value_delimiter = ',')]
        skus: Vec<String>,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        interval: bool,
    },
    /// Print a store's 30-day summary
    Store { store: String },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let engine = DemandForecastEngine::from_env().context("invalid DEMAND_* configuration")?;
    let records = match &args.data {
        Some(path) => load_csv(path).with_context(|| format!("load {}", path.display()))?,
        None => generate_demand_records(&SyntheticShape {
            days: args.synthetic_days,
            seed: args.seed.unwrap_or(engine.config().seed),
            ..Default::default()
        })?,
    };
    engine.ingest(records).context("ingest records")?;

    let options = TrainingOptions {
        test_fraction: args.test_fraction,
        seed: args.seed,
    };

    let output = match args.command {
        Command::Stats => serde_json::to_string_pretty(&engine.statistics()?)?,
        Command::Store { store } => serde_json::to_string_pretty(&engine.store_summary(&store)?)?,
        Command::Train => serde_json::to_string_pretty(&engine.train(options)?)?,
        Command::Predict {
            store,
            sku,
            start,
            end,
            interval,
            model,
        } => {
            engine.train(options).context("training failed")?;
            let mut request = PredictionRequest::new(
                EntityKey { store, sku },
                parse_date(&start)?,
                parse_date(&end)?,
            )
            .with_confidence_interval(interval);
            if let Some(kind) = model {
                request = request.with_model(kind);
            }
            engine.predict(&request)?.to_json()?
        }
        Command::Bulk {
            store,
            skus,
            start,
            end,
            interval,
        } => {
            engine.train(options).context("training failed")?;
            let skus = if skus.is_empty() {
                let store = store
                    .as_deref()
                    .context("--store is required when --skus is omitted")?;
                engine.skus_for_store(store)
            } else {
                skus
            };
            let request = BulkRequest {
                store_id: store,
                skus,
                start_date: parse_date(&start)?,
                end_date: parse_date(&end)?,
                include_confidence_interval: interval,
            };
            engine.bulk_predict(&request)?.to_json()?
        }
    };

    println!("{output}");
    Ok(())
}
