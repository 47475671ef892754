//! ForexSync batch binary.

use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forexsync_common::{Currency, PairPackage, RatePair};
use forexsync_fx::registry;
use forexsync_store::{
    FileCheckpoint, ForexHandler, JsonFileRateRepository, JsonFileTaskQueue, RateStore,
    RecordStatus,
};

use forexsync_batch::{BatchConfig, OnDemandController, RangeWalker, TracingNotifier};

#[derive(Debug, Clone)]
struct CurrencyList(Vec<Currency>);

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("Not a valid date: '{}'", value))
}

fn parse_currency_list(value: &str) -> Result<CurrencyList, String> {
    Currency::parse_list(value)
        .map(CurrencyList)
        .map_err(|_| format!("Not a valid currency list: '{}'", value))
}

#[derive(Parser, Debug)]
#[command(name = "forex-batch", version, about = "ForexSync ingestion batch")]
struct Cli {
    /// Propagate every failure instead of recording it and moving on
    #[arg(long)]
    strict: bool,

    /// Root directory of the rate store, task queue and checkpoints
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process queued ingestion tasks
    OnDemand {
        /// Internal process identifier
        instance: String,
    },

    /// Fill exchange dates walking backwards
    Updater {
        /// Provider name
        #[arg(value_parser = clap::builder::PossibleValuesParser::new(registry::provider_names()))]
        source: String,

        /// Internal process identifier
        instance: String,

        /// Start date, YYYY-MM-DD. Enables historic mode
        #[arg(short = 's', long, value_parser = parse_date)]
        start_date: Option<NaiveDate>,

        /// Days to go backwards
        #[arg(short = 'd', long, default_value_t = 0)]
        days_ago: u32,

        /// Comma-separated currency codes. Defaults to every supported currency
        #[arg(long, value_parser = parse_currency_list)]
        currencies_list: Option<CurrencyList>,
    },

    /// Queue an ingestion task for one exchange date
    Enqueue {
        /// Exchange date, YYYY-MM-DD
        #[arg(value_parser = parse_date)]
        date: NaiveDate,

        /// Comma-separated currency codes. Defaults to every supported currency
        #[arg(long, value_parser = parse_currency_list)]
        currencies_list: Option<CurrencyList>,

        /// Pull even if every pair is already stored
        #[arg(long)]
        force: bool,
    },

    /// Print one stored rate
    Rate {
        /// Exchange date, YYYY-MM-DD
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
        base: String,
        quote: String,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = BatchConfig::from_env();
    config.strict |= cli.strict;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Command::Updater {
        source,
        instance,
        start_date,
        days_ago,
        currencies_list,
    } = &cli.command
    {
        config.source = source.clone();
        config.instance = instance.clone();
        config.range.start_date = *start_date;
        config.range.days_ago = *days_ago;
        config.range.currencies = currencies_list.as_ref().map(|list| list.0.clone());
    }
    if let Command::OnDemand { instance } = &cli.command {
        config.instance = instance.clone();
    }

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let store = Arc::new(RateStore::new(Arc::new(JsonFileRateRepository::open(
        config.rates_dir(),
    )?)));

    match cli.command {
        Command::OnDemand { .. } => {
            let provider = registry::build_provider(&config.source, &config.providers)?;
            let queue = Arc::new(JsonFileTaskQueue::open(config.queue_path())?);
            let checkpoint = Arc::new(FileCheckpoint::open(config.checkpoint_path())?);

            let mut controller = OnDemandController::new(
                store,
                queue,
                provider,
                checkpoint,
                Arc::new(TracingNotifier),
                config.on_demand.clone(),
                config.instance.clone(),
                config.strict,
            );
            controller.run().await?;
        }
        Command::Updater { .. } => {
            let provider = registry::build_provider(&config.source, &config.providers)?;
            let checkpoint = Arc::new(FileCheckpoint::open(config.checkpoint_path())?);

            let mut walker = RangeWalker::new(
                store,
                provider,
                checkpoint,
                Arc::new(TracingNotifier),
                config.range.clone(),
                config.instance.clone(),
                config.strict,
            );
            let totals = walker.run().await?;
            info!(
                ok = totals.processed_ok,
                errors = totals.processed_error,
                "Range walk complete"
            );
        }
        Command::Enqueue {
            date,
            currencies_list,
            force,
        } => {
            let queue = Arc::new(JsonFileTaskQueue::open(config.queue_path())?);
            let handler = ForexHandler::new(store, queue);

            let package = match currencies_list {
                Some(list) => PairPackage::with_custom_pairs(date, &list.0),
                None => PairPackage::with_default_pairs(date),
            };
            let status = force.then_some(RecordStatus::ForceProcess);
            let task = handler.enqueue_one(package, status)?;
            println!("{}", task.id());
        }
        Command::Rate { date, base, quote } => {
            let queue = Arc::new(JsonFileTaskQueue::open(config.queue_path())?);
            let handler = ForexHandler::new(store, queue);

            let request = PairPackage::for_date(date).with_pairs(vec![RatePair::new(&base, &quote)?]);
            match handler.get_one_rate_value(&request)? {
                Some(value) => println!("{}", value),
                None => {
                    return Err(anyhow::anyhow!(
                        "No stored rate for {}/{} on {}",
                        base,
                        quote,
                        date
                    ))
                }
            }
        }
    }

    Ok(())
}
