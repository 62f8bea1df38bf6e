mod watch;

use clap::{Parser, Subcommand};
use pricewatch_catalog::{CatalogService, RunSummary, VendorTable};
use pricewatch_core::AppConfig;
use pricewatch_db::{MongoStore, Session, StoreConfig};
use pricewatch_scraper::HttpFetcher;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pricewatch")]
#[command(about = "Track Amazon and Flipkart product prices per user")]
struct Cli {
    /// Collection to operate on. Falls back to `PRICEWATCH_USER`.
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Verify the store is reachable and the index is in place.
    Ping,
    /// Scrape a product page and start tracking it.
    Ingest { url: String },
    /// Print a tracked product as JSON.
    Show { url: String },
    /// Record a price observed outside the scrapers.
    AddPrice {
        url: String,
        #[arg(value_parser = pricewatch_core::parse_price)]
        value: Decimal,
    },
    /// Scrape current prices for every tracked product, or just one.
    Refresh {
        #[arg(long)]
        url: Option<String>,
    },
    /// Re-scrape products missing a name, image, or specifications.
    Repair,
    /// Run refresh and repair on `PRICEWATCH_REFRESH_SCHEDULE` until Ctrl-C.
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = pricewatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let user = resolve_user(cli.user.as_deref(), config.default_user.as_deref())?;
    let store_config = StoreConfig::from_app_config(&config);
    let mut session = Session::open(&store_config, &user).await?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let result = run(cli.command, &config, &session, &cancel).await;
    session.close().await;
    result
}

async fn run(
    command: Commands,
    config: &AppConfig,
    session: &Session,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let service = build_service(config, session)?;
    match command {
        Commands::Ping => println!(
            "store reachable; collection \"{}\" ready",
            session.store().collection_name()
        ),
        Commands::Ingest { url } => print_json(&service.ingest(&url, cancel).await?)?,
        Commands::Show { url } => print_json(&service.get_product(&url).await?)?,
        Commands::AddPrice { url, value } => {
            print_json(&service.add_price(&url, value).await?)?;
        }
        Commands::Refresh { url: Some(url) } => {
            let price = service.refresh_product(&url, cancel).await?;
            println!("{url}: {} at {}", price.value, price.timestamp.to_rfc3339());
        }
        Commands::Refresh { url: None } => {
            print_summary("refresh", service.refresh_prices(cancel).await?);
        }
        Commands::Repair => print_summary("repair", service.repair_incomplete(cancel).await?),
        Commands::Watch => watch::run(service, &config.refresh_schedule, cancel.clone()).await?,
    }
    Ok(())
}

fn build_service(
    config: &AppConfig,
    session: &Session,
) -> anyhow::Result<CatalogService<MongoStore>> {
    let fetcher = HttpFetcher::from_app_config(config)?;
    Ok(CatalogService::new(
        session.store().clone(),
        VendorTable::standard(fetcher),
    ))
}

/// The `--user` flag wins over the configured default. Blank values count as
/// unset.
fn resolve_user(flag: Option<&str>, configured: Option<&str>) -> anyhow::Result<String> {
    fn non_blank(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|u| !u.is_empty())
    }

    non_blank(flag)
        .or_else(|| non_blank(configured))
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("no user given; pass --user or set PRICEWATCH_USER"))
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("received ctrl-c, cancelling");
                cancel.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "failed to listen for ctrl-c"),
        }
    });
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_summary(pass: &str, summary: RunSummary) {
    println!(
        "{pass}: scanned {}, updated {}, skipped {}",
        summary.scanned, summary.updated, summary.skipped
    );
}
