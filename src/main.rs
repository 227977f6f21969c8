use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epg_loader::{
    config::Config,
    database::Database,
    ingestor::{EpgIngestor, SourceDriver},
};

#[derive(Parser)]
#[command(name = "epg-loader")]
#[command(version = "0.1.0")]
#[command(about = "Loads XMLTV program-guide feeds into the EPG store")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Load only this source, even when it is flagged hand-only
    #[arg(short, long, value_name = "NAME")]
    source: Option<String>,

    /// Do not purge expired events after loading
    #[arg(long)]
    skip_retention: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("epg_loader={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting EPG loader v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }
    info!("Using database: {}", config.database.url);

    let database = Database::new(&config.database).await?;
    database.migrate().await?;

    let timezone = config.ingestion.timezone()?;
    let ingestor = EpgIngestor::new(database.clone(), &config.ingestion)?;
    let driver = SourceDriver::new(database, ingestor, timezone, config.ingestion.retention_days)
        .with_sweep(!cli.skip_retention);

    let summary = match cli.source {
        Some(name) => driver.run_named(&name).await?,
        None => driver.run_scheduled().await?,
    };

    for report in &summary.sources {
        match &report.error {
            None => info!(
                "{}: {} stored, {} unmapped, {} malformed, {} buckets",
                report.source_name, report.stored, report.unmapped, report.malformed, report.buckets
            ),
            Some(error) => warn!("{}: failed - {}", report.source_name, error),
        }
    }
    info!("{} expired events purged", summary.purged);

    Ok(())
}
