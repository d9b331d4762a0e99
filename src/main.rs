use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use nugul_ingest::api_sink::ApiSink;
use nugul_ingest::config::Config;
use nugul_ingest::error::IngestError;
use nugul_ingest::geocode::{Geocoder, KakaoGeocoder};
use nugul_ingest::logging;
use nugul_ingest::pipeline::{IngestPipeline, RunSummary};
use nugul_ingest::sink::RecordSink;

#[derive(Parser)]
#[command(name = "nugul_ingest")]
#[command(about = "NugulMap smoking-zone dataset ingestion pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a directory of downloaded CSV datasets into the record sink
    Upload {
        /// Directory containing the CSV snapshot
        #[arg(long, default_value = "data")]
        dir: PathBuf,
        /// Upload through the zone CRUD API instead of the database sink
        #[arg(long)]
        api: bool,
        /// Skip address geocoding even when an API key is configured
        #[arg(long)]
        no_geocode: bool,
    },
    /// Run database migrations
    #[cfg(feature = "db")]
    Migrate,
}

fn create_geocoder(no_geocode: bool, config: &Config) -> Option<Arc<dyn Geocoder>> {
    if no_geocode {
        info!("Geocoding disabled; rows without coordinates will be dropped");
        return None;
    }
    match std::env::var("KAKAO_REST_API_KEY") {
        Ok(api_key) if !api_key.trim().is_empty() => {
            match KakaoGeocoder::new(api_key, &config.geocoder) {
                Ok(geocoder) => Some(Arc::new(geocoder)),
                Err(e) => {
                    warn!("Failed to build geocoder, continuing without enrichment: {e}");
                    None
                }
            }
        }
        _ => {
            warn!("KAKAO_REST_API_KEY not set; rows without coordinates will be dropped");
            None
        }
    }
}

async fn create_sink(use_api: bool, config: &Config) -> anyhow::Result<Arc<dyn RecordSink>> {
    if use_api {
        info!("Uploading through the zone API at {}", config.upload.endpoint);
        return Ok(Arc::new(ApiSink::new(config.upload.endpoint.clone())));
    }

    #[cfg(feature = "db")]
    {
        let db = nugul_ingest::db::ZoneDb::new().await?;
        Ok(Arc::new(db))
    }

    #[cfg(not(feature = "db"))]
    {
        warn!("Built without the `db` feature; using the in-memory sink");
        println!("⚠️  No database backend compiled in - records will not persist");
        Ok(Arc::new(nugul_ingest::sink::InMemorySink::new()))
    }
}

/// Persist the run summary to a timestamped JSON file for later inspection.
fn persist_summary(summary: &RunSummary, output_dir: &str) -> anyhow::Result<String> {
    std::fs::create_dir_all(output_dir)?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let filepath = std::path::Path::new(output_dir).join(format!("ingest_{timestamp}.json"));

    let json_content = serde_json::to_string_pretty(summary)?;
    std::fs::write(&filepath, json_content)?;

    Ok(filepath.to_string_lossy().to_string())
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 Ingest summary:");
    for outcome in &summary.outcomes {
        match &outcome.skipped {
            Some(reason) => println!("   ⏩ {}: skipped ({reason})", outcome.file),
            None => println!(
                "   📄 {}: {} loaded, {} duplicates, {} rejected, {} failed",
                outcome.file, outcome.loaded, outcome.duplicates, outcome.rejected, outcome.failed
            ),
        }
    }
    println!(
        "   Total: {} loaded, {} duplicates, {} rejected, {} files skipped",
        summary.total_loaded(),
        summary.total_duplicates(),
        summary.total_rejected(),
        summary.skipped_files()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default();

    match cli.command {
        Commands::Upload {
            dir,
            api,
            no_geocode,
        } => {
            println!("🔄 Ingesting CSV datasets from {}...", dir.display());

            let sink = create_sink(api, &config).await?;
            let geocoder = create_geocoder(no_geocode, &config);
            let pipeline = IngestPipeline::new(sink, geocoder);

            match pipeline.run(&dir).await {
                Ok(summary) => {
                    info!("Ingest run finished");
                    print_summary(&summary);
                    match persist_summary(&summary, "output") {
                        Ok(path) => info!("Saved run summary to {path}"),
                        Err(e) => warn!("Failed to save run summary: {e}"),
                    }
                }
                Err(IngestError::NoInput(dir)) => {
                    warn!("No CSV files found in {dir}");
                    println!("⚠️  Nothing to do: no CSV files in {dir}");
                }
                Err(e) => {
                    error!("Ingest run failed: {e}");
                    return Err(e.into());
                }
            }
        }
        #[cfg(feature = "db")]
        Commands::Migrate => {
            let db = nugul_ingest::db::ZoneDb::new().await?;
            db.run_migrations().await?;
            println!("✅ Migrations applied");
        }
    }

    Ok(())
}
