use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use canguard::config::{CanguardConfig, LoggingConfig};
use canguard::model::{FileModelStore, ModelStore};
use canguard::sink::SqliteSink;
use canguard::telemetry::MessageType;

#[derive(Parser)]
#[command(
    name = "canguard",
    about = "Real-time anomaly detection for vehicle CAN telemetry",
    version,
    long_about = None
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "CANGUARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect anomalies in a stream of JSON-lines messages
    Run {
        /// Input file; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Show the status of persisted outlier models
    Models {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List recently recorded anomalies
    Anomalies {
        /// Maximum number of records
        #[arg(long, default_value = "20")]
        limit: usize,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, source) = match &cli.config {
        Some(path) => CanguardConfig::load_required(path)?,
        None => CanguardConfig::load_or_default(),
    };
    init_tracing(&config.logging);
    source.log();

    match cli.command {
        Commands::Run { input } => {
            let summary = match input {
                Some(path) => {
                    tracing::info!(path = %path.display(), "Reading messages from file");
                    let file = tokio::fs::File::open(&path)
                        .await
                        .with_context(|| format!("failed to open input: {}", path.display()))?;
                    canguard::run(&config, BufReader::new(file)).await?
                }
                None => {
                    tracing::info!("Reading messages from stdin");
                    canguard::run(&config, BufReader::new(tokio::io::stdin())).await?
                }
            };

            println!(
                "processed {} messages ({} unparsed, {} rejected), {} anomalies, {} written",
                summary.messages,
                summary.unparsed,
                summary.rejected,
                summary.anomalies,
                summary.sink.written
            );
        }
        Commands::Models { json } => {
            let store = FileModelStore::new(&config.detector.model_store_path);
            let infos = store.describe();

            if json {
                println!("{}", serde_json::to_string_pretty(&infos)?);
            } else {
                println!("\nOutlier models in {}", store.dir().display());
                println!(
                    "{:<15} | {:>9} | {:>5} | {:>13} | {:>6} | Samples",
                    "Type", "Size (KB)", "Trees", "Contamination", "Seed"
                );
                println!("{:-<15}-|-{:-<9}-|-{:-<5}-|-{:-<13}-|-{:-<6}-|-{:-<7}", "", "", "", "", "", "");
                for mt in MessageType::ALL {
                    match infos.iter().find(|i| i.message_type == mt) {
                        Some(info) => println!(
                            "{:<15} | {:>9.1} | {:>5} | {:>13.3} | {:>6} | {}",
                            mt.as_str(),
                            info.size_kb,
                            info.n_trees,
                            info.contamination,
                            info.random_seed,
                            info.training_samples
                        ),
                        None => {
                            let state = match store.load(mt) {
                                Ok(Some(_)) => "unreadable",
                                Ok(None) => "not trained",
                                Err(_) => "unreadable",
                            };
                            println!("{:<15} | {}", mt.as_str(), state);
                        }
                    }
                }
                println!();
            }
        }
        Commands::Anomalies { limit, json } => {
            let pool = canguard::storage::open_pool(&config.storage.db_path)?;
            let sink = SqliteSink::new(pool);
            let records = sink.list_recent(limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No anomalies recorded.");
            } else {
                println!(
                    "{:<25} | {:<12} | {:<32} | {:<8} | Details",
                    "Detected", "Vehicle", "Type", "Severity"
                );
                println!("{:-<25}-|-{:-<12}-|-{:-<32}-|-{:-<8}-|-{:-<40}", "", "", "", "", "");
                for a in records {
                    println!(
                        "{:<25} | {:<12} | {:<32} | {:<8} | {}",
                        a.detected_at.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
                        a.vehicle_id,
                        a.anomaly_type.as_str(),
                        a.severity.as_str(),
                        a.details
                    );
                }
            }
        }
    }

    Ok(())
}
