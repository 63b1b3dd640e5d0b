use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use avail_creator::subscribe::{connect, run_deliveries};
use avail_creator::{telemetry, transform, MetricTransformer, Settings};

#[derive(Parser, Debug)]
#[command(name = "avail-creator")]
#[command(about = "Derive UP/DOWN availability from status-code metrics and republish it")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to the inbound topic and publish availability until interrupted
    Run {
        /// Path to a TOML config file (environment variables prefixed AVAIL_ override it)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Transform a single metric batch file and print the availability records
    Transform {
        /// Path to a JSON metric batch
        #[arg(short, long)]
        input: PathBuf,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run { config } => {
            let settings = Settings::load(config.as_deref())?;
            telemetry::init_tracing(&settings.log_level, settings.log_format)?;

            // Build a tokio runtime for the broker connection
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run(settings))
        }
        Command::Transform { input, pretty } => transform_file(&input, pretty),
    }
}

/// Connect, then process deliveries until Ctrl-C or the subscription ends
async fn run(settings: Settings) -> Result<()> {
    let connected = connect(&settings).await?;

    let transformer = Arc::new(
        MetricTransformer::new(connected.publisher)
            .with_encoding(settings.publish.encoding)
            .skip_empty(settings.publish.skip_empty),
    );
    info!(transformer = ?transformer, "Transformer ready");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                signal.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    run_deliveries(
        connected.deliveries,
        transformer,
        settings.delivery.concurrency,
        shutdown,
    )
    .await;

    // Signal shutdown
    connected.subscription.abort();

    Ok(())
}

/// Run the pure transform on a payload file and print the result
fn transform_file(input: &Path, pretty: bool) -> Result<()> {
    let payload = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let batch = transform(&payload)?;

    let json = if pretty {
        serde_json::to_string_pretty(&batch)?
    } else {
        serde_json::to_string(&batch)?
    };
    println!("{}", json);

    Ok(())
}
