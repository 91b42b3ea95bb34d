use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use octofhir_normalize::{NormalizationConfig, NormalizationEngine, OperationQueue};
use serde_json::{Value, json};

#[derive(Parser)]
#[command(name = "normalize")]
#[command(about = "Apply a normalization operation to a FHIR resource")]
#[command(version)]
struct Cli {
    /// Path to the operation descriptor (JSON)
    #[arg(short, long)]
    operation: PathBuf,
    /// Path to the resource (JSON)
    #[arg(short, long)]
    resource: PathBuf,
    /// Optional engine configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Per-operation timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Pretty-print the result
    #[arg(long)]
    pretty: bool,
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NormalizationConfig::from_json_file(path)?,
        None => NormalizationConfig::default(),
    };
    if let Some(ms) = cli.timeout_ms {
        config.queue.operation_timeout = Duration::from_millis(ms);
    }

    let operation = read_json(&cli.operation)?;
    let resource = read_json(&cli.resource)?;

    let engine = NormalizationEngine::r4();
    let format = octofhir_normalize::JsonFormat::new(engine.schema().clone());
    let queue = OperationQueue::with_engine(engine, config.queue)?;

    let result = queue.enqueue_json(&operation, &resource).await;
    queue.shutdown().await;

    let output = json!({
        "status": result.status,
        "errorMessage": result.error_message,
        "resource": result.resource.as_ref().map(|node| format.to_value(node)),
    });
    if cli.pretty {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", serde_json::to_string(&output)?);
    }

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
