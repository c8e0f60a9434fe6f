//! `treeprice run` — Average property prices per tree-size group.

use std::path::PathBuf;

use clap::ValueEnum;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use treeprice_aggregator::{Aggregator, PipelineReport, pipeline, report};
use treeprice_config::AppConfig;
use treeprice_core::{Error, NumericMode, TreeSizes};
use treeprice_groupify::GroupClassifier;
use treeprice_parsers::AttributeParser;
use treeprice_streams::{CsvRecordStream, JsonTokenStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

pub struct RunArgs {
    pub trees: Option<PathBuf>,
    pub properties: Option<PathBuf>,
    pub format: OutputFormat,
    pub floats: bool,
}

pub async fn run(mut config: AppConfig, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(trees) = args.trees {
        config.input.trees = trees;
    }
    if let Some(properties) = args.properties {
        config.input.properties = properties;
    }
    if args.floats {
        config.numeric.mode = NumericMode::Float;
    }

    let cancel = CancellationToken::new();
    cancel_on_shutdown(cancel.clone());

    let outcome = execute(&config, &cancel).await?;
    let output = match args.format {
        OutputFormat::Json => report::to_json(&outcome.averages)?,
        OutputFormat::Text => report::to_text(&outcome.averages),
    };
    println!("{}", output.trim_end());
    Ok(())
}

/// Open both inputs and run the pipeline.
pub async fn execute(
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Result<PipelineReport, Box<dyn std::error::Error>> {
    let trees = &config.input.trees;
    let properties = &config.input.properties;
    info!(
        trees = %trees.display(),
        properties = %properties.display(),
        mode = %config.numeric.mode,
        "Starting run"
    );

    let tokens = JsonTokenStream::open(trees)
        .await
        .map_err(|e| format!("Failed to open trees file {}: {e}", trees.display()))?;
    let records = CsvRecordStream::open(properties)
        .await
        .map_err(|e| format!("Failed to open properties file {}: {e}", properties.display()))?;

    let parser = AttributeParser::new(records, &config.parser_options()?).map_err(|e| {
        warn!(properties = %properties.display(), "Configured columns do not match the header");
        Error::Column(e)
    })?;
    let classifier = GroupClassifier::new(tokens, TreeSizes);
    let aggregator = Aggregator::new(config.aggregator_config());

    let outcome = pipeline::run(
        classifier,
        parser,
        &aggregator,
        &config.pipeline_config(),
        cancel,
    )
    .await?;

    if outcome.parse.skipped() > 0 {
        warn!(
            short = outcome.parse.short,
            blank = outcome.parse.blank,
            unparseable = outcome.parse.unparseable,
            "Some property records were skipped"
        );
    }
    Ok(outcome)
}

/// Cancel `cancel` on Ctrl-C (and SIGTERM on unix).
fn cancel_on_shutdown(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown signal received, cancelling run");
        cancel.cancel();
    });
}

/// Resolve when `signal` fires. A listener that could not be installed
/// never resolves, so it cannot cancel the run by itself.
async fn until_signal(name: &str, signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!(signal = name, error = %e, "Cannot listen for signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let terminate = async {
        let mut term = signal(SignalKind::terminate())?;
        if term.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
        Ok::<(), std::io::Error>(())
    };
    tokio::select! {
        _ = until_signal("ctrl-c", tokio::signal::ctrl_c()) => {}
        _ = until_signal("terminate", terminate) => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    until_signal("ctrl-c", tokio::signal::ctrl_c()).await;
}
