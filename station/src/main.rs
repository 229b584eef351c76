use anyhow::Context;
use api::{DetectionClient, UploadFile, UploadPlan};
use clap::{Parser, Subcommand};
use generator::profile::{build_payload_from_config, GeneratorConfig, PayloadStyle};
use gui_bridge::bridge::DashboardBridge;
use gui_bridge::model::DashboardModel;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tooltrackcore::normalizer::{export_operation, OperationResult, ShapeNormalizer};
use tooltrackcore::prelude::Threshold;
use tooltrackcore::telemetry::MetricsRecorder;
use tooltrackcore::threshold::ThresholdController;
use workflow::config::StationConfig;
use workflow::runner::UploadRunner;

mod api;
mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "ToolTrack workstation driver")]
struct Args {
    /// Load the station config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "http://localhost:8000")]
    api_base: String,
    #[arg(long)]
    history_base: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload images or one archive for recognition
    Detect {
        files: Vec<PathBuf>,
        /// Write the classified operation as JSON
        #[arg(long)]
        export: Option<PathBuf>,
        /// Keep the dashboard bridge alive with the result
        #[arg(long, default_value_t = false)]
        serve: bool,
    },
    /// Show the recognition threshold, or set it
    Threshold { value: Option<f64> },
    /// List past operations
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show one past operation
    Operation {
        id: String,
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Aggregate history statistics
    Statistics,
    /// Classify a synthetic payload without contacting the service
    Offline {
        #[arg(long, value_enum, default_value_t = OfflineStyle::Archive)]
        style: OfflineStyle,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 0.85)]
        threshold: f64,
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Run the dashboard bridge until Ctrl+C
    Serve,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OfflineStyle {
    Single,
    Positional,
    Archive,
}

impl From<OfflineStyle> for PayloadStyle {
    fn from(style: OfflineStyle) -> Self {
        match style {
            OfflineStyle::Single => PayloadStyle::Single,
            OfflineStyle::Positional => PayloadStyle::Positional,
            OfflineStyle::Archive => PayloadStyle::Archive,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = if let Some(path) = &args.config {
        StationConfig::load(path)?
    } else {
        StationConfig::from_args(&args.api_base, args.history_base.as_deref())?
    };

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;
    runtime.block_on(run(config, args.command))
}

async fn run(config: StationConfig, command: Command) -> anyhow::Result<()> {
    log::info!(
        "station using detection api {} and history api {}",
        config.api_base,
        config.history_base()
    );
    let mut client = DetectionClient::new(
        config.api_base.clone(),
        config.history_base().clone(),
        config.request_timeout(),
    )?;
    if let Some(toolset) = &config.toolset {
        client = client.with_toolset(toolset.clone());
    }
    let normalizer = ShapeNormalizer::new(config.api_base.clone());

    match command {
        Command::Detect {
            files,
            export,
            serve,
        } => {
            let uploads = files
                .iter()
                .map(UploadFile::read)
                .collect::<Result<Vec<_>, _>>()?;
            let plan = UploadPlan::from_files(uploads)?;
            let controller = ThresholdController::bootstrap(
                client.clone(),
                config.fallback_threshold(),
                config.debounce(),
            )
            .await;
            let threshold = controller.get();

            let runner = UploadRunner::new(
                Arc::new(client),
                normalizer,
                Arc::new(MetricsRecorder::new()),
            );
            let operation = runner
                .run(&plan, threshold, |progress| {
                    println!("processed {}/{}", progress.current, progress.total);
                })
                .await?;
            report(&operation, threshold, export.as_deref())?;

            if serve {
                let bridge = DashboardBridge::new(controller);
                bridge.publish(operation);
                bridge.serve(config.bridge_port).await?;
            }
        }
        Command::Threshold { value } => match value {
            Some(value) => {
                let threshold = Threshold::from_fraction_or_percent(value)?;
                let controller =
                    ThresholdController::new(client, Threshold::DEFAULT, config.debounce());
                controller.commit(threshold).await?;
                println!("recognition threshold set to {}", threshold);
            }
            None => {
                let controller = ThresholdController::bootstrap(
                    client,
                    config.fallback_threshold(),
                    config.debounce(),
                )
                .await;
                println!("recognition threshold: {}", controller.get());
            }
        },
        Command::History { page, limit } => {
            let history = client.history(page, limit).await?;
            for operation in &history.operations {
                println!(
                    "{} {} images={} match={:.1}% status={:?}",
                    operation.id,
                    operation.timestamp,
                    operation.image_count,
                    operation.overall_match,
                    operation.status()
                );
            }
        }
        Command::Operation { id, export } => {
            let raw = client.operation(&id).await?;
            let normalized = normalizer.normalize(&raw);
            if normalized.is_unrecognized() {
                anyhow::bail!("operation {} returned an unrecognized payload", id);
            }
            let threshold = normalized.operation.effective_threshold();
            report(&normalized.operation, threshold, export.as_deref())?;
        }
        Command::Statistics => {
            let statistics = client.statistics().await?;
            println!(
                "operations={} images={} avg_time={:.1}ms avg_accuracy={:.1}%",
                statistics.total_operations,
                statistics.total_images,
                statistics.average_processing_time,
                statistics.average_accuracy
            );
        }
        Command::Offline {
            style,
            seed,
            threshold,
            export,
        } => {
            let threshold = Threshold::from_fraction_or_percent(threshold)?;
            let payload = build_payload_from_config(&GeneratorConfig {
                style: style.into(),
                seed,
                ..Default::default()
            });
            let operation = normalizer
                .normalize(&payload)
                .operation
                .with_threshold(threshold);
            report(&operation, threshold, export.as_deref())?;
        }
        Command::Serve => {
            let controller = ThresholdController::bootstrap(
                client,
                config.fallback_threshold(),
                config.debounce(),
            )
            .await;
            let bridge = DashboardBridge::new(controller);
            bridge.serve(config.bridge_port).await?;
        }
    }

    Ok(())
}

fn report(operation: &OperationResult, threshold: Threshold, export: Option<&Path>) -> anyhow::Result<()> {
    let snapshot = tooltrackcore::threshold::ThresholdSnapshot {
        committed: threshold,
        pending: threshold,
        last_error: None,
    };
    let model = DashboardModel::build(operation, snapshot);
    println!(
        "Operation -> images {}, failed {}, threshold {}, status {:?}",
        model.images.len(),
        operation.failed_images(),
        threshold,
        model.status
    );
    for image in &model.images {
        println!(
            "  #{} {} verdict={:?} detected={}",
            image.image_number,
            image.source_name.as_deref().unwrap_or("-"),
            image.verdict,
            image.detected
        );
        if let Some(error) = &image.error {
            println!("     error: {}", error);
        }
    }

    if let Some(path) = export {
        let exported = export_operation(&operation.clone().with_threshold(threshold));
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&exported)?)
            .with_context(|| format!("writing export {}", path.display()))?;
        println!("exported to {}", path.display());
    }
    Ok(())
}
