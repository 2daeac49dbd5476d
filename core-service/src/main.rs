//! NeuroScan CLI - one-shot prediction with PDF report
//!
//! Exit codes: 0 success, 1 per-request failure, 2 model unavailable.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use neuroscan_core::api::commands;
use neuroscan_core::constants::{APP_NAME, APP_VERSION, REPORT_FILENAME};
use neuroscan_core::{ExplanationKind, InferencePipeline, PipelineConfig, PipelineError, PipelineResult, Session};

#[derive(Debug, Parser)]
#[command(name = "neuroscan", version, about = "Classify one scan and write the AI prediction report")]
struct Cli {
    /// Image to classify (PNG, JPEG, BMP, TIFF, GIF)
    image: PathBuf,

    /// Where to write the PDF report
    #[arg(default_value = REPORT_FILENAME)]
    report: PathBuf,

    /// Model manifest, overrides MODEL_MANIFEST
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Explanation strategy (placeholder | gradcam), overrides EXPLANATION_STRATEGY
    #[arg(long)]
    explanation: Option<ExplanationKind>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    log::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: cannot start runtime: {}", e);
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{} ({})", e, e.kind());
            eprintln!("error: {}", e);
            if e.is_fatal() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

async fn run(cli: Cli) -> PipelineResult<()> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(manifest) = cli.manifest {
        config.manifest_path = manifest;
    }
    if let Some(kind) = cli.explanation {
        config.explanation = kind;
    }

    let pipeline = InferencePipeline::from_config(&config)?;
    let session = Session::new();

    let bytes = std::fs::read(&cli.image)
        .map_err(|e| PipelineError::InputError(format!("cannot read {}: {}", cli.image.display(), e)))?;
    let image_name = display_name(&cli.image);

    let (response, report) = commands::predict_with_report(&pipeline, &session, &image_name, bytes).await?;

    println!("Image:       {}", response.image_name);
    println!("Prediction:  {} ({})", response.label, response.clinical_name);
    println!("Confidence:  {:.2}%", response.confidence * 100.0);
    println!("Level:       {}", response.confidence_level);
    println!("             {}", response.message);
    for p in &response.probabilities {
        println!("  {:<20} {:>7.2}%", p.label, p.probability * 100.0);
    }

    std::fs::write(&cli.report, &report.bytes).map_err(|e| {
        PipelineError::InternalInferenceError(format!("cannot write report {}: {}", cli.report.display(), e))
    })?;
    println!("Report written to {}", cli.report.display());

    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
