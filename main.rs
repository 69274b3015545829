mod config;
mod error;
mod extractor;
mod fid;
mod inception;
mod loader;
mod neighbors;
mod onnx;
mod orchestrator;
mod perceptual;
mod progress;
mod report;

use crate::config::EvalConfig;
use crate::error::Result;
use crate::extractor::OnnxFeatureExtractor;
use crate::orchestrator::Orchestrator;
use crate::perceptual::OnnxPerceptualModel;
use crate::progress::ProgressLog;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "genmetrics")]
#[command(about = "Evaluate a generated image set against a real one: FID, Inception Score, and per-class nearest-neighbor perceptual distance")]
struct Cli {
    /// Real images root (class subdirectories, or images directly)
    #[arg(long)]
    real_dir: PathBuf,

    /// Generated images root (must mirror the real root's structure)
    #[arg(long)]
    generated_dir: PathBuf,

    /// Pooled-feature embedding model (ONNX)
    #[arg(long)]
    embedding_model: Option<PathBuf>,

    /// Classification-head model (ONNX)
    #[arg(long)]
    classifier_model: Option<PathBuf>,

    /// Perceptual-similarity model (ONNX)
    #[arg(long)]
    perceptual_model: Option<PathBuf>,

    /// Output report path
    #[arg(long, default_value = "metrics_report.json")]
    report: PathBuf,

    /// Append-only progress log path
    #[arg(long, default_value = "metrics_progress.log")]
    progress_log: PathBuf,
}

impl Cli {
    fn into_config(self) -> (EvalConfig, PathBuf, PathBuf, PathBuf, PathBuf) {
        let mut config = EvalConfig::default();
        if let Some(path) = self.embedding_model {
            config.embedding_model_path = path;
        }
        if let Some(path) = self.classifier_model {
            config.classifier_model_path = path;
        }
        if let Some(path) = self.perceptual_model {
            config.perceptual_model_path = path;
        }
        (
            config,
            self.real_dir,
            self.generated_dir,
            self.report,
            self.progress_log,
        )
    }
}

fn run(cli: Cli) -> Result<()> {
    let (config, real_dir, generated_dir, report_path, progress_path) = cli.into_config();
    let mut progress = ProgressLog::open(&progress_path)?;

    // Model loading is the only fatal phase: without the shared models no
    // stage can run, so the run halts and nothing is written.
    let mut extractor = match OnnxFeatureExtractor::load(&config) {
        Ok(extractor) => extractor,
        Err(err) => {
            progress.record(&format!("fatal: {err}"));
            return Err(err);
        }
    };
    let mut perceptual = match OnnxPerceptualModel::load(&config) {
        Ok(model) => model,
        Err(err) => {
            progress.record(&format!("fatal: {err}"));
            return Err(err);
        }
    };

    let mut orchestrator = Orchestrator::new(&mut extractor, &mut perceptual, &config);
    orchestrator.run(&real_dir, &generated_dir, &report_path, &mut progress)?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
