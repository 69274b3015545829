use crate::error::{Error, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

fn ensure_environment() -> Result<()> {
    let committed = ort::init()
        .with_name("genmetrics")
        .commit()
        .map_err(|e| Error::Setup(format!("Failed to init ORT environment: {e}")))?;
    if committed {
        if let Ok(env) = ort::environment::get_environment() {
            env.set_log_level(ort::logging::LogLevel::Warning);
        }
    }
    Ok(())
}

/// Builds a CPU inference session for one model. ONNX Runtime can panic
/// while parsing a malformed model, so construction runs under
/// `catch_unwind` and every failure surfaces as a fatal setup error.
pub fn build_session(model_path: &Path) -> Result<Session> {
    if !model_path.exists() {
        return Err(Error::Setup(format!(
            "Model not found: {}",
            model_path.display()
        )));
    }
    ensure_environment()?;

    let build = || -> Result<Session> {
        Session::builder()
            .map_err(|e| Error::Setup(format!("{e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level1)
            .map_err(|e| Error::Setup(format!("{e}")))?
            .with_parallel_execution(false)
            .map_err(|e| Error::Setup(format!("{e}")))?
            .commit_from_file(model_path)
            .map_err(|e| Error::Setup(format!("{e}")))
    };
    match catch_unwind(AssertUnwindSafe(build)) {
        Ok(res) => {
            if res.is_ok() {
                log::info!("Loaded model: {}", model_path.display());
            }
            res
        }
        Err(_) => Err(Error::Setup(format!(
            "ONNX Runtime panicked while loading {}",
            model_path.display()
        ))),
    }
}
