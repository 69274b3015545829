use crate::error::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Append-only, line-oriented progress stream. Every line is timestamped
/// and flushed immediately so the file can be tailed while a long
/// evaluation is still running.
pub struct ProgressLog {
    file: File,
}

impl ProgressLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn record(&mut self, message: &str) {
        log::info!("{message}");
        let line = format!("[{}] {message}\n", Utc::now().to_rfc3339());
        if let Err(err) = self
            .file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
        {
            log::warn!("Failed to append progress line: {err}");
        }
    }
}
