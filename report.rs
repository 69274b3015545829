use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// One metric's slot in the report: a number, a per-class mapping, or the
/// error string a failed stage left behind.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetricSlot {
    Number(f64),
    PerClass(BTreeMap<String, f64>),
    PerClassNullable(BTreeMap<String, Option<f64>>),
    Error(String),
}

impl MetricSlot {
    pub fn from_number(res: Result<f64>) -> Self {
        match res {
            Ok(v) => MetricSlot::Number(v),
            Err(e) => MetricSlot::Error(e.to_string()),
        }
    }

    pub fn from_per_class(res: Result<BTreeMap<String, f64>>) -> Self {
        match res {
            Ok(map) => MetricSlot::PerClass(map),
            Err(e) => MetricSlot::Error(e.to_string()),
        }
    }

    pub fn from_per_class_nullable(res: Result<BTreeMap<String, Option<f64>>>) -> Self {
        match res {
            Ok(map) => MetricSlot::PerClassNullable(map),
            Err(e) => MetricSlot::Error(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportInputs {
    pub real_path: String,
    pub generated_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetrics {
    pub inception_score: MetricSlot,
    pub fid_overall: MetricSlot,
    pub fid_per_class: MetricSlot,
    pub lpips_avg_min_per_class: MetricSlot,
}

/// The run's final output. Mutated incrementally as stages complete and
/// serialized exactly once at the end of the run.
#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub inputs: ReportInputs,
    pub metrics: ReportMetrics,
}

impl MetricReport {
    pub fn new(real_path: &Path, generated_path: &Path) -> Self {
        let placeholder = || MetricSlot::Error("stage did not run".into());
        Self {
            inputs: ReportInputs {
                real_path: real_path.display().to_string(),
                generated_path: generated_path.display().to_string(),
            },
            metrics: ReportMetrics {
                inception_score: placeholder(),
                fid_overall: placeholder(),
                fid_per_class: placeholder(),
                lpips_avg_min_per_class: placeholder(),
            },
        }
    }

    /// Full-or-nothing persistence: the document lands in a temporary
    /// sibling first and is renamed into place.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        log::info!("Report written to {}", path.display());
        Ok(())
    }
}
