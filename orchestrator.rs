use crate::config::EvalConfig;
use crate::error::{Error, Result};
use crate::extractor::FeatureExtractor;
use crate::fid;
use crate::inception;
use crate::loader;
use crate::neighbors;
use crate::perceptual::PerceptualModel;
use crate::progress::ProgressLog;
use crate::report::{MetricReport, MetricSlot};
use std::collections::BTreeMap;
use std::path::Path;

/// Runs the four metric stages in sequence against one (real, generated)
/// directory pair. Each stage is isolated: its failure is recorded in the
/// report and the remaining stages still run. The adapters are constructed
/// by the caller and shared across stages, loaded once per run.
pub struct Orchestrator<'a> {
    extractor: &'a mut dyn FeatureExtractor,
    perceptual: &'a mut dyn PerceptualModel,
    config: &'a EvalConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        extractor: &'a mut dyn FeatureExtractor,
        perceptual: &'a mut dyn PerceptualModel,
        config: &'a EvalConfig,
    ) -> Self {
        Self {
            extractor,
            perceptual,
            config,
        }
    }

    /// Executes every stage, writes the report once as the terminal
    /// action, and returns it. Only the final write can fail.
    pub fn run(
        &mut self,
        real_root: &Path,
        generated_root: &Path,
        report_path: &Path,
        progress: &mut ProgressLog,
    ) -> Result<MetricReport> {
        progress.record(&format!(
            "run started: real={} generated={}",
            real_root.display(),
            generated_root.display()
        ));
        let mut report = MetricReport::new(real_root, generated_root);

        progress.record("stage inception_score: started");
        let is = self.stage_inception(generated_root);
        record_outcome(progress, "inception_score", &is);
        report.metrics.inception_score = MetricSlot::from_number(is);

        progress.record("stage fid_overall: started");
        let fid_overall = self.stage_fid_overall(real_root, generated_root);
        record_outcome(progress, "fid_overall", &fid_overall);
        report.metrics.fid_overall = MetricSlot::from_number(fid_overall);

        progress.record("stage fid_per_class: started");
        let fid_classes = self.stage_fid_per_class(real_root, generated_root);
        record_map_outcome(progress, "fid_per_class", fid_classes.as_ref().map(|m| m.len()));
        report.metrics.fid_per_class = MetricSlot::from_per_class(fid_classes);

        progress.record("stage lpips_avg_min_per_class: started");
        let lpips = neighbors::per_class_min_distance(
            self.perceptual,
            real_root,
            generated_root,
            self.config.perceptual_resolution,
        );
        record_map_outcome(
            progress,
            "lpips_avg_min_per_class",
            lpips.as_ref().map(|m| m.len()),
        );
        report.metrics.lpips_avg_min_per_class = MetricSlot::from_per_class_nullable(lpips);

        report.write(report_path)?;
        progress.record(&format!("run finished: report={}", report_path.display()));
        Ok(report)
    }

    fn stage_inception(&mut self, generated_root: &Path) -> Result<f64> {
        let generated = loader::load_pooled(generated_root, self.config.feature_resolution);
        if generated.is_empty() {
            return Err(Error::InsufficientData(
                "generated image set is empty".into(),
            ));
        }
        let predictions = self.extractor.predict(&generated)?;
        inception::inception_score(&predictions)
    }

    fn stage_fid_overall(&mut self, real_root: &Path, generated_root: &Path) -> Result<f64> {
        let real = loader::load_pooled(real_root, self.config.feature_resolution);
        if real.is_empty() {
            return Err(Error::InsufficientData("real image set is empty".into()));
        }
        let generated = loader::load_pooled(generated_root, self.config.feature_resolution);
        if generated.is_empty() {
            return Err(Error::InsufficientData(
                "generated image set is empty".into(),
            ));
        }
        let real_embeddings = self.extractor.embed(&real)?;
        let generated_embeddings = self.extractor.embed(&generated)?;
        fid::frechet_distance(
            &real_embeddings,
            &generated_embeddings,
            self.config.covariance_epsilon,
        )
    }

    fn stage_fid_per_class(
        &mut self,
        real_root: &Path,
        generated_root: &Path,
    ) -> Result<BTreeMap<String, f64>> {
        let mut results = BTreeMap::new();
        for class_name in loader::discover_classes(real_root) {
            let real = loader::load_class(
                &loader::class_dir(real_root, &class_name),
                self.config.feature_resolution,
            );
            let generated = loader::load_class(
                &loader::class_dir(generated_root, &class_name),
                self.config.feature_resolution,
            );
            if real.is_empty() {
                log::warn!("No real images for class '{class_name}'; skipping");
                continue;
            }
            if generated.is_empty() {
                log::warn!("No generated images for class '{class_name}'; skipping");
                continue;
            }
            let real_embeddings = self.extractor.embed(&real)?;
            let generated_embeddings = self.extractor.embed(&generated)?;
            let value = fid::frechet_distance(
                &real_embeddings,
                &generated_embeddings,
                self.config.covariance_epsilon,
            )?;
            log::info!("FID for class '{class_name}': {value:.4}");
            results.insert(class_name, value);
        }
        Ok(results)
    }
}

fn record_outcome(progress: &mut ProgressLog, stage: &str, outcome: &Result<f64>) {
    match outcome {
        Ok(v) => progress.record(&format!("stage {stage}: ok ({v:.4})")),
        Err(e) => progress.record(&format!("stage {stage}: failed: {e}")),
    }
}

fn record_map_outcome(
    progress: &mut ProgressLog,
    stage: &str,
    outcome: std::result::Result<usize, &Error>,
) {
    match outcome {
        Ok(classes) => progress.record(&format!("stage {stage}: ok ({classes} classes)")),
        Err(e) => progress.record(&format!("stage {stage}: failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fid::EmbeddingSet;
    use crate::loader::ImageSet;
    use crate::report::MetricSlot;
    use image::{Rgb, RgbImage};
    use std::fs;
    use std::path::PathBuf;

    /// Embeds each image as its mean channel values and predicts a
    /// distribution proportional to them, so metric stages get plausible
    /// numbers without any model runtime.
    struct FakeExtractor;

    impl FeatureExtractor for FakeExtractor {
        fn embed(&mut self, images: &ImageSet) -> crate::error::Result<EmbeddingSet> {
            let vectors = images
                .images
                .iter()
                .map(|img| {
                    let p = img.get_pixel(0, 0);
                    vec![p[0] as f32, p[1] as f32, p[2] as f32]
                })
                .collect();
            Ok(EmbeddingSet::new(vectors))
        }

        fn predict(&mut self, images: &ImageSet) -> crate::error::Result<Vec<Vec<f32>>> {
            Ok(images
                .images
                .iter()
                .map(|img| {
                    let p = img.get_pixel(0, 0);
                    vec![p[0] as f32 + 1.0, p[1] as f32 + 1.0, p[2] as f32 + 1.0]
                })
                .collect())
        }
    }

    struct FakePerceptual;

    impl PerceptualModel for FakePerceptual {
        fn distances(
            &mut self,
            generated: &RgbImage,
            real: &[RgbImage],
        ) -> crate::error::Result<Vec<f32>> {
            let g = generated.get_pixel(0, 0)[0] as f32;
            Ok(real
                .iter()
                .map(|r| (g - r.get_pixel(0, 0)[0] as f32).abs())
                .collect())
        }
    }

    fn test_config() -> EvalConfig {
        EvalConfig {
            feature_resolution: 8,
            perceptual_resolution: 8,
            ..EvalConfig::default()
        }
    }

    fn workspace(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "genmetrics-orchestrator-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_images(dir: &Path, count: usize, red: u8) {
        fs::create_dir_all(dir).unwrap();
        for i in 0..count {
            let img = RgbImage::from_pixel(8, 8, Rgb([red.wrapping_add(i as u8), 40, 200]));
            img.save(dir.join(format!("img{i}.png"))).unwrap();
        }
    }

    fn run_eval(root: &Path, real: &Path, generated: &Path) -> MetricReport {
        let config = test_config();
        let mut extractor = FakeExtractor;
        let mut perceptual = FakePerceptual;
        let mut progress = ProgressLog::open(&root.join("progress.log")).unwrap();
        let mut orchestrator = Orchestrator::new(&mut extractor, &mut perceptual, &config);
        orchestrator
            .run(real, generated, &root.join("report.json"), &mut progress)
            .unwrap()
    }

    #[test]
    fn class_missing_from_generated_is_skipped_not_fatal() {
        let root = workspace("missing-class");
        let real = root.join("real");
        let generated = root.join("generated");
        write_images(&real.join("A"), 5, 10);
        write_images(&real.join("B"), 3, 120);
        write_images(&generated.join("A"), 2, 15);

        let report = run_eval(&root, &real, &generated);

        match &report.metrics.fid_per_class {
            MetricSlot::PerClass(map) => {
                assert_eq!(map.keys().collect::<Vec<_>>(), vec!["A"]);
            }
            other => panic!("expected per-class map, got {other:?}"),
        }
        match &report.metrics.lpips_avg_min_per_class {
            MetricSlot::PerClassNullable(map) => {
                assert_eq!(map.keys().collect::<Vec<_>>(), vec!["A"]);
                assert!(map["A"].is_some());
            }
            other => panic!("expected per-class map, got {other:?}"),
        }
        assert!(matches!(
            report.metrics.inception_score,
            MetricSlot::Number(_)
        ));
        assert!(matches!(report.metrics.fid_overall, MetricSlot::Number(_)));
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn empty_inputs_produce_error_strings_and_a_report() {
        let root = workspace("empty");
        let real = root.join("real");
        let generated = root.join("generated");
        fs::create_dir_all(&real).unwrap();
        fs::create_dir_all(&generated).unwrap();

        let report = run_eval(&root, &real, &generated);

        assert!(matches!(
            report.metrics.inception_score,
            MetricSlot::Error(_)
        ));
        assert!(matches!(report.metrics.fid_overall, MetricSlot::Error(_)));
        match &report.metrics.fid_per_class {
            MetricSlot::PerClass(map) => assert!(map.is_empty()),
            other => panic!("expected empty per-class map, got {other:?}"),
        }
        match &report.metrics.lpips_avg_min_per_class {
            MetricSlot::PerClassNullable(map) => assert!(map.is_empty()),
            other => panic!("expected empty per-class map, got {other:?}"),
        }
        // The run completed and still persisted a report with both inputs.
        let value: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(root.join("report.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(value["inputs"]["real_path"], real.display().to_string());
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn flat_directories_evaluate_as_a_single_root_class() {
        let root = workspace("flat");
        let real = root.join("real");
        let generated = root.join("generated");
        write_images(&real, 4, 30);
        write_images(&generated, 2, 35);

        let report = run_eval(&root, &real, &generated);

        match &report.metrics.fid_per_class {
            MetricSlot::PerClass(map) => {
                assert_eq!(map.keys().collect::<Vec<_>>(), vec!["root"]);
            }
            other => panic!("expected root class, got {other:?}"),
        }
        match &report.metrics.lpips_avg_min_per_class {
            MetricSlot::PerClassNullable(map) => {
                assert_eq!(map.keys().collect::<Vec<_>>(), vec!["root"]);
            }
            other => panic!("expected root class, got {other:?}"),
        }
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn identical_sets_give_near_zero_fid() {
        let root = workspace("identical");
        let real = root.join("real");
        let generated = root.join("generated");
        write_images(&real, 6, 50);
        write_images(&generated, 6, 50);

        let report = run_eval(&root, &real, &generated);
        match report.metrics.fid_overall {
            MetricSlot::Number(v) => assert!(v.abs() < 1e-6, "fid = {v}"),
            other => panic!("expected number, got {other:?}"),
        }
        fs::remove_dir_all(&root).unwrap();
    }
}
