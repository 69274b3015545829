use crate::config::EvalConfig;
use crate::error::{Error, Result};
use crate::fid::EmbeddingSet;
use crate::loader::ImageSet;
use crate::onnx;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Seam for the external embedding/classification network. The engines
/// only depend on this contract, so tests substitute lightweight fakes.
pub trait FeatureExtractor {
    /// One fixed-length pooled feature vector per image.
    fn embed(&mut self, images: &ImageSet) -> Result<EmbeddingSet>;

    /// One class-probability distribution per image.
    fn predict(&mut self, images: &ImageSet) -> Result<Vec<Vec<f32>>>;
}

/// ONNX-backed extractor holding two sessions loaded once per run: a
/// pooled-feature variant and a classification-head variant of the same
/// backbone, mirroring the two InceptionV3 configurations used upstream.
pub struct OnnxFeatureExtractor {
    embedding_session: Session,
    classifier_session: Session,
    batch_size: usize,
}

impl OnnxFeatureExtractor {
    pub fn load(config: &EvalConfig) -> Result<Self> {
        let embedding_session = onnx::build_session(&config.embedding_model_path)?;
        let classifier_session = onnx::build_session(&config.classifier_model_path)?;
        Ok(Self {
            embedding_session,
            classifier_session,
            batch_size: config.extractor_batch_size.max(1),
        })
    }

    fn run_batched(&mut self, images: &ImageSet, classifier: bool) -> Result<Vec<Vec<f32>>> {
        let mut rows = Vec::with_capacity(images.len());
        let batch_size = self.batch_size;
        for chunk in images.images.chunks(batch_size) {
            let input = pack_batch(chunk);
            let session = if classifier {
                &mut self.classifier_session
            } else {
                &mut self.embedding_session
            };
            let mut batch_rows = run_session(session, &input)?;
            if batch_rows.len() != chunk.len() {
                return Err(Error::Inference(format!(
                    "Model returned {} rows for a batch of {}",
                    batch_rows.len(),
                    chunk.len()
                )));
            }
            rows.append(&mut batch_rows);
        }
        Ok(rows)
    }
}

impl FeatureExtractor for OnnxFeatureExtractor {
    fn embed(&mut self, images: &ImageSet) -> Result<EmbeddingSet> {
        Ok(EmbeddingSet::new(self.run_batched(images, false)?))
    }

    fn predict(&mut self, images: &ImageSet) -> Result<Vec<Vec<f32>>> {
        let rows = self.run_batched(images, true)?;
        Ok(rows.iter().map(|r| softmax(r)).collect())
    }
}

/// Packs a chunk of equally-sized RGB images into an NCHW batch scaled to
/// [-1, 1], the Inception input convention.
fn pack_batch(images: &[RgbImage]) -> Array4<f32> {
    let h = images.first().map(|i| i.height()).unwrap_or(0) as usize;
    let w = images.first().map(|i| i.width()).unwrap_or(0) as usize;
    let mut batch = Array4::<f32>::zeros((images.len(), 3, h, w));
    for (n, img) in images.iter().enumerate() {
        for (x, y, pixel) in img.enumerate_pixels() {
            for c in 0..3 {
                batch[[n, c, y as usize, x as usize]] = pixel[c] as f32 / 127.5 - 1.0;
            }
        }
    }
    batch
}

fn run_session(session: &mut Session, input: &Array4<f32>) -> Result<Vec<Vec<f32>>> {
    let run = || -> Result<Vec<Vec<f32>>> {
        let tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| Error::Inference(format!("{e}")))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| Error::Inference(format!("{e}")))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(format!("{e}")))?;
        split_rows(shape, data)
    };
    match catch_unwind(AssertUnwindSafe(run)) {
        Ok(res) => res,
        Err(_) => Err(Error::Inference("ONNX Runtime panicked during inference".into())),
    }
}

/// Splits a [N, ...] output into N flattened per-image vectors; pooled
/// heads may carry trailing singleton spatial dims.
fn split_rows(shape: &[i64], data: &[f32]) -> Result<Vec<Vec<f32>>> {
    let n = shape.first().copied().unwrap_or(0).max(0) as usize;
    if n == 0 {
        return Err(Error::Inference(format!(
            "Unexpected model output shape {shape:?}"
        )));
    }
    let row_len = data.len() / n;
    if row_len == 0 || data.len() != n * row_len {
        return Err(Error::Inference(format!(
            "Model output of {} values does not divide into {} rows",
            data.len(),
            n
        )));
    }
    Ok(data.chunks_exact(row_len).map(|row| row.to_vec()).collect())
}

pub fn softmax(values: &[f32]) -> Vec<f32> {
    if values.is_empty() {
        return Vec::new();
    }
    let max_val = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mut exps = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for v in values {
        let e = (v - max_val).exp();
        exps.push(e);
        sum += e;
    }
    if sum <= 0.0 {
        return vec![0.0; values.len()];
    }
    exps.iter().map(|e| e / sum).collect()
}
