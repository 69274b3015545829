use crate::config::EvalConfig;
use crate::error::{Error, Result};
use crate::onnx;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Seam for the external perceptual-similarity network: one generated
/// image against a batch of real images, one non-negative distance per
/// pair, lower meaning more similar.
pub trait PerceptualModel {
    fn distances(&mut self, generated: &RgbImage, real: &[RgbImage]) -> Result<Vec<f32>>;
}

/// ONNX-backed LPIPS-style model with two image inputs. The generated
/// image is tiled to the real batch size so the whole comparison runs in
/// a single call.
pub struct OnnxPerceptualModel {
    session: Session,
}

impl OnnxPerceptualModel {
    pub fn load(config: &EvalConfig) -> Result<Self> {
        let session = onnx::build_session(&config.perceptual_model_path)?;
        Ok(Self { session })
    }
}

impl PerceptualModel for OnnxPerceptualModel {
    fn distances(&mut self, generated: &RgbImage, real: &[RgbImage]) -> Result<Vec<f32>> {
        if real.is_empty() {
            return Ok(Vec::new());
        }
        let lhs = tile_image(generated, real.len());
        let rhs = stack_images(real);
        let session = &mut self.session;
        let run = || -> Result<Vec<f32>> {
            let lhs_tensor = TensorRef::from_array_view(lhs.view())
                .map_err(|e| Error::Inference(format!("{e}")))?;
            let rhs_tensor = TensorRef::from_array_view(rhs.view())
                .map_err(|e| Error::Inference(format!("{e}")))?;
            let outputs = session
                .run(ort::inputs![lhs_tensor, rhs_tensor])
                .map_err(|e| Error::Inference(format!("{e}")))?;
            let (_, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::Inference(format!("{e}")))?;
            Ok(data.to_vec())
        };
        let scores = match catch_unwind(AssertUnwindSafe(run)) {
            Ok(res) => res?,
            Err(_) => {
                return Err(Error::Inference(
                    "ONNX Runtime panicked during perceptual inference".into(),
                ))
            }
        };
        if scores.len() != real.len() {
            return Err(Error::Inference(format!(
                "Perceptual model returned {} distances for a batch of {}",
                scores.len(),
                real.len()
            )));
        }
        Ok(scores)
    }
}

fn fill_plane(batch: &mut Array4<f32>, n: usize, img: &RgbImage) {
    for (x, y, pixel) in img.enumerate_pixels() {
        for c in 0..3 {
            batch[[n, c, y as usize, x as usize]] = pixel[c] as f32 / 127.5 - 1.0;
        }
    }
}

fn tile_image(img: &RgbImage, count: usize) -> Array4<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut batch = Array4::<f32>::zeros((count, 3, h, w));
    for n in 0..count {
        fill_plane(&mut batch, n, img);
    }
    batch
}

fn stack_images(images: &[RgbImage]) -> Array4<f32> {
    let h = images.first().map(|i| i.height()).unwrap_or(0) as usize;
    let w = images.first().map(|i| i.width()).unwrap_or(0) as usize;
    let mut batch = Array4::<f32>::zeros((images.len(), 3, h, w));
    for (n, img) in images.iter().enumerate() {
        fill_plane(&mut batch, n, img);
    }
    batch
}
