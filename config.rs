use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    pub embedding_model_path: PathBuf,
    pub classifier_model_path: PathBuf,
    pub perceptual_model_path: PathBuf,
    pub feature_resolution: u32,
    pub perceptual_resolution: u32,
    #[serde(default = "default_covariance_epsilon")]
    pub covariance_epsilon: f64,
    #[serde(default = "default_extractor_batch_size")]
    pub extractor_batch_size: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            embedding_model_path: PathBuf::from("inception_v3_pool.onnx"),
            classifier_model_path: PathBuf::from("inception_v3_logits.onnx"),
            perceptual_model_path: PathBuf::from("lpips_alex.onnx"),
            feature_resolution: 299,
            perceptual_resolution: 256,
            covariance_epsilon: default_covariance_epsilon(),
            extractor_batch_size: default_extractor_batch_size(),
        }
    }
}

fn default_covariance_epsilon() -> f64 {
    1e-6
}

fn default_extractor_batch_size() -> usize {
    16
}
