use crate::error::{Error, Result};

const PROB_FLOOR: f64 = 1e-12;

/// Inception Score over per-image class-probability vectors:
/// `exp(mean KL(p(y|x) || p(y)))`. Near 1 means low diversity/confidence;
/// higher means sharper, more diverse predictions.
pub fn inception_score(predictions: &[Vec<f32>]) -> Result<f64> {
    if predictions.is_empty() {
        return Err(Error::InsufficientData(
            "no predictions for the generated set".into(),
        ));
    }
    let num_classes = predictions[0].len();
    if num_classes == 0 || predictions.iter().any(|p| p.len() != num_classes) {
        return Err(Error::Inference(
            "prediction vectors have inconsistent lengths".into(),
        ));
    }

    // Re-normalize each vector to sum to 1 even if the classifier head
    // already outputs a distribution.
    let normalized: Vec<Vec<f64>> = predictions.iter().map(|p| normalize(p)).collect();

    let mut marginal = vec![0.0f64; num_classes];
    for p in &normalized {
        for (m, v) in marginal.iter_mut().zip(p) {
            *m += v;
        }
    }
    for m in &mut marginal {
        *m /= normalized.len() as f64;
    }

    let mean_kl = normalized
        .iter()
        .map(|p| kl_divergence(p, &marginal))
        .sum::<f64>()
        / normalized.len() as f64;
    Ok(mean_kl.exp())
}

fn normalize(p: &[f32]) -> Vec<f64> {
    let sum: f64 = p.iter().map(|&v| v.max(0.0) as f64).sum();
    if sum <= 0.0 {
        return vec![1.0 / p.len() as f64; p.len()];
    }
    p.iter().map(|&v| v.max(0.0) as f64 / sum).collect()
}

fn kl_divergence(p: &[f64], q: &[f64]) -> f64 {
    p.iter()
        .zip(q)
        .filter(|(&pi, _)| pi > 0.0)
        .map(|(&pi, &qi)| pi * (pi / qi.max(PROB_FLOOR)).ln())
        .sum()
}
