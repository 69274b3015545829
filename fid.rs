use crate::error::{Error, Result};
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Ordered fixed-length feature vectors, one per image. Never mutated
/// after creation.
pub struct EmbeddingSet {
    vectors: Vec<Vec<f32>>,
}

impl EmbeddingSet {
    pub fn new(vectors: Vec<Vec<f32>>) -> Self {
        Self { vectors }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.vectors.first().map(|v| v.len()).unwrap_or(0)
    }

    /// Images as rows, features as columns, promoted to f64 for the
    /// covariance math.
    fn to_matrix(&self) -> DMatrix<f64> {
        let (n, d) = (self.len(), self.dim());
        DMatrix::from_fn(n, d, |r, c| self.vectors[r][c] as f64)
    }
}

/// Fréchet distance between the Gaussian approximations of two embedding
/// distributions:
/// `||mu_r - mu_g||^2 + tr(S_r + S_g - 2 sqrt(S_r S_g))`.
/// Both covariance matrices get `epsilon * I` added to the diagonal to
/// guard against near-singularity when a set holds fewer images than the
/// embedding has dimensions.
pub fn frechet_distance(
    real: &EmbeddingSet,
    generated: &EmbeddingSet,
    epsilon: f64,
) -> Result<f64> {
    if real.is_empty() {
        return Err(Error::InsufficientData("real embedding set is empty".into()));
    }
    if generated.is_empty() {
        return Err(Error::InsufficientData(
            "generated embedding set is empty".into(),
        ));
    }
    if real.dim() != generated.dim() {
        return Err(Error::Inference(format!(
            "Embedding dimension mismatch: {} vs {}",
            real.dim(),
            generated.dim()
        )));
    }

    let (mu_r, mut sigma_r) = mean_and_covariance(&real.to_matrix());
    let (mu_g, mut sigma_g) = mean_and_covariance(&generated.to_matrix());
    let d = sigma_r.nrows();
    for i in 0..d {
        sigma_r[(i, i)] += epsilon;
        sigma_g[(i, i)] += epsilon;
    }

    let diff = &mu_r - &mu_g;
    let fid = diff.norm_squared() + sigma_r.trace() + sigma_g.trace()
        - 2.0 * trace_sqrt_product(&sigma_r, &sigma_g);
    Ok(fid)
}

/// Sample mean and sample covariance (features as columns). The divisor
/// is clamped at one so a single-image set degrades to a zero matrix
/// instead of NaN.
fn mean_and_covariance(data: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let n = data.nrows();
    let d = data.ncols();
    let mean = DVector::from_fn(d, |c, _| data.column(c).sum() / n as f64);
    let mean_row = mean.transpose();
    let mut centered = data.clone();
    for mut row in centered.row_iter_mut() {
        row -= &mean_row;
    }
    let cov = centered.transpose() * &centered / (n - 1).max(1) as f64;
    (mean, cov)
}

fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Principal square root of a symmetric PSD matrix via eigendecomposition,
/// with negative floating-point noise on the eigenvalues clamped to zero.
fn sqrt_psd(m: &DMatrix<f64>) -> DMatrix<f64> {
    let eig = SymmetricEigen::new(symmetrize(m));
    let sqrt_vals = eig.eigenvalues.map(|v| v.max(0.0).sqrt());
    &eig.eigenvectors * DMatrix::from_diagonal(&sqrt_vals) * eig.eigenvectors.transpose()
}

/// `tr sqrt(A B)` for symmetric PSD `A`, `B`. The product `A B` is similar
/// to the symmetric matrix `sqrt(A) B sqrt(A)`, so its square root's trace
/// is the sum of the square roots of that matrix's eigenvalues. True
/// negatives cannot occur; residual imaginary/negative noise is discarded
/// by the clamp, which is the real-part behavior of the reference formula.
fn trace_sqrt_product(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    let a_sqrt = sqrt_psd(a);
    let m = symmetrize(&(&a_sqrt * b * &a_sqrt));
    let eig = SymmetricEigen::new(m);
    eig.eigenvalues.iter().map(|v| v.max(0.0).sqrt()).sum()
}
