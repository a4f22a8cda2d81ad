use anyhow::{Result, anyhow, bail};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};

use crate::diagnostics::{Diagnostic, DiagnosticSink, LogSink};
use crate::model::{gram, to_dmatrix};

/// Condition number of X'X above which a diagnostic is reported.
pub const DEFAULT_CONDITION_LIMIT: f64 = 1e15;

/// Settings of the t-score conversion.
#[derive(Debug, Clone, Copy)]
pub struct TScoreOptions {
    /// Condition number of X'X above which `Diagnostic::IllConditioned` is reported
    pub condition_limit: f64,
}

impl Default for TScoreOptions {
    fn default() -> Self {
        TScoreOptions {
            condition_limit: DEFAULT_CONDITION_LIMIT,
        }
    }
}

impl TScoreOptions {
    pub fn with_condition_limit(mut self, limit: f64) -> Self {
        self.condition_limit = limit;
        self
    }
}

/// Convert least-squares coefficients to t-scores.
///
/// Each coefficient is tested on its own, i.e. the contrast vector is the matching
/// standard basis vector. Ill-conditioning of X'X is reported through `log` and does
/// not stop the computation.
///
/// # Arguments
///
/// * `x` - Design matrix (n × p)
/// * `y` - Observations (n × m)
/// * `beta` - Coefficients (p × m), typically from [`crate::model::glm_columns`]
///
/// # Returns
///
/// t-scores with the same shape as `beta`. Columns with zero residual variance yield
/// ±inf (nonzero coefficient) or NaN (zero coefficient).
pub fn beta_to_tscore<S1, S2, S3>(
    x: &ArrayBase<S1, Ix2>,
    y: &ArrayBase<S2, Ix2>,
    beta: &ArrayBase<S3, Ix2>,
) -> Result<Array2<f64>>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    S3: Data<Elem = f64>,
{
    beta_to_tscore_with(x, y, beta, &TScoreOptions::default(), &LogSink)
}

/// [`beta_to_tscore`] with an explicit conditioning limit and diagnostic sink.
pub fn beta_to_tscore_with<S1, S2, S3>(
    x: &ArrayBase<S1, Ix2>,
    y: &ArrayBase<S2, Ix2>,
    beta: &ArrayBase<S3, Ix2>,
    options: &TScoreOptions,
    sink: &dyn DiagnosticSink,
) -> Result<Array2<f64>>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    S3: Data<Elem = f64>,
{
    let (n, p) = x.dim();
    let m = y.ncols();

    if y.nrows() != n {
        bail!(
            "The number of rows in X ({}) and Y ({}) must be the same",
            n,
            y.nrows()
        );
    }
    if beta.dim() != (p, m) {
        bail!(
            "beta has shape {:?}, expected ({}, {}) for the given X and Y",
            beta.dim(),
            p,
            m
        );
    }
    if n <= p {
        bail!(
            "Residual degrees of freedom must be positive (n = {}, p = {})",
            n,
            p
        );
    }

    let residuals = y.to_owned() - x.dot(beta);
    let residual_variance: Array1<f64> =
        residuals.mapv(|r| r * r).sum_axis(Axis(0)) / (n - p) as f64;

    let xtx = to_dmatrix(&gram(x));

    let condition_number = condition_number(&xtx);
    if condition_number > options.condition_limit {
        sink.report(&Diagnostic::IllConditioned {
            condition_number,
            limit: options.condition_limit,
        });
    }

    let inv_xtx = xtx
        .try_inverse()
        .ok_or_else(|| anyhow!("X'X is singular, the design matrix must have full column rank"))?;
    let diag: Vec<f64> = inv_xtx.diagonal().iter().copied().collect();

    let t_scores = Array2::from_shape_fn((p, m), |(i, j)| {
        let se = (diag[i] * residual_variance[j]).sqrt();
        beta[[i, j]] / se
    });

    Ok(t_scores)
}

/// Ratio of the largest to the smallest singular value.
fn condition_number(m: &DMatrix<f64>) -> f64 {
    let sv = m.singular_values();
    let smallest = sv.min();
    if smallest <= 0.0 {
        f64::INFINITY
    } else {
        sv.max() / smallest
    }
}
