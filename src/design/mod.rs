//! Design matrix construction.
//!
//! - **[`hrf`]**: block-design task regressors convolved with a gamma HRF

use anyhow::{Result, bail};
use ndarray::Array2;

pub mod hrf;

pub use hrf::{AcquisitionMode, HrfConfig, TaskRegressors, hrf_task, hrf_task_with};

/// Stack regressors as the columns of a design matrix.
///
/// With `intercept` set, a constant column of ones is appended after the regressors.
pub fn design_matrix(regressors: &[&[f64]], intercept: bool) -> Result<Array2<f64>> {
    let n = match regressors.first() {
        Some(first) => first.len(),
        None => bail!("At least one regressor is required"),
    };
    if n == 0 {
        bail!("Regressors must not be empty");
    }
    for (i, r) in regressors.iter().enumerate() {
        if r.len() != n {
            bail!(
                "Regressor {} has {} samples, expected {}",
                i,
                r.len(),
                n
            );
        }
    }

    let p = regressors.len() + usize::from(intercept);
    let x = Array2::from_shape_fn((n, p), |(i, j)| {
        if j < regressors.len() {
            regressors[j][i]
        } else {
            1.0
        }
    });
    Ok(x)
}

impl TaskRegressors {
    /// Design matrix with columns task, derivative and, optionally, an intercept.
    pub fn design_matrix(&self, intercept: bool) -> Result<Array2<f64>> {
        design_matrix(&[self.task.as_slice(), self.derivative.as_slice()], intercept)
    }
}
