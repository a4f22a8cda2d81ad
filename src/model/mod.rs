//! Ordinary least squares for voxel-wise general linear models.
//!
//! - **[`glm`]**: coefficient estimation by solving the normal equations
//! - **[`tscore`]**: t-statistics for single-coefficient contrasts

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2};

pub mod glm;
pub mod tscore;

pub use glm::{glm, glm_columns};
pub use tscore::{TScoreOptions, beta_to_tscore, beta_to_tscore_with};

/// Gram matrix X'X of a design matrix.
pub(crate) fn gram<S>(x: &ArrayBase<S, Ix2>) -> Array2<f64>
where
    S: Data<Elem = f64>,
{
    x.t().dot(x)
}

pub(crate) fn to_dmatrix<S>(a: &ArrayBase<S, Ix2>) -> DMatrix<f64>
where
    S: Data<Elem = f64>,
{
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub(crate) fn to_dvector<S>(a: &ArrayBase<S, Ix1>) -> DVector<f64>
where
    S: Data<Elem = f64>,
{
    DVector::from_iterator(a.len(), a.iter().copied())
}

pub(crate) fn from_dvector(v: &DVector<f64>) -> Array1<f64> {
    v.iter().copied().collect()
}
