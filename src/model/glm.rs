use anyhow::{Result, anyhow, bail};
use nalgebra::{Dyn, LU};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2, Zip};

use crate::model::{from_dvector, gram, to_dmatrix, to_dvector};

/// Solve the general linear model Y = Xβ for a single response vector.
///
/// The estimate satisfies the normal equations X'Xβ = X'Y and is obtained from an LU
/// factorization of X'X rather than an explicit inverse.
///
/// # Arguments
///
/// * `x` - Design matrix (n × p), assumed to have full column rank
/// * `y` - Response vector (n)
///
/// # Returns
///
/// The coefficient vector β (p). Fails if the row counts differ or X'X is singular.
pub fn glm<S1, S2>(x: &ArrayBase<S1, Ix2>, y: &ArrayBase<S2, Ix1>) -> Result<Array1<f64>>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
{
    check_rows(x.nrows(), y.len())?;

    let lu = factorize(x)?;
    let rhs = to_dvector(&x.t().dot(y));
    let beta = lu
        .solve(&rhs)
        .ok_or_else(|| anyhow!("X'X is singular, the design matrix must have full column rank"))?;

    Ok(from_dvector(&beta))
}

/// Solve the general linear model for every column of `y` at once.
///
/// X'X is factorized a single time; the columns (voxels) share no state and are solved
/// in parallel. Returns β with shape (p × m) for an (n × m) observation matrix.
pub fn glm_columns<S1, S2>(x: &ArrayBase<S1, Ix2>, y: &ArrayBase<S2, Ix2>) -> Result<Array2<f64>>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
{
    check_rows(x.nrows(), y.nrows())?;

    let lu = factorize(x)?;
    let rhs = x.t().dot(y);
    let mut beta = Array2::<f64>::zeros(rhs.raw_dim());

    Zip::from(beta.columns_mut())
        .and(rhs.columns())
        .par_for_each(|mut b, r| {
            let mut col = to_dvector(&r);
            if lu.solve_mut(&mut col) {
                b.assign(&from_dvector(&col));
            } else {
                b.fill(f64::NAN);
            }
        });

    Ok(beta)
}

fn check_rows(x_rows: usize, y_rows: usize) -> Result<()> {
    if x_rows != y_rows {
        bail!(
            "The number of rows in X ({}) and Y ({}) must be the same",
            x_rows,
            y_rows
        );
    }
    Ok(())
}

fn factorize<S>(x: &ArrayBase<S, Ix2>) -> Result<LU<f64, Dyn, Dyn>>
where
    S: Data<Elem = f64>,
{
    if x.ncols() == 0 {
        bail!("Design matrix has no columns");
    }
    let lu = to_dmatrix(&gram(x)).lu();
    if !lu.is_invertible() {
        bail!("X'X is singular, the design matrix must have full column rank");
    }
    Ok(lu)
}
