//! Student t reference distribution for voxel-wise t-scores.
//!
//! The t-scores produced by [`crate::model::beta_to_tscore`] are compared against a
//! Student t distribution with the residual degrees of freedom of the model.

use anyhow::{Result, anyhow};
use ndarray::{Array, ArrayBase, Data, Dimension};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::testing::Alternative;

fn students_t(df: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, df)
        .map_err(|e| anyhow!("Invalid degrees of freedom {} for t-distribution: {}", df, e))
}

#[inline]
fn tail_probability(dist: &StudentsT, t: f64, alternative: Alternative) -> f64 {
    // Undefined statistics stay undefined so they drop out of the correction
    if t.is_nan() {
        return f64::NAN;
    }

    match alternative {
        Alternative::Greater => {
            if t == f64::INFINITY {
                0.0
            } else if t == f64::NEG_INFINITY {
                1.0
            } else {
                dist.sf(t)
            }
        }
        Alternative::Less => {
            if t == f64::NEG_INFINITY {
                0.0
            } else if t == f64::INFINITY {
                1.0
            } else {
                dist.cdf(t)
            }
        }
        Alternative::TwoSided => {
            if t.is_infinite() {
                0.0
            } else {
                (2.0 * dist.sf(t.abs())).min(1.0)
            }
        }
    }
}

/// p-value of a single t-score.
///
/// # Arguments
///
/// * `t` - The t-score
/// * `df` - Degrees of freedom, must be positive
/// * `alternative` - Which tail(s) count as evidence against the null
pub fn t_to_p_value(t: f64, df: f64, alternative: Alternative) -> Result<f64> {
    let dist = students_t(df)?;
    Ok(tail_probability(&dist, t, alternative))
}

/// p-values for an array of t-scores, same shape as the input.
///
/// NaN t-scores map to NaN p-values; ±inf map to 0 or 1 depending on the tail.
pub fn t_scores_to_p_values<S, D>(
    t_scores: &ArrayBase<S, D>,
    df: f64,
    alternative: Alternative,
) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let dist = students_t(df)?;
    let mut p_values = t_scores.to_owned();
    p_values.par_mapv_inplace(|t| tail_probability(&dist, t, alternative));
    Ok(p_values)
}
