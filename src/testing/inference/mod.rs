use anyhow::Result;
use ndarray::{ArrayBase, ArrayView1, Axis, Data, Ix2};
use rayon::prelude::*;

use crate::testing::correction::{self, CorrectionMethod};
use crate::testing::{Alternative, MultipleTestResults};

pub mod parametric;

/// Significance testing of a t-score matrix (contrasts × voxels), one contrast per row.
pub trait ContrastTests {
    /// Correct a single contrast's t-scores across voxels.
    fn contrast_test(
        &self,
        contrast: usize,
        df: f64,
        alternative: Alternative,
        alpha: f64,
        method: CorrectionMethod,
    ) -> Result<MultipleTestResults>;

    /// Correct every contrast independently.
    fn contrast_tests(
        &self,
        df: f64,
        alternative: Alternative,
        alpha: f64,
        method: CorrectionMethod,
    ) -> Result<Vec<MultipleTestResults>>;
}

impl<S> ContrastTests for ArrayBase<S, Ix2>
where
    S: Data<Elem = f64>,
{
    fn contrast_test(
        &self,
        contrast: usize,
        df: f64,
        alternative: Alternative,
        alpha: f64,
        method: CorrectionMethod,
    ) -> Result<MultipleTestResults> {
        if contrast >= self.nrows() {
            return Err(anyhow::anyhow!(
                "Contrast {} out of range for {} rows of t-scores",
                contrast,
                self.nrows()
            ));
        }
        test_statistics(self.row(contrast), df, alternative, alpha, method)
    }

    fn contrast_tests(
        &self,
        df: f64,
        alternative: Alternative,
        alpha: f64,
        method: CorrectionMethod,
    ) -> Result<Vec<MultipleTestResults>> {
        self.axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| test_statistics(row, df, alternative, alpha, method))
            .collect()
    }
}

fn test_statistics(
    statistics: ArrayView1<'_, f64>,
    df: f64,
    alternative: Alternative,
    alpha: f64,
    method: CorrectionMethod,
) -> Result<MultipleTestResults> {
    let p_values = parametric::t_scores_to_p_values(&statistics, df, alternative)?.to_vec();

    let significant = correction::significance_mask(&p_values, alpha, method)?;

    // Adjusted values need at least one voxel
    let mut result = MultipleTestResults::new(statistics.to_vec(), p_values, significant)
        .with_degrees_of_freedom(df)
        .with_global_metadata("test_type", "t_test")
        .with_global_metadata("correction", method.name());

    if !result.p_values.is_empty() {
        let adjusted = correction::adjusted_p_values(&result.p_values, method)?;
        result = result.with_adjusted_p_values(adjusted);
    }

    Ok(result)
}
