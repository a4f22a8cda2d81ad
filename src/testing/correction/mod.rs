use anyhow::{Result, anyhow, bail};
use ndarray::{Array, ArrayBase, Data, Dimension};

/// Multiple testing correction across voxels.
///
/// NaN p-values mark voxels that were removed from the analysis (outside the brain mask,
/// no signal). They never count towards the number of tests and are never significant,
/// but every output keeps the length and order of the input so results can be laid back
/// onto the volume.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionMethod {
    /// Benjamini-Hochberg step-up procedure (FDR)
    #[default]
    BenjaminiHochberg,
    /// Benjamini-Yekutieli procedure (FDR under arbitrary dependence)
    BenjaminiYekutieli,
    /// Bonferroni (family-wise error rate)
    Bonferroni,
}

impl CorrectionMethod {
    pub fn name(&self) -> &'static str {
        match self {
            CorrectionMethod::BenjaminiHochberg => "benjamini_hochberg",
            CorrectionMethod::BenjaminiYekutieli => "benjamini_yekutieli",
            CorrectionMethod::Bonferroni => "bonferroni",
        }
    }
}

fn validate_rate(alpha: f64) -> Result<()> {
    if !(alpha > 0.0 && alpha < 1.0) {
        bail!("Error rate must lie in (0, 1), got {}", alpha);
    }
    Ok(())
}

fn validate_p_values(p_values: &[f64]) -> Result<()> {
    for (i, &p) in p_values.iter().enumerate() {
        if !p.is_nan() && !(0.0..=1.0).contains(&p) {
            return Err(anyhow!("Invalid p-value at index {}: {}", i, p));
        }
    }
    Ok(())
}

/// Defined p-values with their original index, ascending.
fn ranked(p_values: &[f64]) -> Vec<(usize, f64)> {
    let mut indexed: Vec<(usize, f64)> = p_values
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .map(|(i, &p)| (i, p))
        .collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));
    indexed
}

/// Benjamini-Hochberg significance mask.
///
/// With m defined p-values sorted ascending, finds the largest rank k such that
/// p_(k) <= k·alpha/m and accepts every entry with p <= p_(k). When no rank qualifies,
/// nothing is accepted.
///
/// # Arguments
/// * `p_values` - p-values, NaN for excluded entries
/// * `alpha` - Target false discovery rate, in (0, 1)
///
/// # Returns
/// * `Result<Vec<bool>>` - Mask with the same length as `p_values`; NaN entries are false
///
/// # Example
/// ```
/// use activation_statistics::testing::correction::benjamini_hochberg_mask;
///
/// let p_values = vec![0.01, 0.02, 0.03, 0.04, 0.50];
/// let mask = benjamini_hochberg_mask(&p_values, 0.05).unwrap();
/// assert_eq!(mask, vec![true, true, true, true, false]);
/// ```
pub fn benjamini_hochberg_mask(p_values: &[f64], alpha: f64) -> Result<Vec<bool>> {
    validate_rate(alpha)?;
    validate_p_values(p_values)?;

    let ranked = ranked(p_values);
    let m = ranked.len() as f64;

    let critical = ranked
        .iter()
        .enumerate()
        .rev()
        .find(|&(k, &(_, p))| p <= (k + 1) as f64 * alpha / m)
        .map(|(_, &(_, p))| p);

    let mask = match critical {
        Some(p_crit) => p_values
            .iter()
            .map(|&p| !p.is_nan() && p <= p_crit)
            .collect(),
        None => vec![false; p_values.len()],
    };

    Ok(mask)
}

/// [`benjamini_hochberg_mask`] for arrays of any dimension; the mask has the input's shape.
pub fn benjamini_hochberg_mask_nd<S, D>(
    p_values: &ArrayBase<S, D>,
    alpha: f64,
) -> Result<Array<bool, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let flat: Vec<f64> = p_values.iter().copied().collect();
    let mask = benjamini_hochberg_mask(&flat, alpha)?;
    Array::from_shape_vec(p_values.raw_dim(), mask)
        .map_err(|e| anyhow!("Failed to restore mask shape: {}", e))
}

/// Significance mask for any supported correction method.
///
/// The step-up mask is used for Benjamini-Hochberg; the other methods accept entries
/// whose adjusted p-value is at most `alpha`.
pub fn significance_mask(
    p_values: &[f64],
    alpha: f64,
    method: CorrectionMethod,
) -> Result<Vec<bool>> {
    match method {
        CorrectionMethod::BenjaminiHochberg => benjamini_hochberg_mask(p_values, alpha),
        CorrectionMethod::BenjaminiYekutieli | CorrectionMethod::Bonferroni => {
            validate_rate(alpha)?;
            if p_values.is_empty() {
                return Ok(Vec::new());
            }
            let adjusted = adjusted_p_values(p_values, method)?;
            Ok(adjusted.iter().map(|&q| !q.is_nan() && q <= alpha).collect())
        }
    }
}

/// Adjusted p-values for the given method.
pub fn adjusted_p_values(p_values: &[f64], method: CorrectionMethod) -> Result<Vec<f64>> {
    match method {
        CorrectionMethod::BenjaminiHochberg => benjamini_hochberg_correction(p_values),
        CorrectionMethod::BenjaminiYekutieli => benjamini_yekutieli_correction(p_values),
        CorrectionMethod::Bonferroni => bonferroni_correction(p_values),
    }
}

/// Apply Bonferroni correction to p-values
///
/// Each defined p-value is multiplied by the number of defined p-values and capped at 1.
/// NaN entries stay NaN.
pub fn bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    if p_values.is_empty() {
        return Err(anyhow!("Empty p-value array"));
    }
    validate_p_values(p_values)?;

    let m = p_values.iter().filter(|p| !p.is_nan()).count() as f64;
    let adjusted = p_values
        .iter()
        .map(|&p| if p.is_nan() { p } else { (p * m).min(1.0) })
        .collect();

    Ok(adjusted)
}

/// Apply Benjamini-Hochberg (BH) procedure for controlling false discovery rate
///
/// Returns adjusted p-values (q-values); an entry is accepted by
/// [`benjamini_hochberg_mask`] exactly when its adjusted value is at most `alpha`.
/// NaN entries stay NaN and are not counted.
///
/// # Example
/// ```
/// use activation_statistics::testing::correction::benjamini_hochberg_correction;
///
/// let adjusted = benjamini_hochberg_correction(&[0.01, f64::NAN, 0.04]).unwrap();
/// assert!((adjusted[0] - 0.02).abs() < 1e-12);
/// assert!(adjusted[1].is_nan());
/// ```
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    if p_values.is_empty() {
        return Err(anyhow!("Empty p-value array"));
    }
    validate_p_values(p_values)?;

    Ok(step_up_adjust(p_values, 1.0))
}

/// Apply Benjamini-Yekutieli (BY) procedure for controlling false discovery rate under dependence
///
/// Neighbouring voxels are correlated, especially after smoothing; BY stays valid under
/// arbitrary dependence at the price of power.
pub fn benjamini_yekutieli_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    if p_values.is_empty() {
        return Err(anyhow!("Empty p-value array"));
    }
    validate_p_values(p_values)?;

    let m = p_values.iter().filter(|p| !p.is_nan()).count();
    let c_m: f64 = (1..=m).map(|i| 1.0 / i as f64).sum();

    Ok(step_up_adjust(p_values, c_m))
}

fn step_up_adjust(p_values: &[f64], factor: f64) -> Vec<f64> {
    let ranked = ranked(p_values);
    let m = ranked.len() as f64;

    let mut adjusted = vec![f64::NAN; p_values.len()];
    let mut current_min = 1.0_f64;

    // Process from largest to smallest p-value
    for (i, &(orig_idx, p)) in ranked.iter().enumerate().rev() {
        let rank = (i + 1) as f64;
        let adjustment = (p * factor * m / rank).min(1.0);
        current_min = adjustment.min(current_min);
        adjusted[orig_idx] = current_min;
    }

    adjusted
}
