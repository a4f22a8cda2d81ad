//! Voxel-wise task activation maps.
//!
//! The pipeline takes a 4D time series (x, y, z, time) and a design matrix and returns,
//! for every design-matrix column, a volume of −log10(p) values at voxels accepted by the
//! multiple testing correction and zero everywhere else:
//!
//! 1. negative intensities are clamped to zero
//! 2. each time frame is optionally smoothed with an isotropic Gaussian
//! 3. every voxel's time series is fit by ordinary least squares
//! 4. coefficients become t-scores, t-scores become one-sided p-values (df = n − p)
//! 5. each contrast is corrected across voxels independently

use anyhow::{Context, Result, bail};
use ndarray::{Array3, Array4, ArrayBase, Axis, Data, Ix2, Ix4};
use single_utilities::traits::FloatOpsTS;

use crate::diagnostics::{Diagnostic, DiagnosticSink, LogSink};
use crate::model::tscore::DEFAULT_CONDITION_LIMIT;
use crate::model::{TScoreOptions, beta_to_tscore_with, glm_columns};
use crate::preprocess::{SmoothingConfig, clamp_non_negative, smooth_frames};
use crate::testing::inference::ContrastTests;
use crate::testing::{Alternative, CorrectionMethod, MultipleTestResults};

#[derive(Debug, Clone, Copy)]
pub struct ActivationConfig {
    /// FWHM of the spatial smoothing kernel, 0 disables smoothing
    pub fwhm: f64,
    /// Target error rate of the correction
    pub q: f64,
    pub correction: CorrectionMethod,
    pub alternative: Alternative,
    pub smoothing: SmoothingConfig,
    /// Condition number of X'X above which a diagnostic is reported
    pub condition_limit: f64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        ActivationConfig {
            fwhm: 0.0,
            q: 0.05,
            correction: CorrectionMethod::BenjaminiHochberg,
            alternative: Alternative::Greater,
            smoothing: SmoothingConfig::default(),
            condition_limit: DEFAULT_CONDITION_LIMIT,
        }
    }
}

impl ActivationConfig {
    pub fn with_fwhm(mut self, fwhm: f64) -> Self {
        self.fwhm = fwhm;
        self
    }

    pub fn with_q(mut self, q: f64) -> Self {
        self.q = q;
        self
    }

    pub fn with_correction(mut self, correction: CorrectionMethod) -> Self {
        self.correction = correction;
        self
    }

    pub fn with_alternative(mut self, alternative: Alternative) -> Self {
        self.alternative = alternative;
        self
    }

    pub fn with_smoothing(mut self, smoothing: SmoothingConfig) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_condition_limit(mut self, limit: f64) -> Self {
        self.condition_limit = limit;
        self
    }
}

/// Outputs of an activation analysis, all maps shaped (x, y, z, contrasts).
#[derive(Debug, Clone)]
pub struct ActivationMaps {
    /// −log10(p) at significant voxels, 0 elsewhere
    pub log10p: Array4<f64>,
    pub t_map: Array4<f64>,
    /// Uncorrected p-values, NaN where undefined
    pub p_map: Array4<f64>,
    /// Per-contrast test results over the flattened voxels
    pub contrasts: Vec<MultipleTestResults>,
    pub degrees_of_freedom: f64,
}

impl ActivationMaps {
    pub fn num_contrasts(&self) -> usize {
        self.contrasts.len()
    }

    /// Number of significant voxels per contrast
    pub fn num_significant(&self) -> Vec<usize> {
        self.contrasts.iter().map(|c| c.num_significant()).collect()
    }
}

pub struct ActivationAnalysis<'a> {
    config: ActivationConfig,
    sink: &'a dyn DiagnosticSink,
}

impl ActivationAnalysis<'static> {
    pub fn new(config: ActivationConfig) -> Self {
        ActivationAnalysis {
            config,
            sink: &LogSink,
        }
    }
}

impl<'a> ActivationAnalysis<'a> {
    /// Route numerical diagnostics to `sink` instead of the log.
    pub fn with_sink<'b>(self, sink: &'b dyn DiagnosticSink) -> ActivationAnalysis<'b> {
        ActivationAnalysis {
            config: self.config,
            sink,
        }
    }

    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    /// Run the analysis on a 4D volume (x, y, z, time) with design matrix `x` (time × p).
    pub fn run<T, S1, S2>(
        &self,
        volume: &ArrayBase<S1, Ix4>,
        x: &ArrayBase<S2, Ix2>,
    ) -> Result<ActivationMaps>
    where
        T: FloatOpsTS,
        S1: Data<Elem = T>,
        S2: Data<Elem = f64>,
    {
        let config = &self.config;
        if !(config.q > 0.0 && config.q < 1.0) {
            bail!("FDR rate q must lie in (0, 1), got {}", config.q);
        }

        let (nx, ny, nz, nt) = volume.dim();
        let n_voxels = nx * ny * nz;
        log::info!(
            "Fitting {} voxels x {} time points against {} regressors",
            n_voxels,
            nt,
            x.ncols()
        );

        // Voxel-major flattening below needs row-major memory
        let mut img = volume
            .as_standard_layout()
            .mapv(|v| num_traits::cast::<T, f64>(v).unwrap_or(f64::NAN));
        clamp_non_negative(&mut img);
        smooth_frames(&mut img, config.fwhm, &config.smoothing)?;

        let flat = img
            .into_shape_with_order((n_voxels, nt))
            .context("Failed to flatten the spatial dimensions")?;
        let y = flat.t();

        let beta = glm_columns(x, &y)?;

        let options = TScoreOptions::default().with_condition_limit(config.condition_limit);
        let t_scores = beta_to_tscore_with(x, &y, &beta, &options, self.sink)?;

        let (n, p) = x.dim();
        let df = (n - p) as f64;
        let contrasts =
            t_scores.contrast_tests(df, config.alternative, config.q, config.correction)?;

        let mut log10p = Array4::<f64>::zeros((nx, ny, nz, p));
        let mut t_map = Array4::<f64>::zeros((nx, ny, nz, p));
        let mut p_map = Array4::<f64>::zeros((nx, ny, nz, p));

        for (i, contrast) in contrasts.iter().enumerate() {
            let excluded = contrast.num_excluded();
            if excluded > 0 {
                self.sink.report(&Diagnostic::ExcludedVoxels {
                    contrast: i,
                    count: excluded,
                });
            }
            log::info!(
                "Contrast {}: {} of {} voxels significant",
                i,
                contrast.num_significant(),
                n_voxels
            );

            let log_values: Vec<f64> = contrast
                .p_values
                .iter()
                .zip(contrast.significant.iter())
                .map(|(&pv, &significant)| {
                    if significant {
                        -pv.max(f64::MIN_POSITIVE).log10()
                    } else {
                        0.0
                    }
                })
                .collect();

            assign_contrast(&mut log10p, i, log_values)?;
            assign_contrast(&mut t_map, i, contrast.statistics.clone())?;
            assign_contrast(&mut p_map, i, contrast.p_values.clone())?;
        }

        Ok(ActivationMaps {
            log10p,
            t_map,
            p_map,
            contrasts,
            degrees_of_freedom: df,
        })
    }
}

/// Significance-masked −log10(p) map with default settings.
///
/// # Arguments
///
/// * `volume` - 4D time series (x, y, z, time)
/// * `fwhm` - Smoothing kernel FWHM, 0 disables smoothing
/// * `q` - Target false discovery rate
/// * `x` - Design matrix (time × p)
///
/// # Returns
///
/// A map of shape (x, y, z, p).
pub fn activation_map<T, S1, S2>(
    volume: &ArrayBase<S1, Ix4>,
    fwhm: f64,
    q: f64,
    x: &ArrayBase<S2, Ix2>,
) -> Result<Array4<f64>>
where
    T: FloatOpsTS,
    S1: Data<Elem = T>,
    S2: Data<Elem = f64>,
{
    let config = ActivationConfig::default().with_fwhm(fwhm).with_q(q);
    ActivationAnalysis::new(config)
        .run(volume, x)
        .map(|maps| maps.log10p)
}

fn assign_contrast(map: &mut Array4<f64>, contrast: usize, values: Vec<f64>) -> Result<()> {
    let (nx, ny, nz, _) = map.dim();
    let volume = Array3::from_shape_vec((nx, ny, nz), values)
        .context("Contrast values do not match the volume shape")?;
    map.index_axis_mut(Axis(3), contrast).assign(&volume);
    Ok(())
}
