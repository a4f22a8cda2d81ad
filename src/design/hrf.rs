//! Hemodynamic Response Function task regressors.
//!
//! A block design (stimulus alternately off and on for `on_time` seconds) is convolved
//! with a gamma-shaped HRF on a fine time grid, delayed, and sampled once per
//! repetition time. The first difference of the sampled waveform is returned as a
//! second regressor to absorb small timing errors.

use anyhow::{Result, bail};
use rayon::prelude::*;
use statrs::function::gamma::gamma;

/// Constants of the HRF model.
#[derive(Debug, Clone, Copy)]
pub struct HrfConfig {
    /// Step of the fine time grid (seconds)
    pub dt: f64,
    /// Gamma shape parameter
    pub gamma_shape: f64,
    /// Gamma scale parameter (seconds)
    pub gamma_scale: f64,
    /// Kernel values below this fraction of the peak are dropped from the tail
    pub kernel_cutoff: f64,
}

impl Default for HrfConfig {
    fn default() -> Self {
        HrfConfig {
            dt: 0.01,
            gamma_shape: 6.0,
            gamma_scale: 1.0,
            kernel_cutoff: 1e-12,
        }
    }
}

impl HrfConfig {
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_gamma(mut self, shape: f64, scale: f64) -> Self {
        self.gamma_shape = shape;
        self.gamma_scale = scale;
        self
    }

    pub fn with_kernel_cutoff(mut self, cutoff: f64) -> Self {
        self.kernel_cutoff = cutoff;
        self
    }

    /// Gamma density evaluated at `t` seconds.
    pub fn evaluate(&self, t: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        let a = self.gamma_shape;
        let b = self.gamma_scale;
        t.powf(a - 1.0) * (-t / b).exp() / (b.powf(a) * gamma(a))
    }
}

/// Control/tag ordering of arterial spin labelling acquisitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionMode {
    /// No alternation
    #[default]
    Standard,
    /// Control first: +1, -1, +1, ...
    ControlFirst,
    /// Tag first: -1, +1, -1, ...
    TagFirst,
}

impl AcquisitionMode {
    /// Sign applied to acquisition `index`.
    pub fn sign(&self, index: usize) -> f64 {
        let even = index % 2 == 0;
        match self {
            AcquisitionMode::Standard => 1.0,
            AcquisitionMode::ControlFirst => {
                if even { 1.0 } else { -1.0 }
            }
            AcquisitionMode::TagFirst => {
                if even { -1.0 } else { 1.0 }
            }
        }
    }
}

/// Expected task response sampled at the acquisition times.
#[derive(Debug, Clone)]
pub struct TaskRegressors {
    /// Acquisition times (seconds), for plotting against
    pub sample_times: Vec<f64>,
    /// Task waveform, unit peak magnitude before control/tag modulation
    pub task: Vec<f64>,
    /// First difference of the task waveform, unit peak magnitude
    pub derivative: Vec<f64>,
}

impl TaskRegressors {
    pub fn len(&self) -> usize {
        self.task.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task.is_empty()
    }
}

/// Task and derivative regressors with the default [`HrfConfig`].
///
/// # Arguments
///
/// * `on_time` - Seconds the stimulus is on (and off) per half cycle
/// * `n_timepoints` - Number of acquisitions
/// * `repetition_time` - Seconds between acquisitions
/// * `delay` - Additional hemodynamic delay in seconds
/// * `mode` - Control/tag alternation to build into the regressors
pub fn hrf_task(
    on_time: f64,
    n_timepoints: usize,
    repetition_time: f64,
    delay: f64,
    mode: AcquisitionMode,
) -> Result<TaskRegressors> {
    hrf_task_with(
        &HrfConfig::default(),
        on_time,
        n_timepoints,
        repetition_time,
        delay,
        mode,
    )
}

/// [`hrf_task`] with explicit model constants.
pub fn hrf_task_with(
    config: &HrfConfig,
    on_time: f64,
    n_timepoints: usize,
    repetition_time: f64,
    delay: f64,
    mode: AcquisitionMode,
) -> Result<TaskRegressors> {
    if !(on_time > 0.0) {
        bail!("Stimulus on-time must be positive, got {}", on_time);
    }
    if n_timepoints == 0 {
        bail!("Number of time points must be positive");
    }
    if !(repetition_time > 0.0) {
        bail!("Repetition time must be positive, got {}", repetition_time);
    }
    if !(delay >= 0.0) {
        bail!("HRF delay must be non-negative, got {}", delay);
    }
    if !(config.dt > 0.0
        && config.gamma_shape > 0.0
        && config.gamma_scale > 0.0
        && (0.0..1.0).contains(&config.kernel_cutoff))
    {
        bail!("Invalid HRF configuration: {:?}", config);
    }

    let dt = config.dt;
    let duration = repetition_time * n_timepoints as f64;
    let n_fine = (duration / dt).round() as usize + 1;
    if n_fine < 2 {
        bail!(
            "Scan duration {} s is shorter than the HRF time step {} s",
            duration,
            dt
        );
    }
    let fine_times: Vec<f64> = (0..n_fine).map(|i| i as f64 * dt).collect();

    let kernel = {
        let raw: Vec<f64> = fine_times.iter().map(|&t| config.evaluate(t)).collect();
        let peak = raw.iter().copied().fold(0.0_f64, f64::max);
        if !(peak > 0.0) {
            bail!("HRF kernel vanishes on a {} s grid", duration);
        }
        let mut kernel: Vec<f64> = raw.into_iter().map(|h| h / peak).collect();
        truncate_tail(&mut kernel, config.kernel_cutoff);
        kernel
    };

    // Off for the first half cycle, on for the second
    let period = 2.0 * on_time;
    let boxcar: Vec<f64> = fine_times
        .iter()
        .map(|&t| if t % period > on_time { 1.0 } else { 0.0 })
        .collect();

    let response = causal_convolution(&boxcar, &kernel);

    let shift = (delay / dt).round() as usize;
    let delayed: Vec<f64> = (0..n_fine)
        .map(|i| if i >= shift { response[i - shift] } else { 0.0 })
        .collect();

    let sample_times: Vec<f64> = (0..n_timepoints)
        .map(|k| (k + 1) as f64 * repetition_time + repetition_time / 2.0)
        .collect();

    let mut task: Vec<f64> = sample_times
        .iter()
        .map(|&t| interpolate_uniform(&delayed, dt, t))
        .collect();
    if !normalize_peak(&mut task) {
        bail!(
            "Task waveform is identically zero; the stimulus never turns on within {} s",
            duration
        );
    }

    let mut derivative: Vec<f64> = task.windows(2).map(|w| w[1] - w[0]).collect();
    derivative.push(0.0);
    normalize_peak(&mut derivative);

    if mode != AcquisitionMode::Standard {
        for (i, (t, d)) in task.iter_mut().zip(derivative.iter_mut()).enumerate() {
            let sign = mode.sign(i);
            *t *= sign;
            *d *= sign;
        }
    }

    log::debug!(
        "Built {} task regressor samples ({} fine samples, delay shift {})",
        n_timepoints,
        n_fine,
        shift
    );

    Ok(TaskRegressors {
        sample_times,
        task,
        derivative,
    })
}

/// Full convolution of `signal` with `kernel`, truncated to the length of `signal`.
fn causal_convolution(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    (0..signal.len())
        .into_par_iter()
        .map(|i| {
            let start = (i + 1).saturating_sub(kernel.len());
            signal[start..=i]
                .iter()
                .zip(kernel[..=i - start].iter().rev())
                .map(|(s, k)| s * k)
                .sum()
        })
        .collect()
}

/// Drop the trailing samples of a unit-peak kernel that do not exceed `cutoff`.
fn truncate_tail(kernel: &mut Vec<f64>, cutoff: f64) {
    let len = kernel
        .iter()
        .rposition(|&h| h > cutoff)
        .map_or(0, |i| i + 1);
    kernel.truncate(len);
}

/// Linear interpolation of samples taken every `dt` from 0, extrapolating linearly
/// beyond either end.
fn interpolate_uniform(values: &[f64], dt: f64, t: f64) -> f64 {
    let last = values.len() - 2;
    let pos = t / dt;
    let i = if pos <= 0.0 {
        0
    } else {
        (pos.floor() as usize).min(last)
    };
    let frac = pos - i as f64;
    values[i] + frac * (values[i + 1] - values[i])
}

/// Scale to unit peak magnitude; false if the sequence is all zeros.
fn normalize_peak(values: &mut [f64]) -> bool {
    let peak = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if !(peak > 0.0) {
        return false;
    }
    for v in values.iter_mut() {
        *v /= peak;
    }
    true
}
