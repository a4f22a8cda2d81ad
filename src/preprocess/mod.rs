//! Volume preprocessing applied before model fitting.

use anyhow::{Result, bail};
use ndarray::parallel::prelude::*;
use ndarray::{Array3, Array4, ArrayBase, Axis, Data, Ix3, Zip};

/// Constants of the isotropic Gaussian smoothing kernel.
#[derive(Debug, Clone, Copy)]
pub struct SmoothingConfig {
    /// Ratio of the full width at half maximum to the standard deviation
    pub fwhm_to_sigma: f64,
    /// Edge length of a voxel, in the unit of the FWHM (mm)
    pub voxel_size: f64,
    /// Kernel radius in standard deviations
    pub truncate: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        SmoothingConfig {
            fwhm_to_sigma: 2.4,
            voxel_size: 3.0,
            truncate: 4.0,
        }
    }
}

impl SmoothingConfig {
    pub fn with_voxel_size(mut self, voxel_size: f64) -> Self {
        self.voxel_size = voxel_size;
        self
    }

    pub fn with_truncate(mut self, truncate: f64) -> Self {
        self.truncate = truncate;
        self
    }

    /// Kernel standard deviation in voxels for a FWHM in physical units.
    pub fn sigma_voxels(&self, fwhm: f64) -> f64 {
        fwhm / (self.fwhm_to_sigma * self.voxel_size)
    }
}

/// Set negative intensities to zero. NaN marks excluded voxels and is kept.
pub fn clamp_non_negative(volume: &mut Array4<f64>) {
    volume.par_mapv_inplace(|v| if v < 0.0 { 0.0 } else { v });
}

/// Smooth every time frame of a 4D volume with the same Gaussian.
pub fn smooth_frames(volume: &mut Array4<f64>, fwhm: f64, config: &SmoothingConfig) -> Result<()> {
    if !(fwhm >= 0.0) {
        bail!("Smoothing FWHM must be non-negative, got {}", fwhm);
    }
    if fwhm == 0.0 {
        return Ok(());
    }
    let sigma = config.sigma_voxels(fwhm);
    log::debug!("Smoothing {} frames with sigma = {:.3} voxels", volume.len_of(Axis(3)), sigma);

    volume
        .axis_iter_mut(Axis(3))
        .into_par_iter()
        .for_each(|mut frame| {
            let smoothed = gaussian_smooth_3d(&frame, sigma, config);
            frame.assign(&smoothed);
        });
    Ok(())
}

/// 3D Gaussian smoothing using separable 1D convolutions.
///
/// Boundaries are handled by half-sample symmetric reflection (d c b a | a b c d | d c b a).
/// NaN voxels are left out of every weighted sum, the remaining weights are renormalized,
/// and the NaN voxels themselves stay NaN.
/// A non-positive `sigma` returns an unmodified copy.
pub fn gaussian_smooth_3d<S>(data: &ArrayBase<S, Ix3>, sigma: f64, config: &SmoothingConfig) -> Array3<f64>
where
    S: Data<Elem = f64>,
{
    let mut out = data.to_owned();
    if !(sigma > 0.0) {
        return out;
    }

    let kernel = gaussian_kernel(sigma, config.truncate);
    for axis in 0..3 {
        convolve_axis(&mut out, Axis(axis), &kernel);
    }
    out
}

fn gaussian_kernel(sigma: f64, truncate: f64) -> Vec<f64> {
    let radius = (truncate * sigma + 0.5) as usize;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-0.5 * x * x / (sigma * sigma)).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}

/// Reflect an out-of-range index back into 0..n.
#[inline]
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - 1 - i;
    }
    i as usize
}

fn convolve_axis(data: &mut Array3<f64>, axis: Axis, kernel: &[f64]) {
    let radius = (kernel.len() / 2) as isize;
    let n = data.len_of(axis);
    if n == 0 {
        return;
    }

    let mut buffer = vec![0.0; n];
    Zip::from(data.lanes_mut(axis)).for_each(|mut lane| {
        buffer
            .iter_mut()
            .zip(lane.iter())
            .for_each(|(b, &v)| *b = v);

        for (i, out) in lane.iter_mut().enumerate() {
            if buffer[i].is_nan() {
                continue;
            }
            let (sum, weight) = kernel
                .iter()
                .enumerate()
                .map(|(k, &w)| (w, buffer[reflect(i as isize + k as isize - radius, n)]))
                .filter(|(_, v)| !v.is_nan())
                .fold((0.0, 0.0), |(s, ws), (w, v)| (s + w * v, ws + w));
            *out = sum / weight;
        }
    });
}
