//! Slice montages for inspecting volumes and statistical maps.
//!
//! The axial slices (third axis) of a volume are tiled into a single 2D image, row by
//! row, ready to hand to whatever image or plotting library the caller uses.

use anyhow::{Result, anyhow, bail};
use ndarray::{Array2, Array3, ArrayViewD, Axis, Ix3, s};

/// Tile the slices of a 3D volume, or of the time average of a 4D volume.
///
/// The montage has ⌈nz / cols⌉ × cols tiles of nx × ny pixels; tiles past the last slice
/// are filled with NaN.
pub fn montage(volume: ArrayViewD<'_, f64>, cols: usize) -> Result<Array2<f64>> {
    if cols == 0 {
        bail!("Montage needs at least one column");
    }

    let data: Array3<f64> = match volume.ndim() {
        4 => volume
            .mean_axis(Axis(3))
            .ok_or_else(|| anyhow!("Cannot average a 4D volume without time points"))?
            .into_dimensionality::<Ix3>()?,
        3 => volume.into_dimensionality::<Ix3>()?.to_owned(),
        n => bail!("Input array must be 3D or 4D, got {}D", n),
    };

    let (nx, ny, nz) = data.dim();
    let rows = nz.div_ceil(cols);
    let mut image = Array2::<f64>::from_elem((rows * nx, cols * ny), f64::NAN);

    for (k, slice) in data.axis_iter(Axis(2)).enumerate() {
        let (row, col) = (k / cols, k % cols);
        image
            .slice_mut(s![row * nx..(row + 1) * nx, col * ny..(col + 1) * ny])
            .assign(&slice);
    }

    Ok(image)
}

/// Linearly rescale intensities to [0, 1], clipping outside `[vmin, vmax]`.
///
/// Missing bounds default to the finite minimum and maximum of the image. NaN pixels
/// (empty tiles, excluded voxels) stay NaN.
pub fn window(image: &Array2<f64>, vmin: Option<f64>, vmax: Option<f64>) -> Array2<f64> {
    let finite = image.iter().copied().filter(|v| v.is_finite());
    let lo = vmin.unwrap_or_else(|| finite.clone().fold(f64::INFINITY, f64::min));
    let hi = vmax.unwrap_or_else(|| finite.fold(f64::NEG_INFINITY, f64::max));
    let range = hi - lo;

    image.mapv(|v| {
        if v.is_nan() {
            v
        } else if !(range > 0.0) {
            0.0
        } else {
            ((v - lo) / range).clamp(0.0, 1.0)
        }
    })
}
