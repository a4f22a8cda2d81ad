// Integration tests for the activation_statistics crate
// End-to-end runs of the activation pipeline on synthetic volumes with planted effects.

#[cfg(test)]
mod integration_tests {
    use activation_statistics::activation::{ActivationAnalysis, ActivationConfig, activation_map};
    use activation_statistics::design::{AcquisitionMode, design_matrix, hrf_task};
    use activation_statistics::diagnostics::Diagnostic;
    use activation_statistics::testing::CorrectionMethod;
    use ndarray::{Array2, Array4, Axis, ShapeBuilder};
    use std::sync::Mutex;

    const NT: usize = 40;

    fn task_design() -> (Vec<f64>, Array2<f64>) {
        let regressors = hrf_task(20.0, NT, 4.0, 6.0, AcquisitionMode::Standard).unwrap();
        let x = design_matrix(&[regressors.task.as_slice()], true).unwrap();
        (regressors.task, x)
    }

    fn noise(voxel: usize, t: usize) -> f64 {
        0.5 * ((voxel * 7 + t * 13) as f64 * 0.37).sin()
    }

    /// Voxels with `active(ix, iy, iz)` follow the task, all others are suppressed by it.
    fn planted_volume(
        task: &[f64],
        shape: (usize, usize, usize),
        active: impl Fn(usize, usize, usize) -> bool,
    ) -> Array4<f64> {
        let (nx, ny, nz) = shape;
        Array4::from_shape_fn((nx, ny, nz, NT), |(ix, iy, iz, t)| {
            let voxel = (ix * ny + iy) * nz + iz;
            let amplitude = if active(ix, iy, iz) { 20.0 } else { -10.0 };
            100.0 + amplitude * task[t] + noise(voxel, t)
        })
    }

    #[test]
    fn test_planted_activation_detected() {
        let (task, x) = task_design();
        let volume = planted_volume(&task, (4, 4, 2), |ix, iy, _| (ix + iy) % 3 == 0);

        let map = activation_map(&volume, 0.0, 0.05, &x).unwrap();
        assert_eq!(map.dim(), (4, 4, 2, 2));

        for ((ix, iy, iz), &v) in map.index_axis(Axis(3), 0).indexed_iter() {
            if (ix + iy) % 3 == 0 {
                assert!(v > 0.0 && v.is_finite(), "active voxel ({ix}, {iy}, {iz}) missed: {v}");
            } else {
                assert_eq!(v, 0.0, "suppressed voxel ({ix}, {iy}, {iz}) flagged");
            }
        }

        // Every voxel has a baseline far above zero
        assert!(map.index_axis(Axis(3), 1).iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_planted_activation_with_smoothing() {
        let (task, x) = task_design();
        let volume = planted_volume(&task, (4, 4, 2), |ix, _, _| ix < 2);

        // 7.2 mm FWHM on 3 mm voxels is a one-voxel sigma
        let maps = ActivationAnalysis::new(ActivationConfig::default().with_fwhm(7.2))
            .run(&volume, &x)
            .unwrap();

        let task_map = maps.log10p.index_axis(Axis(3), 0);
        for ((ix, _, _), &v) in task_map.indexed_iter() {
            if ix < 2 {
                assert!(v > 0.0);
            } else {
                assert_eq!(v, 0.0);
            }
        }
        assert_eq!(maps.num_significant()[0], 16);
        assert!(maps.t_map.iter().all(|t| t.is_finite()));
    }

    #[test]
    fn test_zero_volume_yields_zero_map() {
        let (_, x) = task_design();
        let volume = Array4::<f64>::zeros((3, 3, 2, NT));

        for fwhm in [0.0, 6.0] {
            for q in [0.01, 0.05, 0.2] {
                let map = activation_map(&volume, fwhm, q, &x).unwrap();
                assert_eq!(map.dim(), (3, 3, 2, 2));
                assert!(map.iter().all(|&v| v == 0.0));
            }
        }
    }

    #[test]
    fn test_output_depth_matches_design_columns() {
        let regressors = hrf_task(20.0, NT, 4.0, 6.0, AcquisitionMode::Standard).unwrap();
        let x = regressors.design_matrix(true).unwrap();
        assert_eq!(x.ncols(), 3);

        let volume = planted_volume(&regressors.task, (2, 3, 2), |_, _, _| true);
        let map = activation_map(&volume, 0.0, 0.05, &x).unwrap();
        assert_eq!(map.dim(), (2, 3, 2, 3));
    }

    #[test]
    fn test_masked_voxels_stay_zero() {
        let (task, x) = task_design();
        let mut volume = planted_volume(&task, (3, 3, 1), |_, _, _| true);
        volume
            .slice_mut(ndarray::s![0, 0, 0, ..])
            .fill(f64::NAN);

        let seen = Mutex::new(Vec::new());
        let sink = |d: &Diagnostic| seen.lock().unwrap().push(d.clone());

        let maps = ActivationAnalysis::new(ActivationConfig::default())
            .with_sink(&sink)
            .run(&volume, &x)
            .unwrap();

        assert_eq!(maps.log10p[[0, 0, 0, 0]], 0.0);
        assert!(maps.p_map[[0, 0, 0, 0]].is_nan());
        assert!(maps.log10p[[1, 1, 0, 0]] > 0.0);
        assert_eq!(maps.num_significant()[0], 8);

        let seen = seen.into_inner().unwrap();
        assert!(seen.contains(&Diagnostic::ExcludedVoxels {
            contrast: 0,
            count: 1
        }));
    }

    #[test]
    fn test_masked_voxels_do_not_spread_under_smoothing() {
        let (task, x) = task_design();
        let mut volume = planted_volume(&task, (3, 3, 1), |_, _, _| true);
        volume
            .slice_mut(ndarray::s![1, 1, 0, ..])
            .fill(f64::NAN);

        let seen = Mutex::new(Vec::new());
        let sink = |d: &Diagnostic| seen.lock().unwrap().push(d.clone());

        let maps = ActivationAnalysis::new(ActivationConfig::default().with_fwhm(7.2))
            .with_sink(&sink)
            .run(&volume, &x)
            .unwrap();

        assert!(maps.p_map[[1, 1, 0, 0]].is_nan());
        assert_eq!(maps.log10p[[1, 1, 0, 0]], 0.0);
        assert_eq!(maps.contrasts[0].num_excluded(), 1);
        assert_eq!(maps.num_significant()[0], 8);
        assert!(maps.p_map[[0, 1, 0, 0]].is_finite());

        let seen = seen.into_inner().unwrap();
        assert!(seen.contains(&Diagnostic::ExcludedVoxels {
            contrast: 0,
            count: 1
        }));
    }

    #[test]
    fn test_column_major_volume_matches_row_major() {
        let (task, x) = task_design();
        let volume = planted_volume(&task, (4, 3, 2), |ix, iy, _| ix == iy);
        let mut fortran = Array4::<f64>::zeros((4, 3, 2, NT).f());
        fortran.assign(&volume);

        for fwhm in [0.0, 7.2] {
            let expected = activation_map(&volume, fwhm, 0.05, &x).unwrap();
            let map = activation_map(&fortran, fwhm, 0.05, &x).unwrap();
            assert_eq!(map, expected);
        }

        let zeros = Array4::<f64>::zeros((2, 3, 2, NT).f());
        let map = activation_map(&zeros, 0.0, 0.05, &x).unwrap();
        assert!(map.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_bonferroni_is_no_more_liberal_than_fdr() {
        let (task, x) = task_design();
        let volume = planted_volume(&task, (4, 4, 2), |ix, _, iz| ix == iz);

        let fdr = ActivationAnalysis::new(ActivationConfig::default())
            .run(&volume, &x)
            .unwrap();
        let bonferroni = ActivationAnalysis::new(
            ActivationConfig::default().with_correction(CorrectionMethod::Bonferroni),
        )
        .run(&volume, &x)
        .unwrap();

        for (b, f) in bonferroni.log10p.iter().zip(fdr.log10p.iter()) {
            if *b > 0.0 {
                assert!(*f > 0.0);
            }
        }
        assert_eq!(fdr.degrees_of_freedom, (NT - 2) as f64);
    }

    #[test]
    fn test_asl_design_fits() {
        let regressors = hrf_task(20.0, NT, 4.0, 6.0, AcquisitionMode::ControlFirst).unwrap();
        let x = regressors.design_matrix(true).unwrap();

        // Perfusion signal alternates sign between control and tag images
        let volume = Array4::from_shape_fn((2, 2, 1, NT), |(ix, iy, _, t)| {
            let voxel = ix * 2 + iy;
            200.0 + 15.0 * regressors.task[t] + noise(voxel, t)
        });

        let map = activation_map(&volume, 0.0, 0.05, &x).unwrap();
        assert!(map.index_axis(Axis(3), 0).iter().all(|&v| v > 0.0));
    }
}
