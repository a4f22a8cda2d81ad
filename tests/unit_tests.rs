use activation_statistics::design::{AcquisitionMode, hrf_task};
use activation_statistics::model::{beta_to_tscore, glm, glm_columns};
use activation_statistics::testing::correction::{benjamini_hochberg_mask, benjamini_hochberg_mask_nd};
use activation_statistics::testing::inference::parametric::t_to_p_value;
use activation_statistics::testing::Alternative;
use approx::assert_relative_eq;
use ndarray::{Array1, Array2, Array3, array};

#[cfg(test)]
mod glm_tests {
    use super::*;

    #[test]
    fn check_noise_free_recovery() {
        // Three regressors: intercept, linear trend, square wave
        let n = 12;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => 1.0,
            1 => i as f64,
            _ => if (i / 3) % 2 == 0 { 1.0 } else { -1.0 },
        });
        let truth = array![4.0, -0.25, 1.5];
        let y = x.dot(&truth);

        let beta = glm(&x, &y).unwrap();
        for (b, t) in beta.iter().zip(truth.iter()) {
            assert_relative_eq!(*b, *t, epsilon = 1e-9);
        }
    }

    #[test]
    fn check_row_mismatch_always_fails() {
        let x = Array2::<f64>::ones((10, 2));
        for rows in [0, 5, 9, 11, 20] {
            let y = Array1::<f64>::zeros(rows);
            let err = glm(&x, &y).unwrap_err();
            assert!(err.to_string().contains("must be the same"));
        }
    }

    #[test]
    fn check_columns_are_independent() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let mut y = Array2::<f64>::zeros((4, 2));
        y.column_mut(0).assign(&array![1.0, 2.0, 3.0, 4.0]);
        y.column_mut(1).assign(&array![8.0, 6.0, 4.0, 2.0]);

        let beta = glm_columns(&x, &y).unwrap();
        assert_relative_eq!(beta[[0, 0]], 1.0, epsilon = 1e-10);
        assert_relative_eq!(beta[[1, 0]], 1.0, epsilon = 1e-10);
        assert_relative_eq!(beta[[0, 1]], 8.0, epsilon = 1e-10);
        assert_relative_eq!(beta[[1, 1]], -2.0, epsilon = 1e-10);
    }
}

#[cfg(test)]
mod tscore_tests {
    use super::*;

    #[test]
    fn check_perfect_fit_does_not_panic() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let beta = array![[1.0, 0.0], [-2.0, 0.0]];
        let y = x.dot(&beta);

        let t = beta_to_tscore(&x, &y, &beta).unwrap();

        assert!(t[[0, 0]].is_infinite() && t[[0, 0]] > 0.0);
        assert!(t[[1, 0]].is_infinite() && t[[1, 0]] < 0.0);
        assert!(t[[0, 1]].is_nan());
        assert!(t[[1, 1]].is_nan());
    }

    #[test]
    fn check_tscore_sign_follows_beta() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0], [1.0, 4.0]];
        let y = array![[0.1, 5.0], [1.2, 3.9], [1.9, 3.1], [3.1, 2.0], [3.9, 0.8]];

        let beta = glm_columns(&x, &y).unwrap();
        let t = beta_to_tscore(&x, &y, &beta).unwrap();

        assert!(t[[1, 0]] > 10.0);
        assert!(t[[1, 1]] < -10.0);

        let p_up = t_to_p_value(t[[1, 0]], 3.0, Alternative::Greater).unwrap();
        let p_down = t_to_p_value(t[[1, 1]], 3.0, Alternative::Greater).unwrap();
        assert!(p_up < 0.001);
        assert!(p_down > 0.999);
    }
}

#[cfg(test)]
mod fdr_tests {
    use super::*;

    #[test]
    fn check_reference_example() {
        let mask = benjamini_hochberg_mask(&[0.01, 0.02, 0.03, 0.04, 0.50], 0.05).unwrap();
        assert_eq!(mask, vec![true, true, true, true, false]);
    }

    #[test]
    fn check_all_nan_is_all_false() {
        let p = Array3::<f64>::from_elem((2, 2, 2), f64::NAN);
        let mask = benjamini_hochberg_mask_nd(&p, 0.05).unwrap();
        assert_eq!(mask.dim(), (2, 2, 2));
        assert!(mask.iter().all(|&s| !s));
    }

    #[test]
    fn check_no_rejections() {
        let mask = benjamini_hochberg_mask(&[0.9, 0.8, 0.7], 0.01).unwrap();
        assert_eq!(mask, vec![false, false, false]);
    }

    #[test]
    fn check_nan_never_marked() {
        let p = vec![0.0, f64::NAN, 0.0, f64::NAN, 1e-12];
        let mask = benjamini_hochberg_mask(&p, 0.2).unwrap();
        assert_eq!(mask, vec![true, false, true, false, true]);
    }
}

#[cfg(test)]
mod hrf_tests {
    use super::*;

    #[test]
    fn check_length_and_normalization() {
        for (n, tr) in [(40, 4.0), (60, 2.5), (33, 3.0)] {
            let r = hrf_task(20.0, n, tr, 6.0, AcquisitionMode::Standard).unwrap();
            assert_eq!(r.task.len(), n);
            assert_eq!(r.derivative.len(), n);

            let task_peak = r.task.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            let diff_peak = r.derivative.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            assert_relative_eq!(task_peak, 1.0, epsilon = 1e-12);
            assert_relative_eq!(diff_peak, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn check_control_tag_negation() {
        let control = hrf_task(15.0, 50, 3.0, 4.0, AcquisitionMode::ControlFirst).unwrap();
        let tag = hrf_task(15.0, 50, 3.0, 4.0, AcquisitionMode::TagFirst).unwrap();

        for (c, t) in control.task.iter().zip(tag.task.iter()) {
            assert_eq!(*c, -*t);
        }
        for (c, t) in control.derivative.iter().zip(tag.derivative.iter()) {
            assert_eq!(*c, -*t);
        }
    }

    #[test]
    fn check_task_is_non_negative_without_alternation() {
        let r = hrf_task(20.0, 40, 4.0, 6.0, AcquisitionMode::Standard).unwrap();
        assert!(r.task.iter().all(|&v| v >= 0.0));
    }
}
