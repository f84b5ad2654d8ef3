//! End-to-end fits of noiseless synthetic voxels.

use std::f64::consts::FRAC_PI_2;

use compartment_fit::compartments::CompartmentKind;
use compartment_fit::fitters::{BallCylinderDotFitter, BallStickFitter, CompartmentFitter, FitterConfig};
use compartment_fit::lm::MinimizerStatus;
use compartment_fit::noise::NoiseModel;
use ndarray::{array, Array1};

use crate::test_helpers::{axis_agreement, synthesize, two_shell_scheme};

fn assert_within_percent(fitted: f64, truth: f64, percent: f64) {
    assert!(
        (fitted - truth).abs() <= truth.abs() * percent / 100.0,
        "fitted {} vs truth {}",
        fitted,
        truth
    );
}

#[test]
fn ball_stick_recovers_noiseless_parameters() {
    let scheme = two_shell_scheme(30);
    let truth = array![1.0, 0.6, 0.4, 1.7e-9, FRAC_PI_2, 0.0, 1.7e-9];
    let voxel = synthesize(&[CompartmentKind::Stick, CompartmentKind::Ball], &truth, &scheme);

    let fitter = BallStickFitter::new(scheme, FitterConfig::default().with_runs(3)).unwrap();
    let result = fitter.fit(&voxel).unwrap();

    assert_eq!(result.status, MinimizerStatus::Converged);
    assert!(result.objective < 1e-6, "objective {}", result.objective);
    for i in 0..4 {
        assert_within_percent(result.params[i], truth[i], 1.0);
    }
    assert!(axis_agreement(result.params[4], result.params[5], truth[4], truth[5]) > 0.9999);

    // Orientation is reported in canonical form.
    assert!((0.0..=std::f64::consts::PI).contains(&result.params[4]));
    assert!((0.0..2.0 * std::f64::consts::PI).contains(&result.params[5]));
}

#[test]
fn fixed_start_point_is_used_verbatim() {
    let scheme = two_shell_scheme(20);
    let truth = array![2.0, 0.7, 0.3, 1.2e-9, 0.8, 1.9, 1.2e-9];
    let voxel = synthesize(&[CompartmentKind::Stick, CompartmentKind::Ball], &truth, &scheme);

    let config = FitterConfig::default().with_fixed_start_point(truth.to_vec());
    let fitter = BallStickFitter::new(scheme, config).unwrap();
    let result = fitter.fit(&voxel).unwrap();

    assert!(result.status.is_usable());
    assert!(result.objective < 1e-20);
    for i in 0..truth.len() {
        assert!((result.params[i] - truth[i]).abs() <= 1e-6 * truth[i].abs());
    }
}

#[test]
fn rician_noise_model_fits_biased_data() {
    let scheme = two_shell_scheme(30);
    let sigma = 0.02;
    let truth = array![1.0, 0.5, 0.5, 1.5e-9, 1.2, 0.4, 1.5e-9];
    let clean = synthesize(&[CompartmentKind::Stick, CompartmentKind::Ball], &truth, &scheme);
    let noise = NoiseModel::Rician { sigma };
    let voxel: Array1<f64> = clean.mapv(|s| (s * s + 2.0 * sigma * sigma).sqrt());

    let fitter = BallStickFitter::new(scheme, FitterConfig::default().with_noise(noise).with_runs(3)).unwrap();
    let result = fitter.fit(&voxel).unwrap();

    assert!(result.status.is_usable());
    assert!(result.objective < 1e-6);
    assert_within_percent(result.params[0], 1.0, 1.0);
    assert_within_percent(result.params[1], 0.5, 1.0);
}

#[test]
fn ball_cylinder_dot_fits_through_the_hierarchy() {
    let scheme = two_shell_scheme(30);
    let truth = array![1.0, 0.6, 0.35, 0.05, 1.7e-9, 1.0, 2.0, 5e-6, 1.7e-9];
    let voxel = synthesize(
        &[CompartmentKind::Cylinder, CompartmentKind::Ball, CompartmentKind::Dot],
        &truth,
        &scheme,
    );

    let fitter = BallCylinderDotFitter::new(scheme, BallCylinderDotFitter::default_config()).unwrap();
    let result = fitter.fit(&voxel).unwrap();

    assert!(result.status.is_usable());
    assert!(result.objective < 1e-6, "objective {}", result.objective);
    // S0, the three fractions, d and R.
    for i in [0, 1, 2, 3, 4, 7] {
        assert_within_percent(result.params[i], truth[i], 1.0);
    }
    assert!(axis_agreement(result.params[5], result.params[6], truth[5], truth[6]) > 0.9999);
    let fractions = result.params[1] + result.params[2] + result.params[3];
    assert!((fractions - 1.0).abs() < 1e-9);
    assert_eq!(result.params[8], result.params[4]);
}

#[test]
fn dot_fraction_stays_small_without_a_dot() {
    let scheme = two_shell_scheme(30);
    let truth = array![1.0, 0.6, 0.4, 1.7e-9, 1.0, 2.0, 5e-6, 1.7e-9];
    let voxel = synthesize(&[CompartmentKind::Cylinder, CompartmentKind::Ball], &truth, &scheme);

    let fitter = BallCylinderDotFitter::new(scheme, BallCylinderDotFitter::default_config()).unwrap();
    let result = fitter.fit(&voxel).unwrap();

    assert!(result.status.is_usable());
    assert!(result.objective < 1e-6, "objective {}", result.objective);
    let dot = result.params[3];
    assert!((0.0..1e-3).contains(&dot), "dot fraction {}", dot);
    assert_within_percent(result.params[1], 0.6, 1.0);
    assert_within_percent(result.params[7], 5e-6, 1.0);
}

#[test]
fn all_zero_voxel_reports_failure_without_error() {
    let scheme = two_shell_scheme(10);
    let voxel = Array1::zeros(scheme.len());

    let fitter = BallCylinderDotFitter::new(scheme, BallCylinderDotFitter::default_config()).unwrap();
    let result = fitter.fit(&voxel).unwrap();

    assert_eq!(result.status, MinimizerStatus::NumericalFailure);
    assert_eq!(result.params.len(), 9);
    // The start point still carries a non-zero dot fraction.
    assert!(result.params[3] > 0.0);
}
