//! Batch fitting: one bad voxel never affects the others.

use std::f64::consts::FRAC_PI_2;

use compartment_fit::compartments::CompartmentKind;
use compartment_fit::fitters::{BallStickFitter, FitResult, FitterConfig};
use compartment_fit::io::{JsonLinesSink, TextSink};
use compartment_fit::lm::MinimizerStatus;
use compartment_fit::scheme::AcquisitionScheme;
use compartment_fit::voxel::{
    fit_voxels, fit_voxels_parallel, BinaryVoxelSource, ByteOrder, InMemorySource, Precision,
};
use ndarray::{array, Array1};

use crate::test_helpers::{synthesize, two_shell_scheme};

fn voxels(scheme: &AcquisitionScheme, n: usize, zero_at: usize) -> Vec<Array1<f64>> {
    (0..n)
        .map(|i| {
            if i == zero_at {
                Array1::zeros(scheme.len())
            } else {
                let truth = array![1.0 + 0.1 * i as f64, 0.6, 0.4, 1.7e-9, FRAC_PI_2, 0.3 * i as f64, 1.7e-9];
                synthesize(&[CompartmentKind::Stick, CompartmentKind::Ball], &truth, scheme)
            }
        })
        .collect()
}

#[test]
fn all_zero_voxel_is_isolated() {
    let scheme = two_shell_scheme(12);
    let data = voxels(&scheme, 5, 2);
    let fitter = BallStickFitter::new(scheme, FitterConfig::default()).unwrap();

    let mut source = InMemorySource::new(data);
    let mut results: Vec<FitResult> = Vec::new();
    let summary = fit_voxels(&fitter, &mut source, &mut results).unwrap();

    assert_eq!(summary.voxels, 5);
    assert_eq!(summary.failed, 1);
    assert_eq!(results.len(), 5);
    for (i, result) in results.iter().enumerate() {
        if i == 2 {
            assert_eq!(result.status, MinimizerStatus::NumericalFailure);
        } else {
            assert!(result.status.is_usable(), "voxel {} failed", i);
            assert!((result.params[0] - (1.0 + 0.1 * i as f64)).abs() < 0.01);
        }
    }
}

#[test]
fn parallel_batch_matches_sequential() {
    let scheme = two_shell_scheme(12);
    let data = voxels(&scheme, 6, 4);

    let sequential: Vec<FitResult> = {
        let fitter = BallStickFitter::new(scheme.clone(), FitterConfig::default()).unwrap();
        let mut out = Vec::new();
        fit_voxels(&fitter, &mut InMemorySource::new(data.clone()), &mut out).unwrap();
        out
    };
    let parallel =
        fit_voxels_parallel(&data, || BallStickFitter::new(scheme.clone(), FitterConfig::default())).unwrap();

    assert_eq!(parallel.len(), sequential.len());
    for (p, s) in parallel.iter().zip(&sequential) {
        assert_eq!(p.status, s.status);
        assert_eq!(p.params, s.params);
    }
    assert!(parallel[4].is_failure());
}

#[test]
fn binary_source_into_text_and_json_sinks() {
    let scheme = two_shell_scheme(12);
    let data = voxels(&scheme, 3, 1);
    let bytes: Vec<u8> = data
        .iter()
        .flat_map(|v| v.iter().flat_map(|x| x.to_le_bytes()).collect::<Vec<u8>>())
        .collect();

    let fitter = BallStickFitter::new(scheme.clone(), FitterConfig::default()).unwrap();

    let mut source = BinaryVoxelSource::new(&bytes[..], scheme.len(), Precision::F64, ByteOrder::Little).unwrap();
    let mut text = TextSink::new(Vec::new());
    fit_voxels(&fitter, &mut source, &mut text).unwrap();
    let text = String::from_utf8(text.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("2 "));
    assert_eq!(lines[0].split_whitespace().count(), 1 + 7 + 1);

    let mut source = BinaryVoxelSource::new(&bytes[..], scheme.len(), Precision::F64, ByteOrder::Little).unwrap();
    let mut json = JsonLinesSink::new(Vec::new());
    fit_voxels(&fitter, &mut source, &mut json).unwrap();
    let json = String::from_utf8(json.into_inner()).unwrap();
    for (i, line) in json.lines().enumerate() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["voxel"], i);
    }
}
