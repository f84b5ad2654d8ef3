//! Round-trip and totality of the three-compartment codec over random samples.

use approx::assert_relative_eq;
use compartment_fit::codec::{ParameterCodec, RADIUS_FLOOR, RADIUS_SPAN};
use ndarray::{array, Array1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;

/// `[S0, f_cyl, f_ball, f_dot, d, θ, φ, R, d_ball]`
fn codec() -> ParameterCodec {
    ParameterCodec::builder()
        .positive()
        .simplex(3)
        .positive()
        .orientation()
        .radius()
        .tied(4)
        .build()
        .unwrap()
}

fn random_valid(rng: &mut ChaCha8Rng) -> Array1<f64> {
    let raw: Vec<f64> = (0..3).map(|_| rng.gen_range(0.01..1.0)).collect();
    let total: f64 = raw.iter().sum();
    let d = rng.gen_range(1e-10..3e-9);
    array![
        rng.gen_range(0.1..10.0),
        raw[0] / total,
        raw[1] / total,
        raw[2] / total,
        d,
        rng.gen_range(0.0..PI),
        rng.gen_range(0.0..2.0 * PI),
        rng.gen_range(RADIUS_FLOOR..RADIUS_FLOOR + RADIUS_SPAN),
        d
    ]
}

fn assert_physically_valid(model: &Array1<f64>) {
    assert!(model.iter().all(|v| v.is_finite()), "non-finite decode {:?}", model);
    assert!(model[0] >= 0.0);
    for i in 1..4 {
        assert!((0.0..=1.0).contains(&model[i]), "fraction {} out of range", model[i]);
    }
    assert_relative_eq!(model[1] + model[2] + model[3], 1.0, epsilon = 1e-9);
    assert!(model[4] >= 0.0);
    assert!(model[7] >= RADIUS_FLOOR && model[7] <= RADIUS_FLOOR + RADIUS_SPAN);
    assert_eq!(model[8], model[4]);
}

#[test]
fn round_trip_random_valid_vectors() {
    let codec = codec();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for _ in 0..10_000 {
        let model = random_valid(&mut rng);
        let decoded = codec.decode(&codec.encode(&model).unwrap()).unwrap();
        for i in 0..model.len() {
            assert_relative_eq!(decoded[i], model[i], max_relative = 1e-9);
        }
    }
}

#[test]
fn decode_is_total_over_random_inputs() {
    let codec = codec();
    let mut rng = ChaCha8Rng::seed_from_u64(11);

    for _ in 0..10_000 {
        let opt: Array1<f64> = (0..codec.num_opt_params())
            .map(|_| rng.gen_range(-1e6..1e6))
            .collect();
        assert_physically_valid(&codec.decode(&opt).unwrap());
    }
}

#[test]
fn decode_is_total_at_extremes() {
    let codec = codec();
    for value in [-1e6, -1.0, 0.0, 1.0, 1e6, f64::MAX, f64::MIN] {
        let opt = Array1::from_elem(codec.num_opt_params(), value);
        let model = codec.decode(&opt).unwrap();
        // f64::MAX squares to infinity in the positive slots; the
        // constrained slots stay valid regardless.
        if value.abs() <= 1e6 {
            assert_physically_valid(&model);
        } else {
            assert_relative_eq!(model[1] + model[2] + model[3], 1.0, epsilon = 1e-9);
            assert!(model[7] >= RADIUS_FLOOR && model[7] <= RADIUS_FLOOR + RADIUS_SPAN);
        }
    }
}

#[test]
fn encode_is_clamped_outside_the_valid_region() {
    let codec = codec();
    let out_of_range = array![-1.0, 1.5, -0.2, -0.3, -1e-9, 0.1, 0.2, 1.0, -1e-9];
    let opt = codec.encode(&out_of_range).unwrap();
    assert!(opt.iter().all(|v| v.is_finite()));
    assert_physically_valid(&codec.decode(&opt).unwrap());
}
