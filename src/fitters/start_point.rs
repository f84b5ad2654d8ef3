//! Start point estimation and post-fit clean-up.
//!
//! Simple models start from a heuristic read off the data. Richer models
//! start from a simpler model's fit, extended with the parameters the simple
//! model lacks.

use std::f64::consts::{PI, TAU};

use ndarray::Array1;
use tracing::debug;

use crate::codec::ParameterCodec;
use crate::scheme::AcquisitionScheme;

/// Fraction given to a compartment the simpler model did not have.
pub const NEW_COMPARTMENT_FRACTION: f64 = 1e-4;

/// Amount taken from each existing fraction to make room for a new
/// compartment.
pub const DONOR_EPSILON: f64 = 5e-5;

/// Intrinsic diffusivity assumed when the data give no usable estimate.
pub const DEFAULT_DIFFUSIVITY: f64 = 1.7e-9;

/// Cylinder radius assumed before fitting.
pub const DEFAULT_RADIUS: f64 = 2e-6;

/// Data-derived quantities a heuristic start point is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelEstimate {
    /// Mean of the unweighted measurements.
    pub s0: f64,
    /// Polar angle of the most attenuated gradient direction.
    pub theta: f64,
    /// Azimuth of the most attenuated gradient direction.
    pub phi: f64,
    /// Apparent diffusion coefficient, or [`DEFAULT_DIFFUSIVITY`].
    pub diffusivity: f64,
}

impl VoxelEstimate {
    /// Estimate S0, fibre orientation and diffusivity from one voxel.
    ///
    /// Without unweighted measurements S0 is the largest measurement. When
    /// S0 is not positive the orientation defaults to the z axis.
    pub fn from_measurements(scheme: &AcquisitionScheme, measurements: &Array1<f64>) -> Self {
        let b0 = scheme.b0_indices();
        let s0 = if b0.is_empty() {
            measurements.iter().cloned().fold(0.0, f64::max)
        } else {
            b0.iter().map(|&i| measurements[i]).sum::<f64>() / b0.len() as f64
        };

        let mut theta = 0.0;
        let mut phi = 0.0;
        let mut diffusivity = DEFAULT_DIFFUSIVITY;

        if s0 > 0.0 && s0.is_finite() {
            let mut lowest = f64::INFINITY;
            let mut adc_sum = 0.0;
            let mut adc_count = 0usize;

            for (i, m) in scheme.measurements().iter().enumerate() {
                if m.is_b0() {
                    continue;
                }
                let normalised = measurements[i] / s0;
                if normalised < lowest {
                    lowest = normalised;
                    let [x, y, z] = m.direction;
                    theta = z.clamp(-1.0, 1.0).acos();
                    phi = y.atan2(x);
                }
                if normalised > 0.0 && normalised < 1.0 {
                    adc_sum += -normalised.ln() / m.b_value();
                    adc_count += 1;
                }
            }

            if adc_count > 0 {
                let adc = adc_sum / adc_count as f64;
                if adc.is_finite() && adc > 0.0 {
                    diffusivity = adc;
                }
            }
        }

        let (theta, phi) = canonical_angles(theta, phi);
        let estimate = Self {
            s0,
            theta,
            phi,
            diffusivity,
        };
        debug!(?estimate, "heuristic voxel estimate");
        estimate
    }
}

/// Fractions for a model with one more compartment: each existing fraction
/// gives up [`DONOR_EPSILON`] and the new compartment, appended last, gets
/// [`NEW_COMPARTMENT_FRACTION`].
///
/// With two donors the total is unchanged. Donors never go negative.
pub fn extend_fractions(donors: &[f64]) -> Vec<f64> {
    let mut fractions: Vec<f64> = donors.iter().map(|f| (f - DONOR_EPSILON).max(0.0)).collect();
    fractions.push(NEW_COMPARTMENT_FRACTION);
    fractions
}

/// Map (θ, φ) into θ ∈ [0, π], φ ∈ [0, 2π) without changing the direction.
pub fn canonical_angles(theta: f64, phi: f64) -> (f64, f64) {
    let mut theta = theta.rem_euclid(TAU);
    let mut phi = phi;
    if theta > PI {
        theta = TAU - theta;
        phi += PI;
    }
    let phi = phi.rem_euclid(TAU);
    // rem_euclid can round up to exactly 2π
    let phi = if phi >= TAU { 0.0 } else { phi };
    (theta, phi)
}

/// Canonicalise the orientation of a decoded model vector, if it has one.
pub fn canonicalise(codec: &ParameterCodec, mut params: Array1<f64>) -> Array1<f64> {
    if let Some(i) = codec.orientation_index() {
        let (theta, phi) = canonical_angles(params[i], params[i + 1]);
        params[i] = theta;
        params[i + 1] = phi;
    }
    params
}
