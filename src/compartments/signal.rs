//! Signal equations for the bundled compartments.
//!
//! Each function returns the normalised signal (1 at b = 0) a compartment
//! contributes to one measurement.

use crate::scheme::{Measurement, GYROMAGNETIC_RATIO};

/// Roots of J1'(x) = 0 used in the cylinder series.
const BESSEL_J1_PRIME_ROOTS: [f64; 10] = [
    1.8411837813406593,
    5.3314427735250325,
    8.5363163663462089,
    11.706004902592064,
    14.863588633909033,
    18.015527862681804,
    21.164369859188788,
    24.311326857210776,
    27.457050571059245,
    30.601922972669094,
];

/// Unit vector with polar angle `theta` and azimuth `phi`.
pub fn fibre_direction(theta: f64, phi: f64) -> [f64; 3] {
    let (sin_t, cos_t) = theta.sin_cos();
    let (sin_p, cos_p) = phi.sin_cos();
    [sin_t * cos_p, sin_t * sin_p, cos_t]
}

/// Isotropic free diffusion.
pub fn ball(m: &Measurement, diffusivity: f64) -> f64 {
    (-m.b_value() * diffusivity).exp()
}

/// Diffusion restricted to a line along `(theta, phi)`.
pub fn stick(m: &Measurement, diffusivity: f64, theta: f64, phi: f64) -> f64 {
    let c = m.cos_angle(&fibre_direction(theta, phi));
    (-m.b_value() * diffusivity * c * c).exp()
}

/// Fully restricted water.
pub fn dot(_m: &Measurement) -> f64 {
    1.0
}

/// Diffusion inside an impermeable cylinder of `radius` along
/// `(theta, phi)`.
///
/// Free diffusion along the axis; across it the Gaussian phase
/// distribution approximation for a PGSE sequence (Van Gelderen et al.).
pub fn cylinder(m: &Measurement, diffusivity: f64, theta: f64, phi: f64, radius: f64) -> f64 {
    let c = m.cos_angle(&fibre_direction(theta, phi));
    let parallel = (-m.b_value() * diffusivity * c * c).exp();

    let g_perp_sq = m.gradient_strength * m.gradient_strength * (1.0 - c * c).max(0.0);
    if g_perp_sq == 0.0 || diffusivity <= 0.0 || radius <= 0.0 {
        return parallel;
    }

    let (big, small) = (m.big_delta, m.small_delta);
    let d = diffusivity;
    let sum: f64 = BESSEL_J1_PRIME_ROOTS
        .iter()
        .map(|root| {
            let alpha = root / radius;
            let alpha2 = alpha * alpha;
            let x = d * alpha2;
            let numerator = 2.0 * x * small - 2.0
                + 2.0 * (-x * small).exp()
                + 2.0 * (-x * big).exp()
                - (-x * (big - small)).exp()
                - (-x * (big + small)).exp();
            numerator / (d * d * alpha2 * alpha2 * alpha2 * (root * root - 1.0))
        })
        .sum();

    let log_perp = -2.0 * GYROMAGNETIC_RATIO * GYROMAGNETIC_RATIO * g_perp_sq * sum;
    parallel * log_perp.exp()
}
