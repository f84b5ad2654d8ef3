//! Pulsed-gradient spin-echo acquisition schemes.
//!
//! A scheme is the read-only list of measurements a voxel was acquired with.
//! Fitters keep one for their whole lifetime and hand it to signal prediction.
//!
//! Scheme files are whitespace separated, one measurement per line:
//!
//! ```text
//! VERSION: STEJSKALTANNER
//! # x      y      z      |G| (T/m)  DELTA (s)  delta (s)
//! 0.0      0.0    0.0    0.0        0.03       0.01
//! 1.0      0.0    0.0    0.05       0.03       0.01
//! ```

use std::fs;
use std::path::Path;

use crate::error::{FitError, Result};

/// Proton gyromagnetic ratio in rad/s/T.
pub const GYROMAGNETIC_RATIO: f64 = 2.6751525e8;

/// Measurements with a b-value at or below this (s/m²) count as unweighted.
pub const B0_THRESHOLD: f64 = 1e6;

/// One PGSE measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Unit gradient direction; all zeros for an unweighted measurement.
    pub direction: [f64; 3],
    /// Gradient strength |G| in T/m.
    pub gradient_strength: f64,
    /// Pulse separation Δ in s.
    pub big_delta: f64,
    /// Pulse duration δ in s.
    pub small_delta: f64,
}

impl Measurement {
    /// Create a measurement, normalising the gradient direction.
    pub fn new(direction: [f64; 3], gradient_strength: f64, big_delta: f64, small_delta: f64) -> Result<Self> {
        let values = [
            direction[0],
            direction[1],
            direction[2],
            gradient_strength,
            big_delta,
            small_delta,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(FitError::InvalidInput(format!(
                "non-finite measurement {:?}",
                values
            )));
        }
        if gradient_strength < 0.0 || big_delta < 0.0 || small_delta < 0.0 {
            return Err(FitError::InvalidInput(format!(
                "negative timing or gradient strength in {:?}",
                values
            )));
        }
        if small_delta > big_delta {
            return Err(FitError::InvalidInput(format!(
                "pulse duration {} exceeds pulse separation {}",
                small_delta, big_delta
            )));
        }

        let norm = direction.iter().map(|c| c * c).sum::<f64>().sqrt();
        let direction = if norm > 0.0 {
            [direction[0] / norm, direction[1] / norm, direction[2] / norm]
        } else {
            [0.0; 3]
        };

        Ok(Self {
            direction,
            gradient_strength,
            big_delta,
            small_delta,
        })
    }

    /// Diffusion weighting `(γ G δ)² (Δ − δ/3)` in s/m².
    pub fn b_value(&self) -> f64 {
        let q = GYROMAGNETIC_RATIO * self.gradient_strength * self.small_delta;
        q * q * (self.big_delta - self.small_delta / 3.0)
    }

    /// Cosine between the gradient direction and `axis`.
    pub fn cos_angle(&self, axis: &[f64; 3]) -> f64 {
        self.direction
            .iter()
            .zip(axis.iter())
            .map(|(g, n)| g * n)
            .sum()
    }

    /// Whether this measurement is unweighted.
    pub fn is_b0(&self) -> bool {
        self.gradient_strength == 0.0 || self.b_value() <= B0_THRESHOLD
    }
}

/// An ordered, read-only list of PGSE measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionScheme {
    measurements: Vec<Measurement>,
}

impl AcquisitionScheme {
    /// Build a scheme from its measurements.
    pub fn new(measurements: Vec<Measurement>) -> Result<Self> {
        if measurements.is_empty() {
            return Err(FitError::InvalidInput(
                "an acquisition scheme needs at least one measurement".to_string(),
            ));
        }
        Ok(Self { measurements })
    }

    /// Read a scheme file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse scheme file contents.
    pub fn parse(text: &str) -> Result<Self> {
        let mut measurements = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with("VERSION:") {
                if measurements.is_empty() {
                    continue;
                }
                return Err(FitError::Format(format!(
                    "line {}: VERSION header after the first measurement",
                    line_no + 1
                )));
            }

            let values = line
                .split_whitespace()
                .map(|token| {
                    token.parse::<f64>().map_err(|_| {
                        FitError::Format(format!("line {}: invalid number '{}'", line_no + 1, token))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            if values.len() != 6 {
                return Err(FitError::Format(format!(
                    "line {}: expected 6 columns (x y z |G| DELTA delta), got {}",
                    line_no + 1,
                    values.len()
                )));
            }

            measurements.push(Measurement::new(
                [values[0], values[1], values[2]],
                values[3],
                values[4],
                values[5],
            )?);
        }

        Self::new(measurements)
    }

    /// Number of measurements.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// Always false for a constructed scheme.
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// The measurements in acquisition order.
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// b-value of each measurement.
    pub fn b_values(&self) -> Vec<f64> {
        self.measurements.iter().map(Measurement::b_value).collect()
    }

    /// Indices of the unweighted measurements.
    pub fn b0_indices(&self) -> Vec<usize> {
        self.measurements
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_b0())
            .map(|(i, _)| i)
            .collect()
    }
}
