//! Per-slot parameter transformations.
//!
//! Each slot of a codec maps a run of model parameters to a (possibly shorter)
//! run of unconstrained optimization parameters. All transforms are total:
//! arguments of `sqrt` and `acos` are clamped to their domains first, so no
//! input produces NaN.

use serde::{Deserialize, Serialize};

/// Lower edge of the cylinder radius range, in metres.
pub const RADIUS_FLOOR: f64 = 1e-7;

/// Width of the cylinder radius range, in metres.
pub const RADIUS_SPAN: f64 = 20e-6;

/// The transformation applied to one slot of the model parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SlotTransform {
    /// Non-negative quantity: `opt = sqrt(model)`, `model = opt²`.
    Positive,

    /// Passed through unchanged (orientation angles).
    Identity,

    /// `len` volume fractions summing to one, carried by `len − 1` angles.
    Simplex { len: usize },

    /// Quantity confined to `[lo, lo + span]`:
    /// `opt = acos(sqrt((model − lo)/span))`, `model = lo + span·cos²(opt)`.
    BoundedRange { lo: f64, span: f64 },

    /// Copy of the model parameter at index `source`; absent from
    /// optimization space.
    Tied { source: usize },
}

impl SlotTransform {
    /// Number of model parameters this slot covers.
    pub fn model_len(&self) -> usize {
        match self {
            SlotTransform::Simplex { len } => *len,
            _ => 1,
        }
    }

    /// Number of optimization parameters this slot produces.
    pub fn opt_len(&self) -> usize {
        match self {
            SlotTransform::Simplex { len } => len.saturating_sub(1),
            SlotTransform::Tied { .. } => 0,
            _ => 1,
        }
    }

    /// Encode `model` (of length `model_len`) into `opt` (of length `opt_len`).
    /// Tied slots write nothing.
    pub fn encode_into(&self, model: &[f64], opt: &mut [f64]) {
        match *self {
            SlotTransform::Positive => opt[0] = positive_to_internal(model[0]),
            SlotTransform::Identity => opt[0] = model[0],
            SlotTransform::Simplex { .. } => simplex_to_internal(model, opt),
            SlotTransform::BoundedRange { lo, span } => {
                opt[0] = fraction_to_internal((model[0] - lo) / span)
            }
            SlotTransform::Tied { .. } => {}
        }
    }

    /// Decode `opt` into `model`. Tied slots are resolved by the codec, which
    /// owns the whole model vector.
    pub fn decode_into(&self, opt: &[f64], model: &mut [f64]) {
        match *self {
            SlotTransform::Positive => model[0] = positive_to_external(opt[0]),
            SlotTransform::Identity => model[0] = opt[0],
            SlotTransform::Simplex { .. } => simplex_to_external(opt, model),
            SlotTransform::BoundedRange { lo, span } => {
                model[0] = lo + span * fraction_to_external(opt[0])
            }
            SlotTransform::Tied { .. } => {}
        }
    }
}

/// `sqrt` of a non-negative quantity; negative inputs clamp to zero.
pub fn positive_to_internal(value: f64) -> f64 {
    value.max(0.0).sqrt()
}

/// Square of an unconstrained value.
pub fn positive_to_external(internal: f64) -> f64 {
    internal * internal
}

/// `acos(sqrt(f))` of a fraction; inputs outside `[0, 1]` clamp to the edge.
pub fn fraction_to_internal(fraction: f64) -> f64 {
    fraction.clamp(0.0, 1.0).sqrt().acos()
}

/// `cos²` of an unconstrained value, always in `[0, 1]`.
pub fn fraction_to_external(internal: f64) -> f64 {
    let c = internal.cos();
    c * c
}

/// Encode a simplex of fractions as angles on the remaining mass. The final
/// fraction is implied and not encoded.
fn simplex_to_internal(fractions: &[f64], opt: &mut [f64]) {
    let mut remaining = 1.0;
    for (i, slot) in opt.iter_mut().enumerate() {
        let f = fractions[i];
        // No mass left: every angle decodes to the same fractions.
        *slot = if remaining > 0.0 {
            fraction_to_internal(f / remaining)
        } else {
            0.0
        };
        remaining -= f;
    }
}

/// Decode angles into a simplex; the final fraction is the residual mass, so
/// the fractions sum to one for any input.
fn simplex_to_external(opt: &[f64], fractions: &mut [f64]) {
    let mut remaining = 1.0;
    for (i, x) in opt.iter().enumerate() {
        let f = fraction_to_external(*x) * remaining;
        fractions[i] = f;
        remaining -= f;
    }
    if let Some(last) = fractions.last_mut() {
        *last = remaining;
    }
}
