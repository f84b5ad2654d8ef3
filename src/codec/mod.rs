//! # Parameter codec
//!
//! A [`ParameterCodec`] is the bijection between a constrained model
//! parameter vector and the unconstrained vector a minimizer works on. It is a
//! small pure value: an ordered pipeline of [`SlotTransform`]s, validated once
//! when the fitter is built and reused for every voxel afterwards.
//!
//! Two laws hold for every codec:
//!
//! - `decode(encode(v)) == v` for every physically valid `v`;
//! - `decode` accepts any real input and always returns a physically valid
//!   vector, which is what makes unconstrained optimization safe.
//!
//! ```rust
//! use compartment_fit::codec::ParameterCodec;
//! use ndarray::array;
//!
//! // S0, two fractions, one diffusivity, orientation.
//! let codec = ParameterCodec::builder()
//!     .positive()
//!     .simplex(2)
//!     .positive()
//!     .orientation()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(codec.num_model_params(), 6);
//! assert_eq!(codec.num_opt_params(), 5);
//!
//! let model = codec.decode(&array![1e3, -1e3, 7.0, 0.2, 0.1]).unwrap();
//! assert!((model[1] + model[2] - 1.0).abs() < 1e-12);
//! ```

pub mod transform;

pub use transform::{
    fraction_to_external, fraction_to_internal, positive_to_external, positive_to_internal,
    SlotTransform, RADIUS_FLOOR, RADIUS_SPAN,
};

use ndarray::Array1;

use crate::error::{FitError, Result};

/// Bijective, differentiable mapping between model and optimization space.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterCodec {
    slots: Vec<SlotTransform>,
    num_model_params: usize,
    num_opt_params: usize,
    orientation_index: Option<usize>,
}

impl ParameterCodec {
    /// Start building a codec slot by slot.
    pub fn builder() -> CodecBuilder {
        CodecBuilder::default()
    }

    /// Length of the model parameter vector.
    pub fn num_model_params(&self) -> usize {
        self.num_model_params
    }

    /// Length of the optimization parameter vector.
    pub fn num_opt_params(&self) -> usize {
        self.num_opt_params
    }

    /// Model-space index of the polar angle θ (φ follows it), if the codec
    /// carries an orientation.
    pub fn orientation_index(&self) -> Option<usize> {
        self.orientation_index
    }

    /// Optimization-space index of θ (φ follows it). Orientation passes
    /// through unchanged, so this is where callers perturb it.
    pub fn orientation_opt_index(&self) -> Option<usize> {
        let target = self.orientation_index?;
        let mut model_at = 0;
        let mut opt_at = 0;
        for slot in &self.slots {
            if model_at == target {
                return Some(opt_at);
            }
            model_at += slot.model_len();
            opt_at += slot.opt_len();
        }
        None
    }

    /// Optimization-space ranges carrying simplex angles.
    pub fn simplex_opt_ranges(&self) -> Vec<std::ops::Range<usize>> {
        let mut ranges = Vec::new();
        let mut opt_at = 0;
        for slot in &self.slots {
            if let SlotTransform::Simplex { .. } = slot {
                ranges.push(opt_at..opt_at + slot.opt_len());
            }
            opt_at += slot.opt_len();
        }
        ranges
    }

    /// The slot pipeline.
    pub fn slots(&self) -> &[SlotTransform] {
        &self.slots
    }

    /// Map a model parameter vector into optimization space.
    pub fn encode(&self, model: &Array1<f64>) -> Result<Array1<f64>> {
        if model.len() != self.num_model_params {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} model parameters, got {}",
                self.num_model_params,
                model.len()
            )));
        }
        let model = model.to_vec();
        let mut opt = vec![0.0; self.num_opt_params];

        let mut model_at = 0;
        let mut opt_at = 0;
        for slot in &self.slots {
            let (m, o) = (slot.model_len(), slot.opt_len());
            slot.encode_into(&model[model_at..model_at + m], &mut opt[opt_at..opt_at + o]);
            model_at += m;
            opt_at += o;
        }

        Ok(Array1::from_vec(opt))
    }

    /// Map an optimization vector back into model space. Total: every real
    /// input yields a physically valid vector.
    pub fn decode(&self, opt: &Array1<f64>) -> Result<Array1<f64>> {
        if opt.len() != self.num_opt_params {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} optimization parameters, got {}",
                self.num_opt_params,
                opt.len()
            )));
        }
        let opt = opt.to_vec();
        let mut model = vec![0.0; self.num_model_params];

        let mut model_at = 0;
        let mut opt_at = 0;
        for slot in &self.slots {
            let (m, o) = (slot.model_len(), slot.opt_len());
            match *slot {
                SlotTransform::Tied { source } => model[model_at] = model[source],
                _ => slot.decode_into(&opt[opt_at..opt_at + o], &mut model[model_at..model_at + m]),
            }
            model_at += m;
            opt_at += o;
        }

        Ok(Array1::from_vec(model))
    }
}

/// Builder for [`ParameterCodec`].
#[derive(Debug, Clone, Default)]
pub struct CodecBuilder {
    slots: Vec<SlotTransform>,
    orientation_index: Option<usize>,
}

impl CodecBuilder {
    fn model_len(&self) -> usize {
        self.slots.iter().map(SlotTransform::model_len).sum()
    }

    /// Append a slot.
    pub fn slot(mut self, slot: SlotTransform) -> Self {
        self.slots.push(slot);
        self
    }

    /// Append a non-negative parameter (S0, diffusivity).
    pub fn positive(self) -> Self {
        self.slot(SlotTransform::Positive)
    }

    /// Append an unconstrained parameter.
    pub fn identity(self) -> Self {
        self.slot(SlotTransform::Identity)
    }

    /// Append `len` volume fractions constrained to sum to one.
    pub fn simplex(self, len: usize) -> Self {
        self.slot(SlotTransform::Simplex { len })
    }

    /// Append a parameter confined to `[lo, lo + span]`.
    pub fn bounded_range(self, lo: f64, span: f64) -> Self {
        self.slot(SlotTransform::BoundedRange { lo, span })
    }

    /// Append a cylinder radius in `[RADIUS_FLOOR, RADIUS_FLOOR + RADIUS_SPAN]`.
    pub fn radius(self) -> Self {
        self.bounded_range(RADIUS_FLOOR, RADIUS_SPAN)
    }

    /// Append a parameter that copies model parameter `source`.
    pub fn tied(self, source: usize) -> Self {
        self.slot(SlotTransform::Tied { source })
    }

    /// Append the orientation pair (θ, φ), passed through unchanged.
    pub fn orientation(mut self) -> Self {
        self.orientation_index = Some(self.model_len());
        self.identity().identity()
    }

    /// Validate the pipeline and freeze it.
    pub fn build(self) -> Result<ParameterCodec> {
        let mut starts = Vec::with_capacity(self.slots.len());
        let mut model_at = 0;
        for slot in &self.slots {
            starts.push(model_at);
            model_at += slot.model_len();
        }

        for (i, slot) in self.slots.iter().enumerate() {
            match *slot {
                SlotTransform::Simplex { len } if len == 0 => {
                    return Err(FitError::Configuration(
                        "a simplex needs at least one fraction".to_string(),
                    ));
                }
                SlotTransform::BoundedRange { lo, span } if !(span > 0.0) || !lo.is_finite() || !span.is_finite() => {
                    return Err(FitError::Configuration(format!(
                        "invalid bounded range [{}, {} + {}]",
                        lo, lo, span
                    )));
                }
                SlotTransform::Tied { source } => {
                    if source >= starts[i] {
                        return Err(FitError::Configuration(format!(
                            "tied parameter at {} must follow its source {}",
                            starts[i], source
                        )));
                    }
                    let source_slot = starts
                        .iter()
                        .rposition(|&s| s <= source)
                        .map(|k| self.slots[k]);
                    if !matches!(
                        source_slot,
                        Some(SlotTransform::Positive)
                            | Some(SlotTransform::Identity)
                            | Some(SlotTransform::BoundedRange { .. })
                    ) {
                        return Err(FitError::Configuration(format!(
                            "tied parameter at {} must copy a scalar parameter, not {:?}",
                            starts[i], source_slot
                        )));
                    }
                }
                _ => {}
            }
        }

        let num_opt_params = self.slots.iter().map(SlotTransform::opt_len).sum();
        Ok(ParameterCodec {
            num_model_params: model_at,
            num_opt_params,
            orientation_index: self.orientation_index,
            slots: self.slots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// The three-compartment layout: S0, three fractions, diffusivity,
    /// θ, φ, radius, tied ball diffusivity.
    fn three_compartment_codec() -> ParameterCodec {
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

    #[test]
    fn test_counts_and_orientation() {
        let codec = three_compartment_codec();
        assert_eq!(codec.num_model_params(), 9);
        assert_eq!(codec.num_opt_params(), 7);
        assert_eq!(codec.orientation_index(), Some(5));
        assert_eq!(codec.orientation_opt_index(), Some(4));
        assert_eq!(codec.simplex_opt_ranges(), vec![1..3]);
    }

    #[test]
    fn test_encode_matches_closed_form() {
        let codec = three_compartment_codec();
        let model = array![1.0, 0.6, 0.3, 0.1, 1.7e-9, 1.5, 0.2, 2.0e-6, 1.7e-9];
        let opt = codec.encode(&model).unwrap();

        assert_relative_eq!(opt[0], 1.0);
        assert_relative_eq!(opt[1], 0.6f64.sqrt().acos(), epsilon = 1e-15);
        assert_relative_eq!(opt[2], (0.3f64 / 0.4).sqrt().acos(), epsilon = 1e-15);
        assert_relative_eq!(opt[3], 1.7e-9f64.sqrt(), max_relative = 1e-15);
        assert_eq!(opt[4], 1.5);
        assert_eq!(opt[5], 0.2);
        assert_relative_eq!(
            opt[6],
            ((2.0e-6 - 1e-7) / 20e-6f64).sqrt().acos(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_round_trip() {
        let codec = three_compartment_codec();
        let model = array![0.9, 0.5, 0.35, 0.15, 2.1e-9, 0.4, 5.9, 7.5e-6, 2.1e-9];
        let decoded = codec.decode(&codec.encode(&model).unwrap()).unwrap();
        for i in 0..model.len() {
            assert_relative_eq!(decoded[i], model[i], max_relative = 1e-12);
        }
    }

    #[test]
    fn test_tied_parameter_follows_source() {
        let codec = three_compartment_codec();
        let model = codec
            .decode(&array![1.0, 0.3, 0.9, 4.0e-5, 0.0, 0.0, 0.7])
            .unwrap();
        assert_eq!(model[8], model[4]);
        assert_relative_eq!(model[4], 1.6e-9, max_relative = 1e-12);
    }

    #[test]
    fn test_decode_is_total() {
        let codec = three_compartment_codec();
        let model = codec
            .decode(&array![-1e6, 1e6, -3.3e5, 1e6, 7.0, -7.0, 1e6])
            .unwrap();
        assert!(model.iter().all(|v| v.is_finite()));
        let sum: f64 = model.slice(ndarray::s![1..4]).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        assert!(model[7] >= RADIUS_FLOOR && model[7] <= RADIUS_FLOOR + RADIUS_SPAN);
    }

    #[test]
    fn test_dimension_mismatch() {
        let codec = three_compartment_codec();
        assert!(codec.encode(&array![1.0, 2.0]).is_err());
        assert!(codec.decode(&array![1.0]).is_err());
    }

    #[test]
    fn test_invalid_layouts() {
        // Tied parameter pointing forward.
        assert!(matches!(
            ParameterCodec::builder().tied(1).positive().build(),
            Err(FitError::Configuration(_))
        ));
        // Tied parameter copying a fraction.
        assert!(matches!(
            ParameterCodec::builder().simplex(2).tied(0).build(),
            Err(FitError::Configuration(_))
        ));
        // Tied parameter copying another tied parameter.
        assert!(matches!(
            ParameterCodec::builder().positive().tied(0).tied(1).build(),
            Err(FitError::Configuration(_))
        ));
        // Empty range.
        assert!(ParameterCodec::builder()
            .bounded_range(0.0, 0.0)
            .build()
            .is_err());
        assert!(ParameterCodec::builder().simplex(0).build().is_err());
    }
}
