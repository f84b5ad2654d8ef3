//! The multi-compartment model: compartment kinds plus the current vector.

use ndarray::Array1;

use super::CompartmentKind;
use crate::error::{FitError, Result};
use crate::scheme::AcquisitionScheme;

/// An ordered list of compartments and the model parameter vector that
/// describes them.
#[derive(Debug, Clone, PartialEq)]
pub struct CompartmentModel {
    kinds: Vec<CompartmentKind>,
    params: Array1<f64>,
}

impl CompartmentModel {
    /// Number of model parameters `kinds` require.
    pub fn expected_len(kinds: &[CompartmentKind]) -> usize {
        1 + kinds.len() + kinds.iter().map(CompartmentKind::param_count).sum::<usize>()
    }

    /// Create a model from its kinds and an initial vector.
    ///
    /// # Errors
    ///
    /// `Configuration` if there are no compartments or the vector length
    /// does not match the kinds.
    pub fn new(kinds: Vec<CompartmentKind>, params: Array1<f64>) -> Result<Self> {
        if kinds.is_empty() {
            return Err(FitError::Configuration(
                "a model needs at least one compartment".to_string(),
            ));
        }
        check_len(&kinds, params.len())?;
        Ok(Self { kinds, params })
    }

    pub fn kinds(&self) -> &[CompartmentKind] {
        &self.kinds
    }

    pub fn params(&self) -> &Array1<f64> {
        &self.params
    }

    /// Replace the whole parameter vector. Leaves the model untouched on
    /// error.
    pub fn set_params(&mut self, params: Array1<f64>) -> Result<()> {
        check_len(&self.kinds, params.len())?;
        self.params = params;
        Ok(())
    }

    pub fn s0(&self) -> f64 {
        self.params[0]
    }

    /// Volume fractions in compartment order.
    pub fn fractions(&self) -> Array1<f64> {
        self.params.slice(ndarray::s![1..1 + self.kinds.len()]).to_owned()
    }

    /// Predicted signal for every measurement of `scheme`.
    pub fn predict(&self, scheme: &AcquisitionScheme) -> Array1<f64> {
        predict_signal(&self.kinds, &self.params.to_vec(), scheme)
    }
}

fn check_len(kinds: &[CompartmentKind], len: usize) -> Result<()> {
    let expected = CompartmentModel::expected_len(kinds);
    if len != expected {
        return Err(FitError::Configuration(format!(
            "compartments {:?} need {} parameters, got {}",
            kinds.iter().map(CompartmentKind::name).collect::<Vec<_>>(),
            expected,
            len
        )));
    }
    Ok(())
}

/// `S0 · Σ fᵢ · signalᵢ` for every measurement.
///
/// `params` must have the layout [`CompartmentModel::expected_len`]
/// describes for `kinds`.
pub fn predict_signal(kinds: &[CompartmentKind], params: &[f64], scheme: &AcquisitionScheme) -> Array1<f64> {
    let s0 = params[0];
    let fractions = &params[1..1 + kinds.len()];

    let mut own = Vec::with_capacity(kinds.len());
    let mut at = 1 + kinds.len();
    for kind in kinds {
        own.push(&params[at..at + kind.param_count()]);
        at += kind.param_count();
    }

    scheme
        .measurements()
        .iter()
        .map(|m| {
            s0 * kinds
                .iter()
                .zip(fractions)
                .zip(&own)
                .map(|((kind, f), p)| f * kind.signal(m, p))
                .sum::<f64>()
        })
        .collect()
}
