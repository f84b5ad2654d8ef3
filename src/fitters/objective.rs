//! The least-squares objective of a compartment fit.

use ndarray::Array1;

use crate::codec::ParameterCodec;
use crate::compartments::{predict_signal, CompartmentKind};
use crate::error::{FitError, Result};
use crate::noise::NoiseModel;
use crate::problem::Problem;
use crate::scheme::AcquisitionScheme;

/// One voxel's fitting problem, posed in optimization space.
///
/// Every evaluation decodes the optimization vector, predicts the signal for
/// the scheme and compares it with the measurements under the noise model.
pub struct CompartmentProblem<'a> {
    codec: &'a ParameterCodec,
    kinds: &'a [CompartmentKind],
    scheme: &'a AcquisitionScheme,
    measurements: &'a Array1<f64>,
    noise: NoiseModel,
}

impl<'a> CompartmentProblem<'a> {
    pub fn new(
        codec: &'a ParameterCodec,
        kinds: &'a [CompartmentKind],
        scheme: &'a AcquisitionScheme,
        measurements: &'a Array1<f64>,
        noise: NoiseModel,
    ) -> Self {
        Self {
            codec,
            kinds,
            scheme,
            measurements,
            noise,
        }
    }
}

impl Problem for CompartmentProblem<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let model = self.codec.decode(params)?;
        let predicted = predict_signal(self.kinds, &model.to_vec(), self.scheme);
        if predicted.len() != self.measurements.len() {
            return Err(FitError::DimensionMismatch(format!(
                "predicted {} measurements, voxel has {}",
                predicted.len(),
                self.measurements.len()
            )));
        }
        Ok(self.noise.residuals(&predicted, self.measurements))
    }

    fn parameter_count(&self) -> usize {
        self.codec.num_opt_params()
    }

    fn residual_count(&self) -> usize {
        self.measurements.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartments::CompartmentModel;
    use crate::scheme::Measurement;
    use ndarray::array;

    #[test]
    fn test_residuals_vanish_at_truth() {
        let scheme = AcquisitionScheme::new(vec![
            Measurement::new([0.0, 0.0, 0.0], 0.0, 0.03, 0.01).unwrap(),
            Measurement::new([1.0, 0.0, 0.0], 0.05, 0.03, 0.01).unwrap(),
            Measurement::new([0.0, 1.0, 0.0], 0.05, 0.03, 0.01).unwrap(),
        ])
        .unwrap();
        let kinds = [CompartmentKind::Ball, CompartmentKind::Dot];
        let codec = ParameterCodec::builder().positive().simplex(2).positive().build().unwrap();

        let truth = array![1.5, 0.7, 0.3, 2.0e-9];
        let measurements = CompartmentModel::new(kinds.to_vec(), truth.clone())
            .unwrap()
            .predict(&scheme);

        let problem = CompartmentProblem::new(&codec, &kinds, &scheme, &measurements, NoiseModel::Gaussian);
        assert_eq!(problem.parameter_count(), 3);
        assert_eq!(problem.residual_count(), 3);

        let cost = problem.eval_cost(&codec.encode(&truth).unwrap()).unwrap();
        assert!(cost < 1e-28);

        let shifted = problem.eval_cost(&codec.encode(&array![1.4, 0.7, 0.3, 2.0e-9]).unwrap()).unwrap();
        assert!(shifted > 1e-3);
    }
}
