//! Compartments and the multi-compartment model.
//!
//! A model vector is laid out as S0, one volume fraction per compartment,
//! then each compartment's own parameters in compartment order.

pub mod model;
pub mod signal;

pub use model::{predict_signal, CompartmentModel};

use serde::{Deserialize, Serialize};

use crate::scheme::Measurement;

/// The kinds of compartment a model can be assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompartmentKind {
    /// Diffusivity, θ, φ.
    Stick,
    /// Diffusivity, θ, φ, radius.
    Cylinder,
    /// Diffusivity.
    Ball,
    /// No parameters.
    Dot,
}

impl CompartmentKind {
    /// Number of parameters the compartment owns beyond its fraction.
    pub fn param_count(&self) -> usize {
        match self {
            CompartmentKind::Stick => 3,
            CompartmentKind::Cylinder => 4,
            CompartmentKind::Ball => 1,
            CompartmentKind::Dot => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompartmentKind::Stick => "stick",
            CompartmentKind::Cylinder => "cylinder",
            CompartmentKind::Ball => "ball",
            CompartmentKind::Dot => "dot",
        }
    }

    /// Normalised signal for one measurement given the compartment's own
    /// parameters.
    pub fn signal(&self, m: &Measurement, params: &[f64]) -> f64 {
        match self {
            CompartmentKind::Stick => signal::stick(m, params[0], params[1], params[2]),
            CompartmentKind::Cylinder => {
                signal::cylinder(m, params[0], params[1], params[2], params[3])
            }
            CompartmentKind::Ball => signal::ball(m, params[0]),
            CompartmentKind::Dot => signal::dot(m),
        }
    }
}
