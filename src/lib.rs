//! # compartment-fit
//!
//! `compartment-fit` fits multi-compartment models of tissue microstructure to
//! diffusion-MRI measurements, one voxel at a time.
//!
//! The library provides:
//! - A parameter codec that turns a physically constrained model vector
//!   (positive S0 and diffusivities, volume fractions on a simplex, bounded
//!   radius, tied parameters) into an unconstrained one
//! - A Levenberg-Marquardt minimizer behind a `Minimizer` trait
//! - Multi-run minimization that keeps the best of several starts
//! - Ball-stick, ball-cylinder and ball-cylinder-dot fitters, each starting
//!   from the fit of the simpler model below it
//! - Voxel sources, result sinks and sequential or parallel batch fitting
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use compartment_fit::{AcquisitionScheme, BallStickFitter, CompartmentFitter, FitterConfig};
//! use ndarray::array;
//!
//! let scheme = Arc::new(AcquisitionScheme::load("protocol.scheme")?);
//! let fitter = BallStickFitter::new(scheme, FitterConfig::default().with_runs(3))?;
//!
//! let result = fitter.fit(&array![1.0, 0.42, 0.61, 0.55, 0.38, 0.47, 0.52])?;
//! println!("status {:?}, S0 {}", result.status, result.params[0]);
//! # Ok::<(), compartment_fit::FitError>(())
//! ```

pub mod codec;
pub mod compartments;
pub mod error;
pub mod fitters;
pub mod io;
pub mod lm;
pub mod multirun;
pub mod noise;
pub mod problem;
pub mod scheme;
pub mod utils;
pub mod voxel;

// Re-exports for convenience
pub use codec::ParameterCodec;
pub use compartments::{CompartmentKind, CompartmentModel};
pub use error::{FitError, Result};
pub use fitters::{
    BallCylinderDotFitter, BallCylinderFitter, BallStickFitter, CompartmentFitter, FitResult,
    FitterConfig,
};
pub use lm::{LevenbergMarquardt, LmConfig, Minimizer, MinimizerStatus};
pub use multirun::MultiRunMinimizer;
pub use noise::NoiseModel;
pub use problem::Problem;
pub use scheme::{AcquisitionScheme, Measurement};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
