//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides the black-box least-squares minimizer behind every
//! compartment fit: given residuals in optimization space and a start point it
//! returns the fitted point, its sum of squared residuals and a status.

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod step;
pub mod trust_region;

// Re-export key types
pub use algorithm::{LevenbergMarquardt, Minimizer, MinimizerOutcome};
pub use config::{DiffMethod, LmConfig};
pub use convergence::{ConvergenceCriteria, ConvergenceStatus, MinimizerStatus};
pub use step::{LmStep, StepResult};
pub use trust_region::TrustRegion;
