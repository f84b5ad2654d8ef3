//! Utility functions and helpers for the compartment-fit library.

pub mod finite_difference;
pub mod matrix_convert;

// Re-export commonly used utilities
pub use matrix_convert::{faer_to_ndarray, ndarray_to_faer};
