//! Integration tests for the fitting pipeline
//!
//! Codec laws, multi-run selection, end-to-end fits and batch isolation.

pub mod batch;
pub mod codec_properties;
pub mod end_to_end;
pub mod le_stream;
pub mod multirun;
