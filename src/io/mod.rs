//! Stream input and result output.

pub mod le_reader;
pub mod output;

pub use le_reader::LittleEndianReader;
pub use output::{JsonLinesSink, ResultSink, TextSink};
