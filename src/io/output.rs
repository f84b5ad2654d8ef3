//! Result sinks.

use std::io::Write;

use crate::error::Result;
use crate::fitters::FitResult;

/// Receives one fit result per voxel, in voxel order.
pub trait ResultSink {
    fn write_result(&mut self, voxel: usize, result: &FitResult) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One whitespace-separated line per voxel: status code, model parameters,
/// objective.
#[derive(Debug)]
pub struct TextSink<W> {
    writer: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for TextSink<W> {
    fn write_result(&mut self, _voxel: usize, result: &FitResult) -> Result<()> {
        let mut line = result.status.code().to_string();
        for p in result.params.iter() {
            line.push(' ');
            line.push_str(&format!("{:e}", p));
        }
        line.push_str(&format!(" {:e}", result.objective));
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(serde::Serialize)]
struct Record<'a> {
    voxel: usize,
    #[serde(flatten)]
    result: &'a FitResult,
}

/// One JSON object per line, the voxel index alongside the result fields.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    fn write_result(&mut self, voxel: usize, result: &FitResult) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &Record { voxel, result })?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every result in memory.
impl ResultSink for Vec<FitResult> {
    fn write_result(&mut self, _voxel: usize, result: &FitResult) -> Result<()> {
        self.push(result.clone());
        Ok(())
    }
}
