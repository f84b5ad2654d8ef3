//! Voxel sources.

use std::io::Read;

use ndarray::Array1;

use crate::error::{FitError, Result};
use crate::io::LittleEndianReader;

/// A stream of voxels, each one measurement vector.
pub trait VoxelSource {
    /// Whether another voxel is available.
    fn has_next(&mut self) -> bool;

    /// The next voxel. Errors once the source is exhausted.
    fn next_voxel(&mut self) -> Result<Array1<f64>>;
}

/// Voxels held in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    voxels: Vec<Array1<f64>>,
    next: usize,
}

impl InMemorySource {
    pub fn new(voxels: Vec<Array1<f64>>) -> Self {
        Self { voxels, next: 0 }
    }
}

impl VoxelSource for InMemorySource {
    fn has_next(&mut self) -> bool {
        self.next < self.voxels.len()
    }

    fn next_voxel(&mut self) -> Result<Array1<f64>> {
        let voxel = self
            .voxels
            .get(self.next)
            .cloned()
            .ok_or_else(|| FitError::InvalidInput("no more voxels".to_string()))?;
        self.next += 1;
        Ok(voxel)
    }
}

/// Byte order of binary voxel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Element type of binary voxel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    F32,
    F64,
}

impl Precision {
    fn size(&self) -> usize {
        match self {
            Precision::F32 => 4,
            Precision::F64 => 8,
        }
    }
}

/// Fixed-length voxel records of raw floats, one record after the other.
pub struct BinaryVoxelSource<R> {
    reader: R,
    components: usize,
    precision: Precision,
    order: ByteOrder,
    pending: Option<Result<Array1<f64>>>,
    exhausted: bool,
}

impl<R: Read> BinaryVoxelSource<R> {
    /// Read records of `components` values each.
    pub fn new(reader: R, components: usize, precision: Precision, order: ByteOrder) -> Result<Self> {
        if components == 0 {
            return Err(FitError::Configuration(
                "voxel records need at least one component".to_string(),
            ));
        }
        Ok(Self {
            reader,
            components,
            precision,
            order,
            pending: None,
            exhausted: false,
        })
    }

    /// Read one record. `None` on a clean end of stream.
    fn read_record(&mut self) -> Option<Result<Array1<f64>>> {
        let mut buf = vec![0u8; self.components * self.precision.size()];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
        if filled == 0 {
            return None;
        }
        if filled < buf.len() {
            return Some(Err(FitError::Format(format!(
                "truncated voxel record: {} of {} bytes",
                filled,
                buf.len()
            ))));
        }
        Some(self.decode(&buf))
    }

    fn decode(&self, buf: &[u8]) -> Result<Array1<f64>> {
        match self.order {
            ByteOrder::Little => {
                let mut le = LittleEndianReader::new(buf);
                (0..self.components)
                    .map(|_| match self.precision {
                        Precision::F32 => le.read_f32().map(f64::from),
                        Precision::F64 => le.read_f64(),
                    })
                    .collect()
            }
            ByteOrder::Big => Ok(buf
                .chunks_exact(self.precision.size())
                .map(|chunk| match self.precision {
                    Precision::F32 => f64::from(f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
                    Precision::F64 => f64::from_be_bytes([
                        chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
                    ]),
                })
                .collect()),
        }
    }
}

impl<R: Read> VoxelSource for BinaryVoxelSource<R> {
    fn has_next(&mut self) -> bool {
        if self.pending.is_none() && !self.exhausted {
            self.pending = self.read_record();
            self.exhausted = self.pending.is_none();
        }
        self.pending.is_some()
    }

    fn next_voxel(&mut self) -> Result<Array1<f64>> {
        if !self.has_next() {
            return Err(FitError::InvalidInput("no more voxels".to_string()));
        }
        match self.pending.take() {
            Some(voxel) => voxel,
            None => Err(FitError::InvalidInput("no more voxels".to_string())),
        }
    }
}
