//! Little-endian primitive reading.
//!
//! Mirrors the big-endian `DataInput` family of readers but with the byte
//! order reversed for every multi-byte value. Strings are the exception:
//! [`LittleEndianReader::read_utf`] keeps the big-endian length prefix of the
//! modified UTF-8 format.

use std::io::{self, Read};

use crate::error::{FitError, Result};

/// Reads primitives stored in little-endian byte order.
#[derive(Debug)]
pub struct LittleEndianReader<R> {
    inner: R,
}

impl<R: Read> LittleEndianReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Any non-zero byte is true.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.bytes()?))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(u8::from_le_bytes(self.bytes()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.bytes()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.bytes()?))
    }

    /// One UTF-16 code unit.
    pub fn read_char(&mut self) -> Result<u16> {
        self.read_u16()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.bytes()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.bytes()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_i32()? as u32))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }

    /// A modified UTF-8 string: a big-endian u16 byte count followed by one-,
    /// two- or three-byte sequences, each yielding one UTF-16 code unit.
    pub fn read_utf(&mut self) -> Result<String> {
        let len = u16::from_be_bytes(self.bytes()?) as usize;
        let mut units: Vec<u16> = Vec::with_capacity(len);
        let mut read = 0;

        while read < len {
            let c1 = self.read_u8()? as u16;
            match c1 >> 4 {
                0..=7 => {
                    read += 1;
                    units.push(c1);
                }
                12 | 13 => {
                    read += 2;
                    if read > len {
                        return Err(malformed("two-byte sequence crosses the end of the string"));
                    }
                    let c2 = continuation(self.read_u8()?)?;
                    units.push(((c1 & 0x1F) << 6) | c2);
                }
                14 => {
                    read += 3;
                    if read > len {
                        return Err(malformed("three-byte sequence crosses the end of the string"));
                    }
                    let c2 = continuation(self.read_u8()?)?;
                    let c3 = continuation(self.read_u8()?)?;
                    units.push(((c1 & 0x0F) << 12) | (c2 << 6) | c3);
                }
                _ => return Err(malformed("invalid leading byte")),
            }
        }

        String::from_utf16(&units).map_err(|_| malformed("unpaired surrogate"))
    }

    /// Discard exactly `n` bytes.
    pub fn skip_bytes(&mut self, n: u64) -> Result<()> {
        let skipped = io::copy(&mut self.inner.by_ref().take(n), &mut io::sink())?;
        if skipped < n {
            return Err(FitError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("skipped {} of {} bytes", skipped, n),
            )));
        }
        Ok(())
    }

    /// Fill `buf` completely.
    pub fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        Ok(())
    }
}

fn continuation(byte: u8) -> Result<u16> {
    if byte & 0xC0 != 0x80 {
        return Err(malformed("invalid continuation byte"));
    }
    Ok((byte & 0x3F) as u16)
}

fn malformed(what: &str) -> FitError {
    FitError::Format(format!("malformed modified UTF-8: {}", what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        let bytes = [0x01, 0x02, 0xFE, 0xFF, 0x78, 0x56, 0x34, 0x12, 0xFF];
        let mut r = LittleEndianReader::new(&bytes[..]);
        assert_eq!(r.read_u16().unwrap(), 0x0201);
        assert_eq!(r.read_i16().unwrap(), -2);
        assert_eq!(r.read_i32().unwrap(), 0x1234_5678);
        assert_eq!(r.read_i8().unwrap(), -1);
        assert!(matches!(r.read_u8(), Err(FitError::Io(_))));
    }

    #[test]
    fn test_floats() {
        let mut bytes = 1.5f32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(-2.25f64).to_le_bytes());
        let mut r = LittleEndianReader::new(&bytes[..]);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_f64().unwrap(), -2.25);
    }

    #[test]
    fn test_utf() {
        // "aé€" plus the two-byte encoding of NUL.
        let bytes = [0x00, 0x08, b'a', 0xC3, 0xA9, 0xE2, 0x82, 0xAC, 0xC0, 0x80];
        let mut r = LittleEndianReader::new(&bytes[..]);
        assert_eq!(r.read_utf().unwrap(), "aé€\0");
    }

    #[test]
    fn test_malformed_utf() {
        let bad_continuation = [0x00, 0x02, 0xC3, 0x29];
        assert!(matches!(
            LittleEndianReader::new(&bad_continuation[..]).read_utf(),
            Err(FitError::Format(_))
        ));

        let truncated_sequence = [0x00, 0x02, 0xE2, 0x82, 0xAC];
        assert!(matches!(
            LittleEndianReader::new(&truncated_sequence[..]).read_utf(),
            Err(FitError::Format(_))
        ));

        let bad_lead = [0x00, 0x01, 0x80];
        assert!(LittleEndianReader::new(&bad_lead[..]).read_utf().is_err());
    }

    #[test]
    fn test_skip_and_read_fully() {
        let bytes = [1u8, 2, 3, 4, 5];
        let mut r = LittleEndianReader::new(&bytes[..]);
        r.skip_bytes(2).unwrap();
        let mut buf = [0u8; 2];
        r.read_fully(&mut buf).unwrap();
        assert_eq!(buf, [3, 4]);
        assert!(r.skip_bytes(2).is_err());
    }
}
