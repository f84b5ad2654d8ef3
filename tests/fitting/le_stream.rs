//! Little-endian stream reading of a mixed record.

use compartment_fit::error::FitError;
use compartment_fit::io::LittleEndianReader;

#[test]
fn mixed_record_reads_in_order() {
    let mut bytes = Vec::new();
    bytes.push(1u8);
    bytes.extend_from_slice(&(-12345i16).to_le_bytes());
    bytes.extend_from_slice(&0x00E9u16.to_le_bytes());
    bytes.extend_from_slice(&(-7i32).to_le_bytes());
    bytes.extend_from_slice(&i64::MIN.to_le_bytes());
    bytes.extend_from_slice(&3.25f32.to_le_bytes());
    bytes.extend_from_slice(&std::f64::consts::PI.to_le_bytes());
    // Modified UTF-8 keeps a big-endian length prefix.
    bytes.extend_from_slice(&[0x00, 0x05, b'v', b'o', b'x', 0xC2, 0xB5]);
    bytes.extend_from_slice(&[0xAA; 3]);
    bytes.push(0x2A);

    let mut r = LittleEndianReader::new(&bytes[..]);
    assert!(r.read_bool().unwrap());
    assert_eq!(r.read_i16().unwrap(), -12345);
    assert_eq!(char::from_u32(r.read_char().unwrap() as u32), Some('é'));
    assert_eq!(r.read_i32().unwrap(), -7);
    assert_eq!(r.read_i64().unwrap(), i64::MIN);
    assert_eq!(r.read_f32().unwrap(), 3.25);
    assert_eq!(r.read_f64().unwrap(), std::f64::consts::PI);
    assert_eq!(r.read_utf().unwrap(), "voxµ");
    r.skip_bytes(3).unwrap();
    assert_eq!(r.read_u8().unwrap(), 42);
    assert!(matches!(r.read_u8(), Err(FitError::Io(_))));
}

#[test]
fn end_of_stream_inside_a_value_is_an_error() {
    let bytes = [0x01, 0x02, 0x03];
    let mut r = LittleEndianReader::new(&bytes[..]);
    assert!(r.read_i32().is_err());
}
