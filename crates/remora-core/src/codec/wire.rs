//! Low-level protobuf wire format encoding and decoding.
//!
//! This module implements the wire format primitives shared by the
//! [`Reader`](crate::Reader), [`Editor`](crate::Editor) and
//! [`Writer`](crate::Writer): varint coding, tag coding, and the tagged
//! value representation used to carry fields without a schema.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! No zigzag transformation is applied anywhere in this module: values are
//! carried as raw unsigned 64-bit integers, and callers reinterpret sign or
//! bit patterns themselves when a field is known to use them.

use crate::error::{Error, Result};
use bytes::Bytes;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::invalid_wire_format(
                0,
                format!("unknown wire type: {}", value),
            )),
        }
    }
}

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_VALID_NUMBER: u32 = 536_870_911;

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= 10 {
            // Varints are at most 10 bytes for a 64-bit value
            return Err(Error::varint_decode(i));
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::varint_decode(data.len()))
}

/// Encode a value as a varint, appending to the output buffer.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Encode a field tag (field number + wire type), appending to the output buffer.
pub fn encode_tag(field_number: u32, wire_type: WireType, out: &mut Vec<u8>) {
    encode_varint(((field_number as u64) << 3) | wire_type as u64, out);
}

/// A single decoded field value, tagged by wire type.
///
/// Length-delimited payloads are kept as opaque byte ranges so that fields
/// this library does not understand survive a re-encode untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    /// Raw unsigned varint value
    Varint(u64),
    /// 64-bit fixed-width value, as raw little-endian bits
    I64(u64),
    /// 32-bit fixed-width value, as raw little-endian bits
    I32(u32),
    /// Length-delimited payload (string, bytes, or an embedded message)
    Len(Bytes),
}

impl WireValue {
    /// Returns the wire type of this value
    pub fn wire_type(&self) -> WireType {
        match self {
            WireValue::Varint(_) => WireType::Varint,
            WireValue::I64(_) => WireType::I64,
            WireValue::I32(_) => WireType::I32,
            WireValue::Len(_) => WireType::Len,
        }
    }

    /// Returns the varint value, if this is a varint field
    pub fn as_varint(&self) -> Option<u64> {
        match self {
            WireValue::Varint(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the raw 64-bit value, if this is a fixed64 field
    pub fn as_fixed64(&self) -> Option<u64> {
        match self {
            WireValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the raw 32-bit value, if this is a fixed32 field
    pub fn as_fixed32(&self) -> Option<u32> {
        match self {
            WireValue::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the length-delimited payload, if this is a LEN field
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            WireValue::Len(b) => Some(b),
            _ => None,
        }
    }

    /// Encode this value with its tag, appending to the output buffer.
    pub fn encode(&self, field_number: u32, out: &mut Vec<u8>) {
        encode_tag(field_number, self.wire_type(), out);
        match self {
            WireValue::Varint(v) => encode_varint(*v, out),
            WireValue::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
            WireValue::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
            WireValue::Len(b) => {
                encode_varint(b.len() as u64, out);
                out.extend_from_slice(b);
            }
        }
    }
}

/// Decode a single field starting at `offset` within `data`.
///
/// Returns the field number, the decoded value, and the offset just past
/// the field. Group wire types are rejected: the host formats this library
/// targets do not emit them.
pub fn decode_field(data: &Bytes, offset: usize) -> Result<(u32, WireValue, usize)> {
    let remaining = &data[offset..];
    if remaining.is_empty() {
        return Err(Error::invalid_wire_format(offset, "empty data"));
    }

    let (tag, tag_len) = decode_varint(remaining)
        .map_err(|_| Error::invalid_wire_format(offset, "failed to decode field tag"))?;

    let wire_type = WireType::try_from((tag & 0x07) as u8)?;
    let field_number = (tag >> 3) as u32;

    if field_number == 0 || field_number > MAX_VALID_NUMBER {
        return Err(Error::InvalidFieldNumber {
            number: field_number,
            max: MAX_VALID_NUMBER,
        });
    }

    let mut position = offset + tag_len;
    let value = match wire_type {
        WireType::Varint => {
            let (value, varint_len) = decode_varint(&data[position..])
                .map_err(|_| Error::varint_decode(position))?;
            position += varint_len;
            WireValue::Varint(value)
        }
        WireType::I64 => {
            if data.len() < position + 8 {
                return Err(Error::invalid_wire_format(
                    position,
                    "not enough bytes for I64",
                ));
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&data[position..position + 8]);
            position += 8;
            WireValue::I64(u64::from_le_bytes(raw))
        }
        WireType::I32 => {
            if data.len() < position + 4 {
                return Err(Error::invalid_wire_format(
                    position,
                    "not enough bytes for I32",
                ));
            }
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&data[position..position + 4]);
            position += 4;
            WireValue::I32(u32::from_le_bytes(raw))
        }
        WireType::Len => {
            let (length, length_varint_len) = decode_varint(&data[position..])
                .map_err(|_| Error::invalid_wire_format(position, "failed to decode length prefix"))?;
            position += length_varint_len;

            let end = position
                .checked_add(length as usize)
                .filter(|&end| end <= data.len())
                .ok_or_else(|| {
                    Error::invalid_wire_format(
                        position,
                        format!(
                            "not enough bytes for LEN field (need {}, have {})",
                            length,
                            data.len() - position
                        ),
                    )
                })?;

            let payload = data.slice(position..end);
            position = end;
            WireValue::Len(payload)
        }
        WireType::StartGroup | WireType::EndGroup => {
            return Err(Error::invalid_wire_format(
                offset,
                "group wire types are not supported",
            ));
        }
    };

    Ok((field_number, value, position))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_varint_single_byte() {
        let data = [0x08]; // Value 8
        let (value, len) = decode_varint(&data).unwrap();
        assert_eq!(value, 8);
        assert_eq!(len, 1);
    }

    #[test]
    fn test_decode_varint_multi_byte() {
        let data = [0xAC, 0x02]; // Value 300
        let (value, len) = decode_varint(&data).unwrap();
        assert_eq!(value, 300);
        assert_eq!(len, 2);
    }

    #[test]
    fn test_decode_varint_max() {
        // Maximum 64-bit varint (all 1s)
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let (value, len) = decode_varint(&data).unwrap();
        assert_eq!(value, u64::MAX);
        assert_eq!(len, 10);
    }

    #[test]
    fn test_varint_round_trip_boundaries() {
        for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, (1 << 63) - 1, u64::MAX] {
            let mut out = Vec::new();
            encode_varint(value, &mut out);
            let (decoded, len) = decode_varint(&out).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(len, out.len());
        }
    }

    #[test]
    fn test_truncated_varint() {
        // Continuation bit set on the final byte
        let data = [0xFF, 0xFF];
        assert!(decode_varint(&data).is_err());
    }

    #[test]
    fn test_wire_type_conversion() {
        assert_eq!(WireType::try_from(0).unwrap(), WireType::Varint);
        assert_eq!(WireType::try_from(1).unwrap(), WireType::I64);
        assert_eq!(WireType::try_from(2).unwrap(), WireType::Len);
        assert_eq!(WireType::try_from(5).unwrap(), WireType::I32);
        assert!(WireType::try_from(6).is_err());
    }

    #[test]
    fn test_decode_varint_field() {
        // Field 1, wire type 0 (varint), value 150
        let data = Bytes::from_static(&[0x08, 0x96, 0x01]);
        let (field_num, value, end) = decode_field(&data, 0).unwrap();
        assert_eq!(field_num, 1);
        assert_eq!(value, WireValue::Varint(150));
        assert_eq!(end, 3);
    }

    #[test]
    fn test_decode_len_field() {
        // Field 1, wire type 2 (len), length 5, "hello"
        let data = Bytes::from_static(&[0x0A, 0x05, b'h', b'e', b'l', b'l', b'o']);
        let (field_num, value, end) = decode_field(&data, 0).unwrap();
        assert_eq!(field_num, 1);
        assert_eq!(value, WireValue::Len(Bytes::from_static(b"hello")));
        assert_eq!(end, 7);
    }

    #[test]
    fn test_decode_fixed32_field() {
        // Field 1, wire type 5 (I32), 4 bytes little-endian
        let data = Bytes::from_static(&[0x0D, 0x01, 0x02, 0x03, 0x04]);
        let (field_num, value, end) = decode_field(&data, 0).unwrap();
        assert_eq!(field_num, 1);
        assert_eq!(value, WireValue::I32(0x04030201));
        assert_eq!(end, 5);
    }

    #[test]
    fn test_decode_fixed64_field() {
        // Field 1, wire type 1 (I64), 8 bytes little-endian
        let data = Bytes::from_static(&[0x09, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        let (field_num, value, end) = decode_field(&data, 0).unwrap();
        assert_eq!(field_num, 1);
        assert_eq!(value, WireValue::I64(0x0807060504030201));
        assert_eq!(end, 9);
    }

    #[test]
    fn test_len_field_past_end_of_buffer() {
        // Field 1, wire type 2, claims 100 bytes but only 2 remain
        let data = Bytes::from_static(&[0x0A, 0x64, 0x01, 0x02]);
        assert!(decode_field(&data, 0).is_err());
    }

    #[test]
    fn test_invalid_field_number() {
        // Field 0 is invalid
        let data = Bytes::from_static(&[0x00, 0x01]);
        assert!(decode_field(&data, 0).is_err());
    }

    #[test]
    fn test_value_encode_round_trip() {
        let values = [
            WireValue::Varint(300),
            WireValue::I64(u64::MAX),
            WireValue::I32(0xDEADBEEF),
            WireValue::Len(Bytes::from_static(b"payload")),
        ];
        for value in values {
            let mut out = Vec::new();
            value.encode(7, &mut out);
            let data = Bytes::from(out);
            let (field_num, decoded, end) = decode_field(&data, 0).unwrap();
            assert_eq!(field_num, 7);
            assert_eq!(decoded, value);
            assert_eq!(end, data.len());
        }
    }
}
