//! From-scratch construction of protobuf wire buffers.
//!
//! A [`Writer`] appends encoded fields to a growing buffer. Nested
//! messages are opened with [`Writer::from`], which runs a closure against
//! a child writer and wraps its output in a length-delimited field. This is
//! how entirely new payloads are synthesized when there is no original
//! buffer to edit.

use crate::codec::wire::{encode_tag, encode_varint, WireType, WireValue};
use bytes::Bytes;

/// An append-only encoder for one protobuf message scope.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a length-delimited field and nests writer calls inside it.
    ///
    /// The closure receives a child writer for the submessage body; an
    /// empty body encodes as a zero-length field, which some host payloads
    /// use as a presence marker.
    pub fn from(&mut self, field_number: u32, f: impl FnOnce(&mut Writer)) {
        let mut child = Writer::new();
        f(&mut child);
        self.add_bytes(field_number, child.buf);
    }

    /// Appends a varint field with a raw unsigned value.
    pub fn add_varint(&mut self, field_number: u32, value: u64) {
        encode_tag(field_number, WireType::Varint, &mut self.buf);
        encode_varint(value, &mut self.buf);
    }

    /// Appends a 32-bit fixed-width field from raw bits.
    pub fn add_fixed32(&mut self, field_number: u32, value: u32) {
        encode_tag(field_number, WireType::I32, &mut self.buf);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a 64-bit fixed-width field from raw bits.
    pub fn add_fixed64(&mut self, field_number: u32, value: u64) {
        encode_tag(field_number, WireType::I64, &mut self.buf);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a length-delimited field containing a UTF-8 string.
    pub fn add_string(&mut self, field_number: u32, value: impl AsRef<str>) {
        self.add_bytes(field_number, value.as_ref().as_bytes().to_vec());
    }

    /// Appends a length-delimited field containing raw bytes.
    pub fn add_bytes(&mut self, field_number: u32, value: impl AsRef<[u8]>) {
        let value = value.as_ref();
        encode_tag(field_number, WireType::Len, &mut self.buf);
        encode_varint(value.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(value);
    }

    /// Appends an already-decoded wire value under the given field number.
    ///
    /// Length-delimited payloads are written back verbatim, which is what
    /// keeps untouched fields byte-identical across an edit pass.
    pub fn add_value(&mut self, field_number: u32, value: &WireValue) {
        value.encode(field_number, &mut self.buf);
    }

    /// Returns the encoded bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the writer and returns the encoded buffer.
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}
