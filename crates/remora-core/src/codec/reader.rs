//! Schema-less reading of protobuf wire buffers.
//!
//! A [`Reader`] parses one wire buffer into its top-level `(field number,
//! value)` pairs and answers read queries addressed by field path. Nested
//! messages are not decoded until a path descends into them, so unknown
//! length-delimited payloads stay opaque.
//!
//! All reads return `Option`: the host format is unversioned and unknown,
//! so a missing field (or a field of an unexpected wire type) is a routine
//! condition the caller is expected to guard, not an error.

use crate::codec::wire::{decode_field, WireValue};
use bytes::Bytes;
use tracing::trace;

/// A parsed view over one protobuf wire buffer.
///
/// Construction is lenient: parsing stops at the first structurally invalid
/// byte and keeps every field decoded up to that point. A buffer that is
/// not a protobuf message at all simply yields a reader with no fields.
#[derive(Debug, Clone)]
pub struct Reader {
    data: Bytes,
    fields: Vec<(u32, WireValue)>,
    consumed: usize,
}

impl Reader {
    /// Parses a wire buffer into a reader.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mut fields = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            match decode_field(&data, offset) {
                Ok((field_number, value, next)) => {
                    fields.push((field_number, value));
                    offset = next;
                }
                Err(e) => {
                    trace!("stopping parse at offset {}: {}", offset, e);
                    break;
                }
            }
        }

        Self {
            data,
            fields,
            consumed: offset,
        }
    }

    /// Returns how many leading bytes parsed as valid fields.
    ///
    /// Anything short of the buffer length means the tail was structurally
    /// invalid and was ignored.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Returns the raw backing bytes of this reader's scope.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the raw backing bytes as a cheap owned handle.
    pub fn to_bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Returns the number of decoded top-level fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no fields were decoded.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates every top-level `(field number, value)` pair in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &WireValue)> + '_ {
        self.fields.iter().map(|(number, value)| (*number, value))
    }

    /// Returns true if the given field number occurs at top level.
    pub fn contains(&self, field_number: u32) -> bool {
        self.fields.iter().any(|(number, _)| *number == field_number)
    }

    /// Returns the number of top-level occurrences of the given field.
    pub fn get_count(&self, field_number: u32) -> usize {
        self.fields
            .iter()
            .filter(|(number, _)| *number == field_number)
            .count()
    }

    /// Returns the first top-level occurrence of the given field.
    pub fn first(&self, field_number: u32) -> Option<&WireValue> {
        self.fields
            .iter()
            .find(|(number, _)| *number == field_number)
            .map(|(_, value)| value)
    }

    /// Iterates all top-level occurrences of the given field.
    pub fn values(&self, field_number: u32) -> impl Iterator<Item = &WireValue> + '_ {
        self.fields
            .iter()
            .filter(move |(number, _)| *number == field_number)
            .map(|(_, value)| value)
    }

    /// Returns a sub-reader scoped to the submessage at `path`.
    ///
    /// Descends through the first occurrence of each path segment. Yields
    /// `None` the moment a segment is absent or not length-delimited. An
    /// empty path returns a copy of this reader.
    pub fn follow_path(&self, path: &[u32]) -> Option<Reader> {
        let mut current = self.clone();
        for &field_number in path {
            let payload = current.first(field_number)?.as_bytes()?.clone();
            current = Reader::new(payload);
        }
        Some(current)
    }

    /// Returns true if the full path resolves to at least one field.
    pub fn contains_path(&self, path: &[u32]) -> bool {
        match path.split_last() {
            Some((&last, parents)) => self
                .follow_path(parents)
                .is_some_and(|reader| reader.contains(last)),
            None => true,
        }
    }

    /// Reads the varint field at `path` as a raw unsigned value.
    ///
    /// No zigzag decoding is applied; callers reinterpret sign themselves
    /// when a field is known to be zigzag-encoded.
    pub fn get_varint(&self, path: &[u32]) -> Option<u64> {
        self.leaf(path)?.as_varint()
    }

    /// Reads the 32-bit fixed-width field at `path` as raw bits.
    ///
    /// Use `f32::from_bits` to reinterpret as a float.
    pub fn get_fixed32(&self, path: &[u32]) -> Option<u32> {
        self.leaf(path)?.as_fixed32()
    }

    /// Reads the 64-bit fixed-width field at `path` as raw bits.
    pub fn get_fixed64(&self, path: &[u32]) -> Option<u64> {
        self.leaf(path)?.as_fixed64()
    }

    /// Reads the length-delimited field at `path` as a UTF-8 string.
    pub fn get_string(&self, path: &[u32]) -> Option<String> {
        let bytes = self.get_bytes(path)?;
        String::from_utf8(bytes.to_vec()).ok()
    }

    /// Reads the length-delimited field at `path` as raw bytes.
    pub fn get_bytes(&self, path: &[u32]) -> Option<Bytes> {
        self.leaf(path)?.as_bytes().cloned()
    }

    /// Invokes `f` with a reader scoped to every occurrence of the repeated
    /// length-delimited field addressed by `path`, in wire order.
    ///
    /// The last path segment names the repeated field; the leading segments
    /// are descended through their first occurrence, as in [`follow_path`].
    ///
    /// [`follow_path`]: Reader::follow_path
    pub fn each_buffer(&self, path: &[u32], mut f: impl FnMut(&Reader)) {
        let Some((&last, parents)) = path.split_last() else {
            return;
        };
        let Some(scope) = self.follow_path(parents) else {
            return;
        };
        for value in scope.values(last) {
            if let Some(payload) = value.as_bytes() {
                f(&Reader::new(payload.clone()));
            }
        }
    }

    fn leaf(&self, path: &[u32]) -> Option<WireValue> {
        let (&last, parents) = path.split_last()?;
        self.follow_path(parents)?.first(last).cloned()
    }
}
