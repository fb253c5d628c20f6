//! Surgical editing of protobuf wire buffers.
//!
//! An [`Editor`] applies targeted field-level edits to an existing buffer
//! without a schema. Each [`Editor::edit`] call parses only the scopes along
//! its path into a tagged tree, applies the closure's operations, and
//! re-serializes those scopes. Everything not on the path is carried as an
//! opaque byte range, so fields this library does not understand come back
//! byte-identical.
//!
//! Re-serialized scopes order fields by field number; length-delimited
//! payloads inside them that were not themselves edited are emitted
//! verbatim.

use crate::codec::reader::Reader;
use crate::codec::wire::WireValue;
use crate::codec::writer::Writer;
use bytes::Bytes;
use std::collections::BTreeMap;

/// An editable view over one protobuf wire buffer.
///
/// Multiple [`edit`](Editor::edit) calls compose: each one rewrites the
/// held buffer, so later edits observe earlier ones.
#[derive(Debug, Clone)]
pub struct Editor {
    buffer: Bytes,
}

impl Editor {
    /// Creates an editor over the given buffer.
    pub fn new(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: buffer.into(),
        }
    }

    /// Applies scoped edit operations at `path`.
    ///
    /// An empty path edits the root scope. Descent follows the first
    /// occurrence of each segment; missing intermediate submessages are
    /// materialized, so an edit may introduce a branch that was absent.
    /// Sibling fields of the path are not disturbed.
    pub fn edit(&mut self, path: &[u32], f: impl FnOnce(&mut EditorScope)) -> &mut Self {
        self.buffer = rebuild(&Reader::new(self.buffer.clone()), path, f);
        self
    }

    /// Returns the current (possibly edited) buffer.
    pub fn to_bytes(&self) -> Bytes {
        self.buffer.clone()
    }

    /// Consumes the editor and returns the final buffer.
    pub fn into_bytes(self) -> Bytes {
        self.buffer
    }
}

fn rebuild(reader: &Reader, path: &[u32], f: impl FnOnce(&mut EditorScope)) -> Bytes {
    let mut scope = EditorScope::from_reader(reader);
    match path.split_first() {
        Some((&field_number, rest)) => {
            let entry = scope.fields.entry(field_number).or_default();
            let child = entry
                .first()
                .and_then(WireValue::as_bytes)
                .cloned()
                .unwrap_or_default();
            let rebuilt = rebuild(&Reader::new(child), rest, f);
            if let Some(first) = entry.first_mut() {
                *first = WireValue::Len(rebuilt);
            } else {
                entry.push(WireValue::Len(rebuilt));
            }
        }
        None => f(&mut scope),
    }
    scope.serialize()
}

/// One message scope opened by an edit, exposing the field operations.
///
/// Fields are held as a field number → occurrence list table; operations
/// append, delete, or recurse into occurrences. All `add_*` calls append a
/// new occurrence and never overwrite existing ones.
#[derive(Debug, Default)]
pub struct EditorScope {
    fields: BTreeMap<u32, Vec<WireValue>>,
}

impl EditorScope {
    fn from_reader(reader: &Reader) -> Self {
        let mut fields: BTreeMap<u32, Vec<WireValue>> = BTreeMap::new();
        for (field_number, value) in reader.iter() {
            fields.entry(field_number).or_default().push(value.clone());
        }
        Self { fields }
    }

    fn serialize(&self) -> Bytes {
        let mut writer = Writer::new();
        for (&field_number, values) in &self.fields {
            for value in values {
                writer.add_value(field_number, value);
            }
        }
        writer.into_bytes()
    }

    fn push(&mut self, field_number: u32, value: WireValue) {
        self.fields.entry(field_number).or_default().push(value);
    }

    /// Deletes all occurrences of the given field at this scope.
    ///
    /// Removing an absent field is a no-op.
    pub fn remove(&mut self, field_number: u32) {
        self.fields.remove(&field_number);
    }

    /// Returns true if the field occurs at this scope.
    pub fn contains(&self, field_number: u32) -> bool {
        self.fields
            .get(&field_number)
            .is_some_and(|values| !values.is_empty())
    }

    /// Appends a varint field with a raw unsigned value.
    pub fn add_varint(&mut self, field_number: u32, value: u64) {
        self.push(field_number, WireValue::Varint(value));
    }

    /// Appends a 32-bit fixed-width field from raw bits.
    pub fn add_fixed32(&mut self, field_number: u32, value: u32) {
        self.push(field_number, WireValue::I32(value));
    }

    /// Appends a 64-bit fixed-width field from raw bits.
    pub fn add_fixed64(&mut self, field_number: u32, value: u64) {
        self.push(field_number, WireValue::I64(value));
    }

    /// Appends a length-delimited field containing a UTF-8 string.
    pub fn add_string(&mut self, field_number: u32, value: impl AsRef<str>) {
        self.push(
            field_number,
            WireValue::Len(Bytes::copy_from_slice(value.as_ref().as_bytes())),
        );
    }

    /// Appends a length-delimited field containing raw bytes.
    pub fn add_bytes(&mut self, field_number: u32, value: impl AsRef<[u8]>) {
        self.push(
            field_number,
            WireValue::Len(Bytes::copy_from_slice(value.as_ref())),
        );
    }

    /// Opens the first occurrence of a nested submessage for editing.
    ///
    /// A missing (or non-length-delimited) occurrence starts from an empty
    /// submessage, mirroring [`Editor::edit`] path materialization.
    pub fn edit(&mut self, field_number: u32, f: impl FnOnce(&mut EditorScope)) {
        let entry = self.fields.entry(field_number).or_default();
        let child = entry
            .first()
            .and_then(WireValue::as_bytes)
            .cloned()
            .unwrap_or_default();
        let mut scope = EditorScope::from_reader(&Reader::new(child));
        f(&mut scope);
        let rebuilt = WireValue::Len(scope.serialize());
        if let Some(first) = entry.first_mut() {
            *first = rebuilt;
        } else {
            entry.push(rebuilt);
        }
    }

    /// Applies the closure to every length-delimited occurrence of the
    /// given repeated field at this scope, in occurrence order.
    pub fn edit_each(&mut self, field_number: u32, mut f: impl FnMut(&mut EditorScope)) {
        let Some(values) = self.fields.get_mut(&field_number) else {
            return;
        };
        for value in values.iter_mut() {
            let Some(payload) = value.as_bytes().cloned() else {
                continue;
            };
            let mut scope = EditorScope::from_reader(&Reader::new(payload));
            f(&mut scope);
            *value = WireValue::Len(scope.serialize());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_buffer() -> Bytes {
        // {1: varint(5), 2: {1: "hello"}}
        let mut writer = Writer::new();
        writer.add_varint(1, 5);
        writer.from(2, |w| {
            w.add_string(1, "hello");
        });
        writer.into_bytes()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut editor = Editor::new(sample_buffer());
        editor.edit(&[2], |scope| {
            scope.remove(1);
            scope.add_string(1, "world");
        });
        let reader = Reader::new(editor.into_bytes());

        assert_eq!(reader.get_string(&[2, 1]), Some("world".to_string()));
        assert_eq!(reader.get_varint(&[1]), Some(5));
    }

    #[test]
    fn test_round_trip_identity_for_untouched_paths() {
        // An opaque submessage at field 9 with a deliberately unknown layout
        let mut writer = Writer::new();
        writer.add_varint(1, 5);
        writer.from(9, |w| {
            w.add_varint(77, 12345);
            w.add_bytes(78, [0xDE, 0xAD, 0xBE, 0xEF]);
        });
        let original = writer.into_bytes();
        let untouched = Reader::new(original.clone()).get_bytes(&[9]).unwrap();

        let mut editor = Editor::new(original);
        editor.edit(&[], |scope| {
            scope.remove(1);
            scope.add_varint(1, 6);
        });
        let edited = Reader::new(editor.into_bytes());

        // The unrelated submessage comes back byte-identical
        assert_eq!(edited.get_bytes(&[9]), Some(untouched));
        assert_eq!(edited.get_varint(&[1]), Some(6));
    }

    #[test]
    fn test_idempotent_removal() {
        let once = {
            let mut editor = Editor::new(sample_buffer());
            editor.edit(&[2], |scope| scope.remove(1));
            editor.into_bytes()
        };
        let twice = {
            let mut editor = Editor::new(sample_buffer());
            editor.edit(&[2], |scope| scope.remove(1));
            editor.edit(&[2], |scope| scope.remove(1));
            editor.into_bytes()
        };
        assert_eq!(once, twice);

        // Removing a field that is already absent changes nothing
        let mut editor = Editor::new(once.clone());
        editor.edit(&[2], |scope| scope.remove(1));
        assert_eq!(editor.into_bytes(), once);
    }

    #[test]
    fn test_scoped_removal_does_not_leak() {
        // Field 5 exists both at root and inside submessage 11
        let mut writer = Writer::new();
        writer.add_varint(5, 1);
        writer.from(11, |w| {
            w.add_varint(5, 2);
            w.add_varint(6, 3);
        });
        let mut editor = Editor::new(writer.into_bytes());
        editor.edit(&[11], |scope| scope.remove(5));
        let reader = Reader::new(editor.into_bytes());

        assert_eq!(reader.get_varint(&[5]), Some(1));
        assert_eq!(reader.get_varint(&[11, 5]), None);
        assert_eq!(reader.get_varint(&[11, 6]), Some(3));
    }

    #[test]
    fn test_edit_materializes_missing_path() {
        let mut editor = Editor::new(Bytes::new());
        editor.edit(&[3, 10], |scope| {
            scope.add_varint(1, 4);
            scope.add_varint(2, 1);
        });
        let reader = Reader::new(editor.into_bytes());

        assert_eq!(reader.get_varint(&[3, 10, 1]), Some(4));
        assert_eq!(reader.get_varint(&[3, 10, 2]), Some(1));
    }

    #[test]
    fn test_nested_scope_edit() {
        let mut writer = Writer::new();
        writer.from(3, |w| {
            w.add_fixed32(2, 0x42);
            w.from(10, |w| {
                w.add_varint(1, 2);
            });
        });
        let mut editor = Editor::new(writer.into_bytes());
        editor.edit(&[3], |scope| {
            scope.remove(2);
            scope.add_fixed32(2, 0x43);
            scope.edit(10, |inner| {
                inner.remove(1);
                inner.add_varint(1, 4);
            });
        });
        let reader = Reader::new(editor.into_bytes());

        assert_eq!(reader.get_fixed32(&[3, 2]), Some(0x43));
        assert_eq!(reader.get_varint(&[3, 10, 1]), Some(4));
    }

    #[test]
    fn test_edit_each_applies_uniformly() {
        // Strip a caption field across every attachment
        let mut writer = Writer::new();
        for i in 0..3u64 {
            writer.from(1, |w| {
                w.add_varint(2, i);
                w.add_string(7, "caption");
            });
        }
        let mut editor = Editor::new(writer.into_bytes());
        editor.edit(&[], |scope| {
            scope.edit_each(1, |attachment| attachment.remove(7));
        });
        let reader = Reader::new(editor.into_bytes());

        let mut ids = Vec::new();
        reader.each_buffer(&[1], |occurrence| {
            assert!(!occurrence.contains(7));
            ids.push(occurrence.get_varint(&[2]).unwrap());
        });
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_edit_first_occurrence_keeps_siblings() {
        let mut writer = Writer::new();
        writer.from(4, |w| w.add_varint(1, 10));
        writer.from(4, |w| w.add_varint(1, 20));
        let mut editor = Editor::new(writer.into_bytes());
        editor.edit(&[4], |scope| {
            scope.remove(1);
            scope.add_varint(1, 99);
        });
        let reader = Reader::new(editor.into_bytes());

        let mut seen = Vec::new();
        reader.each_buffer(&[4], |occurrence| {
            seen.push(occurrence.get_varint(&[1]).unwrap());
        });
        assert_eq!(seen, vec![99, 20]);
    }

    #[test]
    fn test_multiple_edits_compose() {
        let mut editor = Editor::new(sample_buffer());
        editor
            .edit(&[1], |scope| {
                scope.add_fixed32(1, 0xAA);
                scope.add_fixed32(2, 0xBB);
            })
            .edit(&[3], |scope| {
                scope.add_varint(7, 1691000000);
            });
        let reader = Reader::new(editor.into_bytes());

        assert_eq!(reader.get_fixed32(&[1, 1]), Some(0xAA));
        assert_eq!(reader.get_fixed32(&[1, 2]), Some(0xBB));
        assert_eq!(reader.get_varint(&[3, 7]), Some(1691000000));
        assert_eq!(reader.get_string(&[2, 1]), Some("hello".to_string()));
    }

    #[test]
    fn test_unknown_high_field_numbers_survive() {
        let mut writer = Writer::new();
        writer.add_varint(536_870_911, 1);
        writer.add_varint(3, 2);
        let mut editor = Editor::new(writer.into_bytes());
        editor.edit(&[], |scope| scope.remove(3));
        let reader = Reader::new(editor.into_bytes());

        assert_eq!(reader.get_varint(&[536_870_911]), Some(1));
        assert_eq!(reader.get_varint(&[3]), None);
    }
}
