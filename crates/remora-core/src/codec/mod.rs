//! Schema-less protobuf wire codec.
//!
//! This module reads, edits, and synthesizes Protocol Buffers wire-format
//! buffers without any `.proto` schema. Fields are addressed by *field
//! path*: an ordered list of field numbers descending through nested
//! length-delimited submessages, e.g. `[11, 5, 2]` is "field 11 of the
//! root, field 5 of that submessage, field 2 of that".
//!
//! ## Components
//!
//! - [`Reader`]: parse a buffer and answer path-addressed read queries
//! - [`Editor`]: apply targeted field edits while leaving every untouched
//!   field byte-for-byte intact
//! - [`Writer`]: build a new buffer from scratch
//!
//! ## Example
//!
//! ```
//! use remora_core::{Editor, Reader, Writer};
//!
//! // Synthesize {1: varint(5), 2: {1: "hello"}}
//! let mut writer = Writer::new();
//! writer.add_varint(1, 5);
//! writer.from(2, |w| w.add_string(1, "hello"));
//! let buffer = writer.into_bytes();
//!
//! // Rewrite the nested string, leave everything else alone
//! let mut editor = Editor::new(buffer);
//! editor.edit(&[2], |scope| {
//!     scope.remove(1);
//!     scope.add_string(1, "world");
//! });
//!
//! let reader = Reader::new(editor.into_bytes());
//! assert_eq!(reader.get_varint(&[1]), Some(5));
//! assert_eq!(reader.get_string(&[2, 1]), Some("world".to_string()));
//! ```

mod editor;
mod reader;
mod wire;
mod writer;

pub use editor::{Editor, EditorScope};
pub use reader::Reader;
pub use wire::{
    decode_field, decode_varint, encode_tag, encode_varint, WireType, WireValue, MAX_VALID_NUMBER,
};
pub use writer::Writer;
