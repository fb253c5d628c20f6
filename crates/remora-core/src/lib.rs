//! # remora-core
//!
//! A library for surgically editing schema-less Protocol Buffer payloads and
//! resolving symbolic roles inside obfuscated class indexes.
//!
//! This crate provides the core functionality for:
//! - Reading arbitrary protobuf wire-format buffers without a `.proto` schema
//! - Applying targeted field-level edits that leave every untouched byte intact
//! - Synthesizing new wire buffers from scratch
//! - Mapping "which obfuscated class/field plays role X in this build" from
//!   structural and constant-string heuristics
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`codec`]: wire format parsing, editing and construction
//! - [`mapper`]: class index model and the declarative mapping engine
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use remora_core::{Editor, Reader};
//! use remora_core::mapper::{ClassIndex, MappingEngine};
//! use std::fs;
//!
//! // Rewrite an intercepted payload
//! let payload = fs::read("./captures/send_update.bin")?;
//! let mut editor = Editor::new(payload);
//! editor.edit(&[1], |scope| {
//!     scope.remove(7);
//!     scope.add_varint(7, 1_691_000_000_000);
//! });
//! let rewritten = editor.into_bytes();
//! assert!(Reader::new(rewritten).contains_path(&[1, 7]));
//!
//! // Resolve symbolic roles against a disassembled class index
//! let index = ClassIndex::load("./captures/classes.json")?;
//! let mappings = MappingEngine::with_default_mappers().run(&index);
//! for warning in mappings.warnings() {
//!     eprintln!("{warning}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Failure model
//!
//! The host app's wire layout and class layout are unversioned and change
//! release to release. Absence is therefore routine: codec reads return
//! `Option`, and mapper slots that no rule resolves stay empty and surface
//! as warnings, never as crashes.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod codec;
pub mod error;
pub mod mapper;

// Re-export primary types for convenience
pub use codec::{Editor, EditorScope, Reader, WireType, WireValue, Writer};
pub use error::{Error, Result};
pub use mapper::{ClassIndex, ClassMapper, MappingEngine, MappingResult, SlotTable};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = codec::MAX_VALID_NUMBER;
