//! Disassembled class index model.
//!
//! The mapper consumes a pre-disassembled view of the host application:
//! per class, its superclass, interface list, access flags, declared fields
//! (name + dalvik type descriptor) and declared methods (signature plus a
//! flattened instruction stream for constant-string and member-reference
//! scanning). The index is typically exported as JSON by a dex disassembly
//! step that is outside this library.
//!
//! Names use dalvik descriptor form throughout (`Lcom/foo/Bar;`, `J`,
//! `Landroid/net/Uri;`); [`descriptor_to_java`] converts to dotted form
//! where a human-readable class name is wanted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Class access flag: abstract
pub const ACC_ABSTRACT: u32 = 0x400;
/// Class access flag: interface
pub const ACC_INTERFACE: u32 = 0x200;
/// Member access flag: static
pub const ACC_STATIC: u32 = 0x8;
/// Member access flag: final
pub const ACC_FINAL: u32 = 0x10;
/// Member access flag: synthetic (compiler-generated)
pub const ACC_SYNTHETIC: u32 = 0x1000;

/// Converts a dalvik type descriptor to a dotted java-style name.
///
/// `Lcom/foo/Bar;` becomes `com.foo.Bar`; array and primitive descriptors
/// are returned unchanged.
pub fn descriptor_to_java(descriptor: &str) -> String {
    match descriptor.strip_prefix('L').and_then(|d| d.strip_suffix(';')) {
        Some(inner) => inner.replace('/', "."),
        None => descriptor.to_string(),
    }
}

/// A loaded, read-only index of every class in one host app build.
///
/// The index must not change during a resolution pass; a fresh pass after
/// an app update starts from a freshly loaded index.
#[derive(Debug, Clone)]
pub struct ClassIndex {
    classes: Vec<ClassDef>,
    by_name: HashMap<String, usize>,
}

impl ClassIndex {
    /// Builds an index from a list of class definitions.
    pub fn new(classes: Vec<ClassDef>) -> Self {
        let by_name = classes
            .iter()
            .enumerate()
            .map(|(i, class)| (class.name.clone(), i))
            .collect();
        Self { classes, by_name }
    }

    /// Loads an index from a JSON export file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
        let index = Self::from_json(&data)?;
        debug!("loaded class index: {} classes from {}", index.len(), path.display());
        Ok(index)
    }

    /// Parses an index from JSON bytes (a top-level array of classes).
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let classes: Vec<ClassDef> = serde_json::from_slice(data)?;
        Ok(Self::new(classes))
    }

    /// Serializes the index back to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.classes)?)
    }

    /// Returns the number of indexed classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if the index holds no classes.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterates all classes in index order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> + '_ {
        self.classes.iter()
    }

    /// Looks up a class by its dalvik descriptor (`Lcom/foo/Bar;`).
    pub fn get_class(&self, name: &str) -> Option<&ClassDef> {
        self.by_name.get(name).map(|&i| &self.classes[i])
    }
}

/// One class as seen by the disassembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    /// Dalvik descriptor of this class (`Lcom/foo/Bar;`)
    pub name: String,
    /// Dalvik descriptor of the superclass, if any
    #[serde(default)]
    pub superclass: Option<String>,
    /// Implemented interfaces, in declaration order
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Raw access flags
    #[serde(default)]
    pub access_flags: u32,
    /// Declared instance and static fields
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Declared methods
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    /// Returns the dotted java-style name of this class.
    pub fn java_name(&self) -> String {
        descriptor_to_java(&self.name)
    }

    /// Returns true if the class is abstract.
    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }

    /// Returns true if the class is an interface.
    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    /// Returns the first method with the given name.
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Returns the first field with the given type descriptor.
    pub fn field_of_type(&self, descriptor: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.descriptor == descriptor)
    }
}

/// One declared field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name (obfuscated in release builds)
    pub name: String,
    /// Dalvik type descriptor (`J`, `Landroid/net/Uri;`, ...)
    pub descriptor: String,
}

/// One declared method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Parameter type descriptors, in order
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Return type descriptor
    pub return_type: String,
    /// Disassembled body, absent for abstract/native methods
    #[serde(default)]
    pub body: Option<MethodBody>,
}

/// A flattened instruction stream for one method body.
///
/// Only the instruction kinds the mapper predicates scan for are kept;
/// everything else is dropped by the exporter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodBody {
    /// Instructions in bytecode order
    #[serde(default)]
    pub instructions: Vec<Op>,
}

impl MethodBody {
    /// Returns true if the body loads the given string constant.
    ///
    /// With `contains` set, a substring match on the constant is enough.
    pub fn find_const_string(&self, needle: &str, contains: bool) -> bool {
        self.instructions.iter().any(|op| match op {
            Op::ConstString(value) => {
                if contains {
                    value.contains(needle)
                } else {
                    value == needle
                }
            }
            _ => false,
        })
    }

    /// Finds the first field reference following a matching constant load.
    ///
    /// Scans for a string constant matching `needle`, then returns the next
    /// field reference after it in instruction order. This is a proximity
    /// heuristic: `toString`-style methods interleave label constants with
    /// loads of the fields they print, which survives obfuscation because
    /// the constants do not get renamed.
    pub fn search_next_field_reference(&self, needle: &str, contains: bool) -> Option<&FieldRef> {
        let mut matched = false;
        for op in &self.instructions {
            match op {
                Op::ConstString(value) if !matched => {
                    if (contains && value.contains(needle)) || (!contains && value == needle) {
                        matched = true;
                    }
                }
                Op::FieldRef(field) if matched => return Some(field),
                _ => {}
            }
        }
        None
    }
}

/// One scanned instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "kebab-case")]
pub enum Op {
    /// A string constant load
    ConstString(String),
    /// A field access (get or put)
    FieldRef(FieldRef),
    /// A method invocation
    MethodRef(MethodRef),
}

/// A field reference inside a method body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRef {
    /// Descriptor of the declaring class
    pub owner: String,
    /// Field name
    pub name: String,
    /// Field type descriptor
    pub descriptor: String,
}

/// A method reference inside a method body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodRef {
    /// Descriptor of the declaring class
    pub owner: String,
    /// Method name
    pub name: String,
}
