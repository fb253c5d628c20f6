//! Declarative pattern mapping over an obfuscated class index.
//!
//! A concrete [`ClassMapper`] declares named output slots and an ordered
//! list of rules. Each rule scans the full [`ClassIndex`] afresh, testing
//! structural predicates (constant strings in method bodies, method
//! signatures, superclass/interface shape, field types) against every
//! candidate class, and writes the resolved identities into its slots on
//! the first satisfying candidate. Targets are expected to be unique per
//! app build, so the first match wins and the rule stops.
//!
//! Mapping is best-effort by design: the host app's obfuscated layout
//! changes release to release, and a predicate that stops matching leaves
//! its slots unresolved rather than failing the pass. Downstream consumers
//! treat an unresolved slot as "the dependent feature cannot run in this
//! app version". The pass collects a warning per unresolved slot for
//! user-facing display.
//!
//! ## Example
//!
//! ```
//! use remora_core::mapper::{MappingEngine, ClassIndex};
//!
//! let index = ClassIndex::new(vec![]);
//! let result = MappingEngine::with_default_mappers().run(&index);
//! // Nothing resolves against an empty index, but nothing fails either:
//! assert!(result.get("media_item", "cameraRollMediaIdClass").is_none());
//! assert!(!result.warnings().is_empty());
//! ```

pub mod impls;
mod index;

pub use index::{
    descriptor_to_java, ClassDef, ClassIndex, FieldDef, FieldRef, MethodBody, MethodDef, MethodRef,
    Op, ACC_ABSTRACT, ACC_FINAL, ACC_INTERFACE, ACC_STATIC, ACC_SYNTHETIC,
};

use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One rule of a mapper: scans the index and fills slots on a match.
pub type MapperRule = fn(&ClassIndex, &mut SlotTable);

/// A named set of output slots plus the rules that resolve them.
///
/// Implementations are stateless; all resolution state lives in the
/// [`SlotTable`] owned by the engine's session.
pub trait ClassMapper: Send + Sync {
    /// Symbolic name of this mapper, used as the section key in results.
    fn name(&self) -> &'static str;

    /// The slots this mapper can resolve, in declaration order.
    fn slots(&self) -> &'static [&'static str];

    /// The rules to execute, in declaration order.
    ///
    /// Rules are independent: each scans the index from the start, because
    /// different slots may need different predicate chains over the same
    /// or different classes.
    fn rules(&self) -> &'static [MapperRule];
}

/// Resolution lifecycle of one mapper within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    /// Slots declared, no rule has run
    Unresolved,
    /// Rules are executing
    Resolving,
    /// All rules have run once; individual slots may still be empty
    Resolved,
}

/// The output slots of one mapper.
///
/// Every slot is declared up front and starts empty. A slot is written at
/// most once per pass: the first write wins and later writes are ignored
/// with a warning, mirroring the first-match-wins rule semantics.
#[derive(Debug, Clone, Default)]
pub struct SlotTable {
    slots: IndexMap<String, Option<String>>,
}

impl SlotTable {
    fn declare(&mut self, key: &str) {
        self.slots.entry(key.to_string()).or_insert(None);
    }

    /// Writes a resolved value into a slot.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let Some(slot) = self.slots.get_mut(key) else {
            warn!("slot '{}' was never declared, ignoring write", key);
            return;
        };
        match slot {
            None => *slot = Some(value.into()),
            Some(existing) => {
                warn!("slot '{}' already resolved to '{}', ignoring rewrite", key, existing);
            }
        }
    }

    /// Returns the resolved value of a slot, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.slots.get(key).and_then(|slot| slot.as_deref())
    }

    /// Returns true if the slot has been resolved.
    pub fn is_resolved(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates `(slot, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> + '_ {
        self.slots
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }
}

struct MapperSession {
    mapper: Box<dyn ClassMapper>,
    state: ResolutionState,
    slots: SlotTable,
}

impl MapperSession {
    fn new(mapper: Box<dyn ClassMapper>) -> Self {
        let mut slots = SlotTable::default();
        for &key in mapper.slots() {
            slots.declare(key);
        }
        Self {
            mapper,
            state: ResolutionState::Unresolved,
            slots,
        }
    }

    fn resolve(&mut self, index: &ClassIndex) {
        // Resolution runs at most once per session
        if self.state != ResolutionState::Unresolved {
            return;
        }
        self.state = ResolutionState::Resolving;
        for rule in self.mapper.rules() {
            rule(index, &mut self.slots);
        }
        self.state = ResolutionState::Resolved;
    }
}

/// Runs a set of mappers against one loaded class index.
///
/// The engine is consumed by [`run`](MappingEngine::run): resolution is
/// attempted exactly once per loaded index, and a fresh pass (after an app
/// update) starts from a new engine and a freshly loaded index.
pub struct MappingEngine {
    sessions: Vec<MapperSession>,
}

impl Default for MappingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingEngine {
    /// Creates an engine with no registered mappers.
    pub fn new() -> Self {
        Self { sessions: Vec::new() }
    }

    /// Creates an engine with every mapper shipped in [`impls`] registered.
    pub fn with_default_mappers() -> Self {
        let mut engine = Self::new();
        for mapper in impls::default_mappers() {
            engine.register(mapper);
        }
        engine
    }

    /// Registers a mapper. Declaration order is preserved in results.
    pub fn register(&mut self, mapper: Box<dyn ClassMapper>) {
        self.sessions.push(MapperSession::new(mapper));
    }

    /// Executes every registered mapper against the index.
    ///
    /// Rules run sequentially; the index is never mutated. Unresolved
    /// slots produce warnings in the result rather than errors.
    pub fn run(mut self, index: &ClassIndex) -> MappingResult {
        let mut mappings = IndexMap::new();
        let mut warnings = Vec::new();

        for session in &mut self.sessions {
            let name = session.mapper.name();
            debug!("resolving mapper '{}' against {} classes", name, index.len());
            session.resolve(index);

            for (slot, value) in session.slots.iter() {
                if value.is_none() {
                    warnings.push(format!("mapper '{}': slot '{}' is unresolved", name, slot));
                }
            }
            mappings.insert(name.to_string(), session.slots.clone());
        }

        for warning in &warnings {
            warn!("{}", warning);
        }

        MappingResult {
            app_version: None,
            mappings,
            warnings,
        }
    }
}

/// The outcome of one mapping pass: a symbolic name → resolved-element
/// table plus the warnings collected along the way.
///
/// Once constructed the result is read-only, safe for unsynchronized
/// concurrent reads, and serializable for per-app-version caching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingResult {
    /// Host app version the pass ran against, for cache validation
    #[serde(default)]
    app_version: Option<String>,
    /// Mapper name → slot → resolved value
    #[serde(with = "serde_slot_tables")]
    mappings: IndexMap<String, SlotTable>,
    /// Human-readable warnings from the pass
    #[serde(default)]
    warnings: Vec<String>,
}

impl MappingResult {
    /// Stamps the result with the app version it was generated against.
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    /// Returns the app version stamp, if any.
    pub fn app_version(&self) -> Option<&str> {
        self.app_version.as_deref()
    }

    /// Returns true if this cached result may be reused for `version`.
    pub fn is_valid_for(&self, version: &str) -> bool {
        self.app_version.as_deref() == Some(version)
    }

    /// Returns the slot table of one mapper.
    pub fn mapper(&self, name: &str) -> Option<&SlotTable> {
        self.mappings.get(name)
    }

    /// Returns one resolved value by `(mapper, slot)`.
    pub fn get(&self, mapper: &str, slot: &str) -> Option<&str> {
        self.mapper(mapper)?.get(slot)
    }

    /// Runs `f` against a mapper's slots, if that mapper exists.
    ///
    /// This is the access pattern for feature code: the closure body is
    /// skipped entirely when the mapper is unknown, and individual slot
    /// reads inside it still return `None` when unresolved.
    pub fn use_mapper<T>(&self, name: &str, f: impl FnOnce(&SlotTable) -> T) -> Option<T> {
        self.mapper(name).map(f)
    }

    /// Iterates `(mapper, slots)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlotTable)> + '_ {
        self.mappings
            .iter()
            .map(|(name, slots)| (name.as_str(), slots))
    }

    /// Returns the warnings collected during the pass.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Serializes the result for caching.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reloads a cached result.
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Writes the result to a cache file.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|e| crate::error::Error::file_write(path, e))
    }

    /// Loads a cached result from a file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let data =
            std::fs::read_to_string(path).map_err(|e| crate::error::Error::file_read(path, e))?;
        Self::from_json(&data)
    }
}

mod serde_slot_tables {
    use super::SlotTable;
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<S: Serializer>(
        tables: &IndexMap<String, SlotTable>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let plain: IndexMap<&String, &IndexMap<String, Option<String>>> =
            tables.iter().map(|(name, table)| (name, &table.slots)).collect();
        plain.serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<String, SlotTable>, D::Error> {
        let plain: IndexMap<String, IndexMap<String, Option<String>>> =
            IndexMap::deserialize(deserializer)?;
        Ok(plain
            .into_iter()
            .map(|(name, slots)| (name, SlotTable { slots }))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct TestMapper;

    const TARGET_CLASS: &str = "targetClass";
    const TARGET_FIELD: &str = "targetField";
    const NEVER_FOUND: &str = "neverFound";

    fn target_rule(index: &ClassIndex, slots: &mut SlotTable) {
        for class in index.classes() {
            let Some(body) = class.method("toString").and_then(|m| m.body.as_ref()) else {
                continue;
            };
            if !body.find_const_string("UniqueMarker", true) {
                continue;
            }
            let Some(field) = class.field_of_type("J") else {
                continue;
            };
            slots.set(TARGET_CLASS, class.java_name());
            slots.set(TARGET_FIELD, &field.name);
            return;
        }
    }

    fn hopeless_rule(index: &ClassIndex, slots: &mut SlotTable) {
        for class in index.classes() {
            if class.name == "Ldoes/not/Exist;" {
                slots.set(NEVER_FOUND, class.java_name());
                return;
            }
        }
    }

    impl ClassMapper for TestMapper {
        fn name(&self) -> &'static str {
            "test"
        }
        fn slots(&self) -> &'static [&'static str] {
            &[TARGET_CLASS, TARGET_FIELD, NEVER_FOUND]
        }
        fn rules(&self) -> &'static [MapperRule] {
            &[target_rule, hopeless_rule]
        }
    }

    fn tostring_with(marker: &str) -> MethodDef {
        MethodDef {
            name: "toString".to_string(),
            parameters: vec![],
            return_type: "Ljava/lang/String;".to_string(),
            body: Some(MethodBody {
                instructions: vec![Op::ConstString(marker.to_string())],
            }),
        }
    }

    fn synthetic_index() -> ClassIndex {
        ClassIndex::new(vec![
            // Decoy: right marker, no long field
            ClassDef {
                name: "La/a;".to_string(),
                superclass: None,
                interfaces: vec![],
                access_flags: 0,
                fields: vec![],
                methods: vec![tostring_with("UniqueMarker(id=")],
            },
            // The real target
            ClassDef {
                name: "La/b;".to_string(),
                superclass: None,
                interfaces: vec![],
                access_flags: 0,
                fields: vec![FieldDef {
                    name: "q".to_string(),
                    descriptor: "J".to_string(),
                }],
                methods: vec![tostring_with("UniqueMarker(id=")],
            },
            // Decoy: long field, wrong marker
            ClassDef {
                name: "La/c;".to_string(),
                superclass: None,
                interfaces: vec![],
                access_flags: 0,
                fields: vec![FieldDef {
                    name: "r".to_string(),
                    descriptor: "J".to_string(),
                }],
                methods: vec![tostring_with("OtherThing(")],
            },
        ])
    }

    #[test]
    fn test_rule_terminates_on_unique_match() {
        let mut engine = MappingEngine::new();
        engine.register(Box::new(TestMapper));
        let result = engine.run(&synthetic_index());

        assert_eq!(result.get("test", TARGET_CLASS), Some("a.b"));
        assert_eq!(result.get("test", TARGET_FIELD), Some("q"));
    }

    #[test]
    fn test_zero_matches_leaves_slot_null() {
        let mut engine = MappingEngine::new();
        engine.register(Box::new(TestMapper));
        let result = engine.run(&synthetic_index());

        assert_eq!(result.get("test", NEVER_FOUND), None);
        assert_eq!(result.warnings().len(), 1);
        assert!(result.warnings()[0].contains(NEVER_FOUND));
    }

    #[test]
    fn test_empty_index_resolves_nothing_without_error() {
        let mut engine = MappingEngine::new();
        engine.register(Box::new(TestMapper));
        let result = engine.run(&ClassIndex::new(vec![]));

        assert_eq!(result.get("test", TARGET_CLASS), None);
        assert_eq!(result.warnings().len(), 3);
    }

    #[test]
    fn test_session_state_machine() {
        let mut session = MapperSession::new(Box::new(TestMapper));
        assert_eq!(session.state, ResolutionState::Unresolved);

        session.resolve(&synthetic_index());
        assert_eq!(session.state, ResolutionState::Resolved);
        assert_eq!(session.slots.get(TARGET_CLASS), Some("a.b"));

        // A second resolve is a no-op, even against a different index
        session.resolve(&ClassIndex::new(vec![]));
        assert_eq!(session.slots.get(TARGET_CLASS), Some("a.b"));
    }

    #[test]
    fn test_slot_write_once() {
        let mut slots = SlotTable::default();
        slots.declare("slot");
        slots.set("slot", "first");
        slots.set("slot", "second");
        assert_eq!(slots.get("slot"), Some("first"));
    }

    #[test]
    fn test_undeclared_slot_write_is_ignored() {
        let mut slots = SlotTable::default();
        slots.set("ghost", "value");
        assert_eq!(slots.get("ghost"), None);
    }

    #[test]
    fn test_use_mapper_access() {
        let mut engine = MappingEngine::new();
        engine.register(Box::new(TestMapper));
        let result = engine.run(&synthetic_index());

        let found = result.use_mapper("test", |slots| slots.get(TARGET_CLASS).map(String::from));
        assert_eq!(found, Some(Some("a.b".to_string())));
        assert_eq!(result.use_mapper("unknown", |_| ()), None);
    }

    #[test]
    fn test_result_json_round_trip() {
        let mut engine = MappingEngine::new();
        engine.register(Box::new(TestMapper));
        let result = engine
            .run(&synthetic_index())
            .with_app_version("12.33.0.37");

        let json = result.to_json().unwrap();
        let reloaded = MappingResult::from_json(&json).unwrap();

        assert!(reloaded.is_valid_for("12.33.0.37"));
        assert!(!reloaded.is_valid_for("12.34.0.10"));
        assert_eq!(reloaded.get("test", TARGET_CLASS), Some("a.b"));
        assert_eq!(reloaded.get("test", NEVER_FOUND), None);
        assert_eq!(reloaded.warnings().len(), 1);
    }

    #[test]
    fn test_result_cache_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = dir.path().join("mappings.json");

        let mut engine = MappingEngine::new();
        engine.register(Box::new(TestMapper));
        let result = engine.run(&synthetic_index()).with_app_version("13.2.0.28");
        result.save(&cache).unwrap();

        let reloaded = MappingResult::load(&cache).unwrap();
        assert!(reloaded.is_valid_for("13.2.0.28"));
        assert_eq!(reloaded.get("test", TARGET_FIELD), Some("q"));

        assert!(MappingResult::load(dir.path().join("missing.json")).is_err());
    }
}
