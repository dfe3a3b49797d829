//! Store abstractions at the pipeline's edges.
//!
//! The pipeline reads each input collection once, as an unordered snapshot of
//! `(key, JSON value)` pairs, and publishes byte artifacts write-once under a
//! run key. Ingestion into the input stores and replication of the outputs
//! are collaborator concerns; the in-memory implementations here back the
//! server's default wiring and the test suites.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// An unordered snapshot view over a keyed collection of JSON documents.
pub trait SnapshotStore: Send + Sync {
    /// Store name, for logging.
    fn name(&self) -> &str;

    /// Returns every `(key, JSON value)` pair. Order is unspecified.
    fn snapshot(&self) -> Vec<(String, String)>;
}

/// A write-once store for published run artifacts.
///
/// Writing twice under the same key is a caller bug; implementations keep the
/// first value and log the collision rather than overwrite.
pub trait ArtifactStore: Send + Sync {
    /// Store name, for logging and download routing.
    fn name(&self) -> &str;

    /// Publishes `value` under `key` if absent.
    fn put(&self, key: &str, value: Vec<u8>);

    /// Fetches a previously published artifact.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// All published keys, sorted.
    fn keys(&self) -> Vec<String>;
}

/// Sink for debug-mode intermediate stage output. Diagnostic only; never
/// required for correctness.
pub trait DebugSink: Send + Sync {
    /// Records one intermediate entry under a stage map name.
    fn put(&self, map_name: &str, key: String, value: String);
}

/// In-memory [`SnapshotStore`], used by the server's default wiring and tests.
pub struct InMemoryStore {
    name: String,
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    /// Creates an empty named store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts or replaces a document.
    pub fn insert(&self, key: impl Into<String>, json: impl Into<String>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.into(), json.into());
    }

    /// Number of documents held.
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn snapshot(&self) -> Vec<(String, String)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// In-memory [`ArtifactStore`].
pub struct InMemoryArtifacts {
    name: String,
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryArtifacts {
    /// Creates an empty named artifact store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl ArtifactStore for InMemoryArtifacts {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&self, key: &str, value: Vec<u8>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(key) {
            tracing::warn!(store = %self.name, key, "artifact already published, keeping first");
            return;
        }
        entries.insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.keys().cloned().collect()
    }
}

/// In-memory [`DebugSink`], grouping entries per stage map.
#[derive(Default)]
pub struct InMemoryDebugSink {
    maps: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl InMemoryDebugSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries recorded under a stage map.
    pub fn len(&self, map_name: &str) -> usize {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        maps.get(map_name).map(|m| m.len()).unwrap_or(0)
    }

    /// Names of every stage map written to.
    pub fn map_names(&self) -> Vec<String> {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        maps.keys().cloned().collect()
    }
}

impl DebugSink for InMemoryDebugSink {
    fn put(&self, map_name: &str, key: String, value: String) {
        let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());
        maps.entry(map_name.to_string()).or_default().insert(key, value);
    }
}

/// A no-op sink for runs with debug mode off.
pub struct NullDebugSink;

impl DebugSink for NullDebugSink {
    fn put(&self, _map_name: &str, _key: String, _value: String) {}
}
