//! Task registry: manifest parsing and name-keyed lookup.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{DispatchError, TaskRecord};

/// One element of the manifest. Unknown additional fields are ignored.
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: String,
    env: BTreeMap<String, String>,
}

/// Insertion-stable mapping from task name to [`TaskRecord`].
///
/// Built once from the manifest, then frozen in shape: no inserts or removes
/// afterwards, though individual records mutate in place as they run. The
/// registry is what gets persisted per run so a later run's history linker
/// can read it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<TaskRecord>", into = "Vec<TaskRecord>")]
pub struct TaskRegistry {
    records: Vec<TaskRecord>,
    index: HashMap<String, usize>,
}

impl TaskRegistry {
    /// Parse manifest bytes into a registry for `run_number`.
    ///
    /// The manifest must be a JSON array of `{"name": ..., "env": {...}}`
    /// objects. A missing field, an empty name, or a name collision is a
    /// [`DispatchError::ManifestFormat`] — no partial registry is exposed.
    pub fn parse(manifest: &[u8], run_number: u64) -> Result<Self, DispatchError> {
        let entries: Vec<ManifestEntry> = serde_json::from_slice(manifest)
            .map_err(|e| DispatchError::ManifestFormat(e.to_string()))?;

        let mut registry = Self {
            records: Vec::with_capacity(entries.len()),
            index: HashMap::with_capacity(entries.len()),
        };
        for entry in entries {
            if entry.name.is_empty() {
                return Err(DispatchError::ManifestFormat(
                    "task with empty name".to_string(),
                ));
            }
            if registry.index.contains_key(&entry.name) {
                return Err(DispatchError::ManifestFormat(format!(
                    "duplicate task name: {}",
                    entry.name
                )));
            }
            registry.index.insert(entry.name.clone(), registry.records.len());
            registry
                .records
                .push(TaskRecord::new(entry.name, entry.env, run_number));
        }
        Ok(registry)
    }

    /// Exact-name lookup. Absent is not an error.
    pub fn get(&self, name: &str) -> Option<&TaskRecord> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut TaskRecord> {
        let i = *self.index.get(name)?;
        Some(&mut self.records[i])
    }

    /// All records in stable manifest order.
    pub fn list(&self) -> &[TaskRecord] {
        &self.records
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut TaskRecord> {
        self.records.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl TryFrom<Vec<TaskRecord>> for TaskRegistry {
    type Error = String;

    fn try_from(records: Vec<TaskRecord>) -> Result<Self, Self::Error> {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if index.insert(record.name().to_string(), i).is_some() {
                return Err(format!("duplicate task name: {}", record.name()));
            }
        }
        Ok(Self { records, index })
    }
}

impl From<TaskRegistry> for Vec<TaskRecord> {
    fn from(registry: TaskRegistry) -> Self {
        registry.records
    }
}
