//! Code store transforms and the persisted code cache.
//!
//! The in-memory [`Codes`] mapping (system → id → record) is what the
//! builder and the gap filler work on. For persistence it is flattened into
//! a list of [`CacheEntry`] values, one per system.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HierarchyError;
use crate::model::{CodeRecord, CodeStore, Codes, HierarchyNode, SelectionStatus};
use crate::result::Result;

/// Flat cache representation of one system's code store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The coding system
    pub id: String,
    /// Records of the system keyed by code id
    pub options: IndexMap<String, CodeRecord>,
}

/// Flatten the per-system stores into cache entries.
pub fn map_codes_to_cache(codes: &Codes) -> Vec<CacheEntry> {
    codes
        .iter()
        .map(|(system, store)| CacheEntry {
            id: system.clone(),
            options: store.clone(),
        })
        .collect()
}

/// Rebuild the per-system stores from cache entries.
pub fn map_cache_to_codes(cache: &[CacheEntry]) -> Codes {
    cache
        .iter()
        .map(|entry| (entry.id.clone(), entry.options.clone()))
        .collect()
}

/// Shallow id → node fold; children are left on the nodes untouched.
pub fn map_hierarchy_to_map(nodes: &[HierarchyNode]) -> IndexMap<String, HierarchyNode> {
    nodes
        .iter()
        .map(|node| (node.id().to_string(), node.clone()))
        .collect()
}

/// Copy of a node reduced to its record data.
pub fn clean_node(node: &HierarchyNode) -> HierarchyNode {
    HierarchyNode::new(node.code.clone(), SelectionStatus::Unknown)
}

/// Immediate children of the given roots, keyed by id.
pub fn get_hierarchy_root_codes(hierarchy: &[HierarchyNode]) -> IndexMap<String, HierarchyNode> {
    hierarchy
        .iter()
        .flat_map(|root| root.children())
        .map(|child| (child.id().to_string(), child.clone()))
        .collect()
}

/// Merge records into a store. Existing ids are kept as they are.
///
/// Returns the number of records actually inserted.
pub fn insert_codes(store: &mut CodeStore, records: impl IntoIterator<Item = CodeRecord>) -> usize {
    let mut inserted = 0;
    for record in records {
        if !store.contains_key(&record.id) {
            store.insert(record.id.clone(), record);
            inserted += 1;
        }
    }
    inserted
}

/// Every loop in the `above_levels_ids` relation of `store`.
///
/// One depth-first walk over the whole store; each loop is reported once,
/// from the member reached first back to itself (`[X, Y, X]`). Parents the
/// store does not hold are skipped.
pub fn find_cycles(store: &CodeStore) -> Vec<Vec<String>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        OnStack,
        Done,
    }

    struct Frame<'a> {
        id: &'a str,
        parents: Vec<&'a str>,
        next: usize,
    }

    fn parents_of<'a>(store: &'a CodeStore, id: &str) -> Vec<&'a str> {
        store
            .get(id)
            .map(|code| {
                code.parent_ids()
                    .into_iter()
                    .filter(|parent| store.contains_key(*parent))
                    .collect()
            })
            .unwrap_or_default()
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut cycles = Vec::new();

    for start in store.keys() {
        if marks.contains_key(start.as_str()) {
            continue;
        }
        marks.insert(start, Mark::OnStack);
        let mut stack = vec![Frame {
            id: start,
            parents: parents_of(store, start),
            next: 0,
        }];

        while let Some(top) = stack.last_mut() {
            let Some(&parent) = top.parents.get(top.next) else {
                marks.insert(top.id, Mark::Done);
                stack.pop();
                continue;
            };
            top.next += 1;

            match marks.get(parent) {
                None => {
                    marks.insert(parent, Mark::OnStack);
                    stack.push(Frame {
                        id: parent,
                        parents: parents_of(store, parent),
                        next: 0,
                    });
                }
                Some(Mark::OnStack) => {
                    let from = stack
                        .iter()
                        .position(|frame| frame.id == parent)
                        .unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[from..].iter().map(|frame| frame.id.to_string()).collect();
                    cycle.push(parent.to_string());
                    cycles.push(cycle);
                }
                Some(Mark::Done) => {}
            }
        }
    }
    cycles
}

/// Persisted form of the code stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeCache {
    pub entries: Vec<CacheEntry>,
}

impl CodeCache {
    pub fn from_codes(codes: &Codes) -> Self {
        Self {
            entries: map_codes_to_cache(codes),
        }
    }

    pub fn to_codes(&self) -> Codes {
        map_cache_to_codes(&self.entries)
    }

    /// Read a JSON cache file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| HierarchyError::io_error(path, e))?;
        let cache: Self = serde_json::from_str(&content)?;
        debug!(
            "Loaded {} coding systems from {}",
            cache.entries.len(),
            path.display()
        );
        Ok(cache)
    }

    /// Write the cache as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| HierarchyError::io_error(path, e))?;
        debug!("Saved {} coding systems to {}", self.entries.len(), path.display());
        Ok(())
    }
}
