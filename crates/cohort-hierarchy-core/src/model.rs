//! Core data model for coding-system hierarchies.
//!
//! A [`CodeRecord`] is the intrinsic data of one code as returned by the
//! terminology service: it only knows its parents and children through
//! comma-separated id lists. A [`HierarchyNode`] is that record placed in a
//! tree, with its materialized children and a [`SelectionStatus`].
//!
//! ```
//! use cohort_hierarchy_core::model::{CodeRecord, HierarchyNode, SelectionStatus};
//!
//! let record = CodeRecord::new("A00", "Choléra", "icd10").with_parents("A00-A09");
//! assert_eq!(record.parent_ids(), vec!["A00-A09"]);
//!
//! let node = HierarchyNode::from(record);
//! assert!(node.sub_items.is_none());
//! assert_eq!(node.status, SelectionStatus::Unknown);
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Id of the synthetic node standing for a whole coding system.
pub const HIERARCHY_ROOT: &str = "*";

/// Label of the synthetic hierarchy root.
pub const HIERARCHY_ROOT_LABEL: &str = "Toute la hiérarchie";

/// Separator used in `above_levels_ids` / `inferior_levels_ids`.
pub const ID_SEPARATOR: char = ',';

/// Split a delimited id list, trimming parts and dropping empty ones.
pub fn split_ids(ids: Option<&str>) -> Vec<&str> {
    ids.map(|ids| {
        ids.split(ID_SEPARATOR)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// One code of a coding system, before it is placed in a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRecord {
    /// Code identifier, unique within `system`
    pub id: String,
    /// Human readable label
    pub label: String,
    /// Coding system the code belongs to
    pub system: String,
    /// Comma-separated parent ids (a code may have several parents)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above_levels_ids: Option<String>,
    /// Comma-separated child ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inferior_levels_ids: Option<String>,
}

impl CodeRecord {
    pub fn new(id: impl Into<String>, label: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            system: system.into(),
            above_levels_ids: None,
            inferior_levels_ids: None,
        }
    }

    pub fn with_parents(mut self, ids: impl Into<String>) -> Self {
        self.above_levels_ids = Some(ids.into());
        self
    }

    pub fn with_children(mut self, ids: impl Into<String>) -> Self {
        self.inferior_levels_ids = Some(ids.into());
        self
    }

    /// Parent ids in declaration order.
    pub fn parent_ids(&self) -> Vec<&str> {
        split_ids(self.above_levels_ids.as_deref())
    }

    /// Child ids in declaration order.
    pub fn child_ids(&self) -> Vec<&str> {
        split_ids(self.inferior_levels_ids.as_deref())
    }

    /// Position of `child_id` in `inferior_levels_ids`, if listed.
    pub fn child_position(&self, child_id: &str) -> Option<usize> {
        self.child_ids().iter().position(|id| *id == child_id)
    }

    pub fn is_hierarchy_root(&self) -> bool {
        self.id == HIERARCHY_ROOT
    }
}

/// Tri-state selection of a node, plus the explicit "not computed" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionStatus {
    Selected,
    NotSelected,
    Indeterminate,
    /// Not part of the current selection computation
    #[default]
    Unknown,
}

impl SelectionStatus {
    pub fn is_unknown(&self) -> bool {
        matches!(self, SelectionStatus::Unknown)
    }

    /// Whether the status is a definite choice children can inherit.
    pub fn is_definite(&self) -> bool {
        matches!(self, SelectionStatus::Selected | SelectionStatus::NotSelected)
    }

    pub fn from_selected(selected: bool) -> Self {
        if selected {
            SelectionStatus::Selected
        } else {
            SelectionStatus::NotSelected
        }
    }
}

/// A code placed in a hierarchy tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    #[serde(flatten)]
    pub code: CodeRecord,
    /// `None`: not expanded yet. `Some(vec![])`: expanded leaf.
    #[serde(
        rename = "subItems",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_items: Option<Vec<HierarchyNode>>,
    #[serde(default, skip_serializing_if = "SelectionStatus::is_unknown")]
    pub status: SelectionStatus,
}

impl HierarchyNode {
    pub fn new(code: CodeRecord, status: SelectionStatus) -> Self {
        Self {
            code,
            sub_items: None,
            status,
        }
    }

    pub fn with_sub_items(mut self, sub_items: Vec<HierarchyNode>) -> Self {
        self.sub_items = Some(sub_items);
        self
    }

    pub fn id(&self) -> &str {
        &self.code.id
    }

    pub fn system(&self) -> &str {
        &self.code.system
    }

    /// Children, empty when the node is not expanded.
    pub fn children(&self) -> &[HierarchyNode] {
        self.sub_items.as_deref().unwrap_or(&[])
    }

    /// Copy of the node without its children.
    pub fn shallow(&self) -> Self {
        Self {
            code: self.code.clone(),
            sub_items: None,
            status: self.status,
        }
    }

    /// Depth-first search for `id` in this subtree.
    pub fn find(&self, id: &str) -> Option<&HierarchyNode> {
        if self.id() == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }
}

impl From<CodeRecord> for HierarchyNode {
    fn from(code: CodeRecord) -> Self {
        Self::new(code, SelectionStatus::Unknown)
    }
}

impl From<HierarchyNode> for CodeRecord {
    fn from(node: HierarchyNode) -> Self {
        node.code
    }
}

/// Build mode of a tree pass, also used as the fetch policy of the gap filler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Build from scratch and resolve eagerly
    Init,
    /// Attach the children of a node the user just opened, lazily
    Expand,
    /// Merge search results into an existing tree, resolving eagerly
    Search,
}

impl Mode {
    /// Whether an existing tree is extended rather than replaced.
    pub fn keeps_base_tree(self) -> bool {
        !matches!(self, Mode::Init)
    }
}

/// Code store of one system: id to record.
pub type CodeStore = IndexMap<String, CodeRecord>;

/// Code stores of all systems, keyed by system.
pub type Codes = IndexMap<String, CodeStore>;

/// Forests of all systems, keyed by system.
pub type Trees = IndexMap<String, Vec<HierarchyNode>>;

/// Selected nodes of one system, keyed by id.
pub type SelectedMap = IndexMap<String, HierarchyNode>;

/// Selected nodes of all systems, keyed by system.
pub type SelectedCodes = IndexMap<String, SelectedMap>;

/// Codes of one system, as produced by `group_by_system`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemGroup {
    pub system: String,
    pub codes: Vec<CodeRecord>,
}
