//! Tree construction from flat code stores.
//!
//! Codes only know their neighbours through `above_levels_ids` and
//! `inferior_levels_ids`. Building a tree for a set of *end codes* means
//! walking each end code up to a root, then inserting that path top down into
//! the forest, reusing whatever is already there:
//!
//! ```text
//! end code: A01.1      store: A00-A09 -> A01 -> A01.1
//!
//! path:     [A00-A09, A01, A01.1]
//! forest:   A00-A09
//!           ├── A00          (sibling known to the store, not expanded)
//!           └── A01
//!               ├── A01.0
//!               └── A01.1
//! ```
//!
//! A code listing several parents is placed once. When a node is expanded
//! through [`build_tree_under`], its children land under it, and a child an
//! earlier build put under another parent moves there with its subtree; a
//! parent left empty by such a move goes back to "not expanded".
//! Otherwise a placed code stays where it is, and a new one goes under the
//! first listed parent already in the forest, else the first listed parent
//! known to the store. Parents missing from the store are tolerated: the code
//! becomes a root.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::HierarchyError;
use crate::model::{
    CodeRecord, CodeStore, Codes, HIERARCHY_ROOT, HIERARCHY_ROOT_LABEL, HierarchyNode, Mode,
    SelectedCodes, SelectedMap, SelectionStatus, SystemGroup, Trees,
};
use crate::result::Result;
use crate::selection::{refresh_statuses, update_branch_status};
use crate::tree::{find_node_mut, parent_map, take_node};

/// Current parent of every placed id (`None` for roots).
type Placement = HashMap<String, Option<String>>;

/// Synthetic node standing for the whole `system` hierarchy.
pub fn create_hierarchy_root(system: &str, status: SelectionStatus) -> HierarchyNode {
    let record = CodeRecord::new(HIERARCHY_ROOT, HIERARCHY_ROOT_LABEL, system)
        .with_parents("")
        .with_children("");
    HierarchyNode::new(record, status)
}

/// Stable partition of `codes` by system, in first-seen system order.
pub fn group_by_system(codes: &[CodeRecord]) -> Vec<SystemGroup> {
    let mut groups: IndexMap<&str, Vec<CodeRecord>> = IndexMap::new();
    for code in codes {
        groups
            .entry(code.system.as_str())
            .or_default()
            .push(code.clone());
    }
    groups
        .into_iter()
        .map(|(system, codes)| SystemGroup {
            system: system.to_string(),
            codes,
        })
        .collect()
}

/// Build or extend the forest of `system` so that every end code is placed.
///
/// `Mode::Init` starts from an empty forest; other modes extend `base_tree`
/// and keep its expanded branches.
///
/// # Errors
///
/// Returns `HierarchyError::CyclicHierarchy` when an end code is its own
/// ancestor.
pub fn build_tree(
    base_tree: Vec<HierarchyNode>,
    system: &str,
    end_codes: &[CodeRecord],
    codes: &CodeStore,
    selected: &SelectedMap,
    mode: Mode,
) -> Result<Vec<HierarchyNode>> {
    let forest = if mode.keeps_base_tree() {
        base_tree
    } else {
        Vec::new()
    };
    let builder = TreeBuilder {
        system,
        codes,
        selected,
        preferred_parent: None,
    };
    builder.build(forest, end_codes)
}

/// Extend `base_tree` with the children of the expanded node `parent_id`.
///
/// Works like [`build_tree`] in `Mode::Expand`, except that every child
/// listing `parent_id` among its parents is placed under it, even when
/// another of its parents is already in the forest.
///
/// # Errors
///
/// Returns `HierarchyError::CyclicHierarchy` when a child is its own
/// ancestor.
pub fn build_tree_under(
    base_tree: Vec<HierarchyNode>,
    system: &str,
    parent_id: &str,
    children: &[CodeRecord],
    codes: &CodeStore,
    selected: &SelectedMap,
) -> Result<Vec<HierarchyNode>> {
    let builder = TreeBuilder {
        system,
        codes,
        selected,
        preferred_parent: Some(parent_id),
    };
    builder.build(base_tree, children)
}

/// Per-system fan-out of [`build_tree`].
///
/// A system whose store holds codes never ends up with an empty forest: it
/// gets its hierarchy root. Systems only present in `base_trees` are carried
/// over unchanged.
pub fn build_multiple_trees(
    base_trees: &Trees,
    groups: &[SystemGroup],
    codes: &Codes,
    selected: &SelectedCodes,
    mode: Mode,
) -> Result<Trees> {
    let empty_store = CodeStore::new();
    let empty_selection = SelectedMap::new();
    let mut trees = Trees::new();

    for group in groups {
        let system = group.system.as_str();
        let store = codes.get(system).unwrap_or(&empty_store);
        let system_selection = selected.get(system).unwrap_or(&empty_selection);
        let base_tree = base_trees.get(system).cloned().unwrap_or_default();

        let forest = build_tree(base_tree, system, &group.codes, store, system_selection, mode)?;
        trees.insert(system.to_string(), forest);
    }

    for (system, forest) in base_trees {
        if !trees.contains_key(system) {
            trees.insert(system.clone(), forest.clone());
        }
    }

    for (system, store) in codes {
        if store.is_empty() {
            continue;
        }
        let forest = trees.entry(system.clone()).or_default();
        if forest.is_empty() {
            let system_selection = selected.get(system).unwrap_or(&empty_selection);
            forest.push(hierarchy_root_for(system, store, system_selection));
        }
    }

    Ok(trees)
}

/// The stored root record when the store has one, the synthetic root otherwise.
fn hierarchy_root_for(system: &str, store: &CodeStore, selected: &SelectedMap) -> HierarchyNode {
    let status = selected
        .get(HIERARCHY_ROOT)
        .map(|node| node.status)
        .unwrap_or_default();
    match store.get(HIERARCHY_ROOT) {
        Some(record) => HierarchyNode::new(record.clone(), status),
        None => create_hierarchy_root(system, status),
    }
}

struct TreeBuilder<'a> {
    system: &'a str,
    codes: &'a CodeStore,
    selected: &'a SelectedMap,
    preferred_parent: Option<&'a str>,
}

impl<'a> TreeBuilder<'a> {
    fn build(
        &self,
        mut forest: Vec<HierarchyNode>,
        end_codes: &'a [CodeRecord],
    ) -> Result<Vec<HierarchyNode>> {
        let mut placed = parent_map(&forest);

        for end_code in end_codes {
            let path = self.ancestor_path(end_code, &placed)?;
            trace!("Placing {} via {:?}", end_code.id, path);
            self.insert_path(&mut forest, &path, end_code, &mut placed);
        }

        refresh_statuses(&mut forest);

        debug!(
            "Built {} tree: {} end codes, {} roots, {} nodes",
            self.system,
            end_codes.len(),
            forest.len(),
            placed.len()
        );
        Ok(forest)
    }

    /// Ids from the root down to `end_code`.
    fn ancestor_path(&self, end_code: &'a CodeRecord, placed: &Placement) -> Result<Vec<String>> {
        let mut chain = vec![end_code.id.clone()];
        let mut visited: HashSet<&str> = HashSet::from([end_code.id.as_str()]);
        let mut current = self.codes.get(&end_code.id).unwrap_or(end_code);

        while let Some(parent) = self.parent_of(current, placed) {
            chain.push(parent.id.clone());
            if !visited.insert(parent.id.as_str()) {
                return Err(HierarchyError::CyclicHierarchy {
                    system: self.system.to_string(),
                    chain,
                });
            }
            current = parent;
        }

        chain.reverse();
        Ok(chain)
    }

    fn parent_of(&self, code: &CodeRecord, placed: &Placement) -> Option<&'a CodeRecord> {
        let parent_ids = code.parent_ids();

        if let Some(preferred) = self.preferred_parent
            && parent_ids.contains(&preferred)
            && let Some(parent) = self.codes.get(preferred)
        {
            return Some(parent);
        }
        if let Some(Some(current)) = placed.get(&code.id)
            && let Some(parent) = self.codes.get(current)
        {
            return Some(parent);
        }

        let known: Vec<&'a CodeRecord> = parent_ids
            .iter()
            .filter_map(|id| self.codes.get(*id))
            .collect();
        if let Some(parent) = known
            .iter()
            .copied()
            .find(|parent| placed.contains_key(&parent.id))
        {
            return Some(parent);
        }
        if let Some(parent) = known.first().copied() {
            return Some(parent);
        }
        if !parent_ids.is_empty() {
            debug!(
                "Parents {:?} of {} are not in the {} store, placing it as a root",
                parent_ids, code.id, self.system
            );
        }

        if code.is_hierarchy_root() {
            return None;
        }
        self.codes
            .get(HIERARCHY_ROOT)
            .filter(|root| root.child_position(&code.id).is_some())
    }

    fn insert_path(
        &self,
        forest: &mut Vec<HierarchyNode>,
        path: &[String],
        end_code: &CodeRecord,
        placed: &mut Placement,
    ) {
        // Nodes sitting under another parent than the path's move with their subtree
        let mut detached: HashMap<String, HierarchyNode> = HashMap::new();
        for (depth, id) in path.iter().enumerate().skip(1) {
            let expected = &path[depth - 1];
            let misplaced = placed
                .get(id)
                .is_some_and(|current| current.as_ref() != Some(expected));
            if misplaced && let Some(node) = take_node(forest, id) {
                trace!("Moving {} under {}", id, expected);
                // A parent left without children reads as not expanded again
                if let Some(Some(former_id)) = placed.get(id)
                    && let Some(former) = find_node_mut(forest, former_id)
                    && former.children().is_empty()
                {
                    former.sub_items = None;
                }
                detached.insert(id.clone(), node);
            }
        }

        let mut level = forest;
        let mut parent: Option<(CodeRecord, SelectionStatus)> = None;

        for (depth, id) in path.iter().enumerate() {
            let position = match level.iter().position(|node| node.id() == id) {
                Some(position) => {
                    if let Some(recorded) = self.selected.get(id) {
                        update_branch_status(&mut level[position], recorded.status);
                    }
                    Some(position)
                }
                None => {
                    let node = match detached.remove(id) {
                        Some(node) => node,
                        None => {
                            let record = self
                                .codes
                                .get(id)
                                .cloned()
                                .unwrap_or_else(|| end_code.clone());
                            let inherited = parent.as_ref().map(|(_, status)| *status);
                            self.make_node(record, inherited)
                        }
                    };
                    level.push(node);
                    let parent_id = parent.as_ref().map(|(code, _)| code.id.clone());
                    placed.insert(id.clone(), parent_id);
                    if let Some((parent_code, _)) = &parent {
                        sort_children(level, parent_code);
                    }
                    level.iter().position(|node| node.id() == id)
                }
            };
            let Some(position) = position else {
                return;
            };

            if depth + 1 == path.len() {
                return;
            }

            let node = &mut level[position];
            if node.sub_items.is_none() {
                let children = self.materialize_children(&node.code, node.status, placed);
                node.sub_items = Some(children);
            }
            parent = Some((node.code.clone(), node.status));
            level = node.sub_items.get_or_insert_with(Vec::new);
        }
    }

    /// Children of `parent` known to the store and not placed elsewhere,
    /// in `inferior_levels_ids` order.
    fn materialize_children(
        &self,
        parent: &CodeRecord,
        parent_status: SelectionStatus,
        placed: &mut Placement,
    ) -> Vec<HierarchyNode> {
        let mut children = Vec::new();
        for id in parent.child_ids() {
            let Some(record) = self.codes.get(id) else {
                continue;
            };
            if !placed.contains_key(id) {
                placed.insert(id.to_string(), Some(parent.id.clone()));
                children.push(self.make_node(record.clone(), Some(parent_status)));
            }
        }
        children
    }

    fn make_node(&self, record: CodeRecord, parent_status: Option<SelectionStatus>) -> HierarchyNode {
        let status = match self.selected.get(&record.id) {
            Some(recorded) => recorded.status,
            None => parent_status
                .filter(SelectionStatus::is_definite)
                .unwrap_or_default(),
        };
        HierarchyNode::new(record, status)
    }
}

/// Stable reorder of siblings by the parent's `inferior_levels_ids`;
/// unlisted children keep their relative order at the end.
fn sort_children(children: &mut [HierarchyNode], parent: &CodeRecord) {
    let order: HashMap<&str, usize> = parent
        .child_ids()
        .into_iter()
        .enumerate()
        .map(|(index, id)| (id, index))
        .collect();
    children.sort_by_key(|child| order.get(child.id()).copied().unwrap_or(usize::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{collect_ids, find_node};

    fn store(records: &[CodeRecord]) -> CodeStore {
        records
            .iter()
            .map(|record| (record.id.clone(), record.clone()))
            .collect()
    }

    fn icd10() -> CodeStore {
        store(&[
            CodeRecord::new("A00-A09", "Maladies intestinales", "icd10").with_children("A00,A01"),
            CodeRecord::new("A00", "Choléra", "icd10")
                .with_parents("A00-A09")
                .with_children("A00.0,A00.1"),
            CodeRecord::new("A01", "Fièvres typhoïde", "icd10")
                .with_parents("A00-A09")
                .with_children("A01.0,A01.1"),
            CodeRecord::new("A01.0", "Fièvre typhoïde", "icd10").with_parents("A01"),
            CodeRecord::new("A01.1", "Paratyphoïde A", "icd10").with_parents("A01"),
        ])
    }

    fn ids(nodes: &[HierarchyNode]) -> Vec<&str> {
        nodes.iter().map(HierarchyNode::id).collect()
    }

    #[test]
    fn test_create_hierarchy_root() {
        let root = create_hierarchy_root("icd10", SelectionStatus::NotSelected);
        assert_eq!(root.id(), HIERARCHY_ROOT);
        assert_eq!(root.code.label, "Toute la hiérarchie");
        assert_eq!(root.code.above_levels_ids.as_deref(), Some(""));
        assert_eq!(root.code.inferior_levels_ids.as_deref(), Some(""));
        assert_eq!(root.status, SelectionStatus::NotSelected);
    }

    #[test]
    fn test_group_by_system_is_a_stable_partition() {
        let codes = vec![
            CodeRecord::new("a", "a", "s2"),
            CodeRecord::new("b", "b", "s1"),
            CodeRecord::new("c", "c", "s2"),
        ];
        let groups = group_by_system(&codes);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].system, "s2");
        assert_eq!(
            groups[0].codes.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "c"]
        );
        assert_eq!(groups[1].system, "s1");
    }

    #[test]
    fn test_bare_root() {
        let code1 = CodeRecord::new("code1", "Code 1", "system1")
            .with_parents("")
            .with_children("");
        let tree = build_tree(
            vec![],
            "system1",
            std::slice::from_ref(&code1),
            &store(std::slice::from_ref(&code1)),
            &SelectedMap::new(),
            Mode::Init,
        )
        .unwrap();

        assert_eq!(tree, vec![HierarchyNode::from(code1)]);
    }

    #[test]
    fn test_end_code_is_placed_under_its_ancestors() {
        let codes = icd10();
        let tree = build_tree(
            vec![],
            "icd10",
            &[codes["A01.1"].clone()],
            &codes,
            &SelectedMap::new(),
            Mode::Init,
        )
        .unwrap();

        assert_eq!(ids(&tree), vec!["A00-A09"]);
        assert_eq!(ids(tree[0].children()), vec!["A00", "A01"]);
        // Siblings known to the store are listed but not expanded
        assert!(tree[0].children()[0].sub_items.is_none());
        assert_eq!(ids(tree[0].children()[1].children()), vec!["A01.0", "A01.1"]);
    }

    #[test]
    fn test_unresolved_parent_becomes_root() {
        let orphan = CodeRecord::new("B99", "Orphan", "icd10").with_parents("B90-B99");
        let mut codes = icd10();
        codes.insert(orphan.id.clone(), orphan.clone());

        let tree = build_tree(
            vec![],
            "icd10",
            &[orphan, codes["A00"].clone()],
            &codes,
            &SelectedMap::new(),
            Mode::Init,
        )
        .unwrap();

        assert_eq!(ids(&tree), vec!["B99", "A00-A09"]);
    }

    #[test]
    fn test_shared_ancestors_are_not_duplicated() {
        let codes = icd10();
        let tree = build_tree(
            vec![],
            "icd10",
            &[codes["A01.0"].clone(), codes["A01.1"].clone(), codes["A00"].clone()],
            &codes,
            &SelectedMap::new(),
            Mode::Init,
        )
        .unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(collect_ids(&tree).len(), 5);
    }

    #[test]
    fn test_selected_status_is_applied_and_aggregated() {
        let codes = icd10();
        let mut selected = SelectedMap::new();
        selected.insert(
            "A01.1".to_string(),
            HierarchyNode::new(codes["A01.1"].clone(), SelectionStatus::Selected),
        );

        let tree = build_tree(
            vec![],
            "icd10",
            &[codes["A01.1"].clone()],
            &codes,
            &selected,
            Mode::Init,
        )
        .unwrap();

        assert_eq!(find_node(&tree, "A01.1").unwrap().status, SelectionStatus::Selected);
        assert_eq!(find_node(&tree, "A01").unwrap().status, SelectionStatus::Indeterminate);
        assert_eq!(tree[0].status, SelectionStatus::Indeterminate);
        assert_eq!(find_node(&tree, "A01.0").unwrap().status, SelectionStatus::Unknown);
    }

    #[test]
    fn test_expand_mode_merges_into_base_tree() {
        let codes = icd10();
        let base = build_tree(
            vec![],
            "icd10",
            &[codes["A00"].clone()],
            &codes,
            &SelectedMap::new(),
            Mode::Init,
        )
        .unwrap();
        assert!(find_node(&base, "A01").unwrap().sub_items.is_none());

        let children = [codes["A01.1"].clone(), codes["A01.0"].clone()];
        let tree = build_tree(
            base,
            "icd10",
            &children,
            &codes,
            &SelectedMap::new(),
            Mode::Expand,
        )
        .unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(ids(find_node(&tree, "A01").unwrap().children()), vec!["A01.0", "A01.1"]);
    }

    #[test]
    fn test_init_mode_discards_base_tree() {
        let codes = icd10();
        let base = vec![HierarchyNode::from(CodeRecord::new("Z", "Z", "icd10"))];
        let tree = build_tree(
            base,
            "icd10",
            &[codes["A00"].clone()],
            &codes,
            &SelectedMap::new(),
            Mode::Init,
        )
        .unwrap();
        assert_eq!(ids(&tree), vec!["A00-A09"]);
    }

    #[test]
    fn test_expanded_children_inherit_parent_selection() {
        let codes = icd10();
        let mut base = build_tree(
            vec![],
            "icd10",
            &[codes["A01"].clone()],
            &codes,
            &SelectedMap::new(),
            Mode::Init,
        )
        .unwrap();
        update_branch_status(&mut base[0], SelectionStatus::Selected);

        let tree = build_tree(
            base,
            "icd10",
            &[codes["A01.0"].clone(), codes["A01.1"].clone()],
            &codes,
            &SelectedMap::new(),
            Mode::Expand,
        )
        .unwrap();

        assert_eq!(find_node(&tree, "A01.0").unwrap().status, SelectionStatus::Selected);
        assert_eq!(tree[0].status, SelectionStatus::Selected);
    }

    #[test]
    fn test_cycle_is_reported() {
        let codes = store(&[
            CodeRecord::new("X", "X", "s").with_parents("Y"),
            CodeRecord::new("Y", "Y", "s").with_parents("Z"),
            CodeRecord::new("Z", "Z", "s").with_parents("X"),
        ]);
        let result = build_tree(
            vec![],
            "s",
            &[codes["X"].clone()],
            &codes,
            &SelectedMap::new(),
            Mode::Init,
        );

        match result {
            Err(HierarchyError::CyclicHierarchy { system, chain }) => {
                assert_eq!(system, "s");
                assert_eq!(chain, vec!["X", "Y", "Z", "X"]);
            }
            other => panic!("Expected CyclicHierarchy, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_parent_prefers_placed_parent() {
        let codes = store(&[
            CodeRecord::new("P1", "P1", "s").with_children("C"),
            CodeRecord::new("P2", "P2", "s").with_children("C"),
            CodeRecord::new("C", "C", "s").with_parents("P1,P2"),
        ]);
        let base = vec![HierarchyNode::from(codes["P2"].clone())];

        let tree = build_tree(
            base,
            "s",
            &[codes["C"].clone()],
            &codes,
            &SelectedMap::new(),
            Mode::Expand,
        )
        .unwrap();

        assert_eq!(ids(&tree), vec!["P2"]);
        assert_eq!(ids(tree[0].children()), vec!["C"]);
    }

    /// R -> {P1, P2}, P1 -> {C, D}, P2 -> {C}
    fn shared_child() -> CodeStore {
        store(&[
            CodeRecord::new("R", "R", "s").with_children("P1,P2"),
            CodeRecord::new("P1", "P1", "s")
                .with_parents("R")
                .with_children("C,D"),
            CodeRecord::new("P2", "P2", "s")
                .with_parents("R")
                .with_children("C"),
            CodeRecord::new("C", "C", "s").with_parents("P1,P2"),
            CodeRecord::new("D", "D", "s").with_parents("P1"),
        ])
    }

    fn node(codes: &CodeStore, id: &str) -> HierarchyNode {
        HierarchyNode::from(codes[id].clone())
    }

    #[test]
    fn test_expanded_parent_receives_shared_child() {
        let codes = shared_child();
        let base = vec![node(&codes, "R").with_sub_items(vec![node(&codes, "P1"), node(&codes, "P2")])];

        let tree = build_tree_under(
            base,
            "s",
            "P2",
            &[codes["C"].clone()],
            &codes,
            &SelectedMap::new(),
        )
        .unwrap();

        assert_eq!(ids(find_node(&tree, "P2").unwrap().children()), vec!["C"]);
        // P1 was not expanded and must not look expanded with a partial list
        assert!(find_node(&tree, "P1").unwrap().sub_items.is_none());
    }

    #[test]
    fn test_shared_child_moves_to_expanded_parent() {
        let codes = shared_child();
        let base = vec![node(&codes, "R").with_sub_items(vec![
            node(&codes, "P1").with_sub_items(vec![node(&codes, "C"), node(&codes, "D")]),
            node(&codes, "P2"),
        ])];

        let tree = build_tree_under(
            base,
            "s",
            "P2",
            &[codes["C"].clone()],
            &codes,
            &SelectedMap::new(),
        )
        .unwrap();

        assert_eq!(ids(find_node(&tree, "P2").unwrap().children()), vec!["C"]);
        assert_eq!(ids(find_node(&tree, "P1").unwrap().children()), vec!["D"]);
        assert_eq!(collect_ids(&tree).iter().filter(|id| *id == "C").count(), 1);
    }

    #[test]
    fn test_placed_code_keeps_its_parent() {
        let codes = shared_child();
        let base = vec![node(&codes, "R").with_sub_items(vec![
            node(&codes, "P1"),
            node(&codes, "P2").with_sub_items(vec![node(&codes, "C")]),
        ])];

        let tree = build_tree(
            base,
            "s",
            &[codes["C"].clone()],
            &codes,
            &SelectedMap::new(),
            Mode::Search,
        )
        .unwrap();

        assert_eq!(ids(find_node(&tree, "P2").unwrap().children()), vec!["C"]);
        assert!(find_node(&tree, "P1").unwrap().sub_items.is_none());
        assert_eq!(collect_ids(&tree).len(), 4);
    }

    #[test]
    fn test_top_level_codes_hang_under_stored_hierarchy_root() {
        let mut codes = icd10();
        codes.insert(
            HIERARCHY_ROOT.to_string(),
            CodeRecord::new(HIERARCHY_ROOT, HIERARCHY_ROOT_LABEL, "icd10").with_children("A00-A09"),
        );

        let tree = build_tree(
            vec![],
            "icd10",
            &[codes["A00"].clone()],
            &codes,
            &SelectedMap::new(),
            Mode::Init,
        )
        .unwrap();

        assert_eq!(ids(&tree), vec![HIERARCHY_ROOT]);
        assert_eq!(ids(tree[0].children()), vec!["A00-A09"]);
    }

    #[test]
    fn test_build_multiple_trees() {
        let mut codes = Codes::new();
        codes.insert("icd10".to_string(), icd10());
        codes.insert(
            "ccam".to_string(),
            store(&[CodeRecord::new("AAFA001", "Exérèse", "ccam")]),
        );

        let mut base_trees = Trees::new();
        base_trees.insert(
            "atc".to_string(),
            vec![HierarchyNode::from(CodeRecord::new("A", "A", "atc"))],
        );

        let groups = vec![
            SystemGroup {
                system: "icd10".to_string(),
                codes: vec![codes["icd10"]["A00"].clone()],
            },
            SystemGroup {
                system: "ccam".to_string(),
                codes: vec![],
            },
        ];

        let trees =
            build_multiple_trees(&base_trees, &groups, &codes, &SelectedCodes::new(), Mode::Init)
                .unwrap();

        assert_eq!(ids(&trees["icd10"]), vec!["A00-A09"]);
        assert_eq!(ids(&trees["ccam"]), vec![HIERARCHY_ROOT]);
        assert_eq!(ids(&trees["atc"]), vec!["A"]);
    }
}
