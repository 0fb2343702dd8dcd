//! Tri-state selection propagation.
//!
//! Selecting a node selects its whole branch (top-down override). Parents are
//! then recomputed from their direct children, bottom-up:
//!
//! | children                          | parent          |
//! |-----------------------------------|-----------------|
//! | all `Selected`                    | `Selected`      |
//! | all `NotSelected` or `Unknown`    | `NotSelected`   |
//! | anything else                     | `Indeterminate` |
//!
//! [`get_item_selected_status`] only looks at direct children, so callers
//! must settle children before parents. [`set_node_status`] and
//! [`refresh_statuses`] do that traversal.

use tracing::trace;

use crate::model::{HierarchyNode, SelectedCodes, SelectedMap, SelectionStatus, Trees};
use crate::tree::{find_path, node_at_mut};

/// Set `status` on `node` and every descendant.
pub fn update_branch_status(
    node: &mut HierarchyNode,
    status: SelectionStatus,
) -> &mut HierarchyNode {
    node.status = status;
    if let Some(children) = node.sub_items.as_mut() {
        for child in children.iter_mut() {
            update_branch_status(child, status);
        }
    }
    node
}

/// Aggregate status of a node from its direct children.
pub fn get_item_selected_status(node: &HierarchyNode) -> SelectionStatus {
    let children = node.children();
    if children.is_empty() {
        return node.status;
    }

    if children
        .iter()
        .all(|child| child.status == SelectionStatus::Selected)
    {
        SelectionStatus::Selected
    } else if children.iter().all(|child| {
        matches!(
            child.status,
            SelectionStatus::NotSelected | SelectionStatus::Unknown
        )
    }) {
        SelectionStatus::NotSelected
    } else {
        SelectionStatus::Indeterminate
    }
}

/// Every `Selected` node of the forest, keyed by id, without children.
pub fn get_selected_codes_from_tree(tree: &[HierarchyNode]) -> SelectedMap {
    let mut selected = SelectedMap::new();
    collect_selected(tree, &mut selected);
    selected
}

fn collect_selected(nodes: &[HierarchyNode], selected: &mut SelectedMap) {
    for node in nodes {
        if node.status == SelectionStatus::Selected {
            selected.insert(node.id().to_string(), node.shallow());
        }
        collect_selected(node.children(), selected);
    }
}

/// Per-system selection. Systems missing from `trees` keep their `prev_codes`.
pub fn get_selected_codes_from_trees(trees: &Trees, prev_codes: &SelectedCodes) -> SelectedCodes {
    let mut selected: SelectedCodes = trees
        .iter()
        .map(|(system, tree)| (system.clone(), get_selected_codes_from_tree(tree)))
        .collect();

    for (system, codes) in prev_codes {
        if !selected.contains_key(system) {
            selected.insert(system.clone(), codes.clone());
        }
    }
    selected
}

/// Apply `status` to the branch rooted at `id`, then recompute its ancestors.
///
/// Returns `false` when `id` is not materialized in `forest`.
pub fn set_node_status(forest: &mut [HierarchyNode], id: &str, status: SelectionStatus) -> bool {
    let Some(path) = find_path(forest, id) else {
        return false;
    };
    let Some(node) = node_at_mut(forest, &path) else {
        return false;
    };
    update_branch_status(node, status);

    for depth in (1..path.len()).rev() {
        if let Some(ancestor) = node_at_mut(forest, &path[..depth]) {
            let aggregated = get_item_selected_status(ancestor);
            trace!("{} -> {:?}", ancestor.id(), aggregated);
            ancestor.status = aggregated;
        }
    }
    true
}

/// Recompute every parent bottom-up.
///
/// Subtrees without any known status are left `Unknown`.
pub fn refresh_statuses(forest: &mut [HierarchyNode]) {
    for node in forest.iter_mut() {
        refresh_node(node);
    }
}

fn refresh_node(node: &mut HierarchyNode) -> bool {
    let mut children_known = false;
    if let Some(children) = node.sub_items.as_mut() {
        for child in children.iter_mut() {
            children_known |= refresh_node(child);
        }
    }
    if children_known {
        node.status = get_item_selected_status(node);
    }
    children_known || !node.status.is_unknown()
}
