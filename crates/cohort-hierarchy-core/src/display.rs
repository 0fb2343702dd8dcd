//! Display forests for the "selected codes in context" summary.

use std::collections::HashSet;

use crate::builder::group_by_system;
use crate::model::{CodeRecord, HierarchyNode, Trees};

/// Roots of `tree` containing the codes of interest, whole and once each.
///
/// A code not found in any root is returned as a standalone node. Output
/// follows the order in which codes of interest first hit each entry.
pub fn get_display_from_tree(
    codes_of_interest: &[CodeRecord],
    tree: &[HierarchyNode],
) -> Vec<HierarchyNode> {
    let mut display = Vec::new();
    let mut used_roots: HashSet<usize> = HashSet::new();
    let mut standalone: HashSet<&str> = HashSet::new();

    for code in codes_of_interest {
        match tree.iter().position(|root| root.contains(&code.id)) {
            Some(index) => {
                if used_roots.insert(index) {
                    display.push(tree[index].clone());
                }
            }
            None => {
                if standalone.insert(code.id.as_str()) {
                    display.push(HierarchyNode::from(code.clone()));
                }
            }
        }
    }
    display
}

/// Per-system [`get_display_from_tree`], concatenated in system order.
pub fn get_display_from_trees(codes_of_interest: &[CodeRecord], trees: &Trees) -> Vec<HierarchyNode> {
    group_by_system(codes_of_interest)
        .into_iter()
        .flat_map(|group| {
            let tree = trees.get(&group.system).map(Vec::as_slice).unwrap_or(&[]);
            get_display_from_tree(&group.codes, tree)
        })
        .collect()
}
