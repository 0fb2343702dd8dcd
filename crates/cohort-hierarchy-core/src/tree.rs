//! Lookup helpers over a forest of hierarchy nodes.
//!
//! Nodes are always addressed by id. Index paths are derived on demand and
//! only live for the duration of one mutation.

use std::collections::HashMap;

use crate::model::HierarchyNode;

/// Index path from a root of `forest` to the first node with `id` (DFS order).
pub fn find_path(forest: &[HierarchyNode], id: &str) -> Option<Vec<usize>> {
    for (index, node) in forest.iter().enumerate() {
        if node.id() == id {
            return Some(vec![index]);
        }
        if let Some(mut path) = find_path(node.children(), id) {
            path.insert(0, index);
            return Some(path);
        }
    }
    None
}

pub fn node_at<'a>(forest: &'a [HierarchyNode], path: &[usize]) -> Option<&'a HierarchyNode> {
    let (first, rest) = path.split_first()?;
    let mut node = forest.get(*first)?;
    for index in rest {
        node = node.sub_items.as_ref()?.get(*index)?;
    }
    Some(node)
}

pub fn node_at_mut<'a>(
    forest: &'a mut [HierarchyNode],
    path: &[usize],
) -> Option<&'a mut HierarchyNode> {
    let (first, rest) = path.split_first()?;
    let mut node = forest.get_mut(*first)?;
    for index in rest {
        node = node.sub_items.as_mut()?.get_mut(*index)?;
    }
    Some(node)
}

pub fn find_node<'a>(forest: &'a [HierarchyNode], id: &str) -> Option<&'a HierarchyNode> {
    forest.iter().find_map(|root| root.find(id))
}

pub fn find_node_mut<'a>(forest: &'a mut [HierarchyNode], id: &str) -> Option<&'a mut HierarchyNode> {
    let path = find_path(forest, id)?;
    node_at_mut(forest, &path)
}

/// Remove the first node with `id` from `forest` and return it with its subtree.
pub fn take_node(forest: &mut Vec<HierarchyNode>, id: &str) -> Option<HierarchyNode> {
    let path = find_path(forest, id)?;
    let (index, parent_path) = path.split_last()?;
    if parent_path.is_empty() {
        return Some(forest.remove(*index));
    }
    let parent = node_at_mut(forest, parent_path)?;
    Some(parent.sub_items.as_mut()?.remove(*index))
}

/// Id of every materialized node mapped to the id of its parent
/// (`None` for roots).
pub fn parent_map(forest: &[HierarchyNode]) -> HashMap<String, Option<String>> {
    fn visit(nodes: &[HierarchyNode], parent: Option<&str>, map: &mut HashMap<String, Option<String>>) {
        for node in nodes {
            map.insert(node.id().to_string(), parent.map(str::to_string));
            visit(node.children(), Some(node.id()), map);
        }
    }

    let mut map = HashMap::new();
    visit(forest, None, &mut map);
    map
}

/// Visit every node of the forest depth first, parents before children.
pub fn walk<'a>(forest: &'a [HierarchyNode], visit: &mut impl FnMut(&'a HierarchyNode)) {
    for node in forest {
        visit(node);
        walk(node.children(), visit);
    }
}

/// Ids of every materialized node, in DFS order.
pub fn collect_ids(forest: &[HierarchyNode]) -> Vec<String> {
    let mut ids = Vec::new();
    walk(forest, &mut |node| ids.push(node.id().to_string()));
    ids
}
