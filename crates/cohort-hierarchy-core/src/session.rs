//! Multi-system hierarchy session.
//!
//! A [`HierarchySession`] keeps one code store, one forest and one selection
//! map per coding system, and drives the gap filler, tree builder and
//! selection propagator over them. Nodes are addressed by `(system, id)`.
//!
//! Trees and selections only change once fetching and building succeeded.
//! Records merged into a store before a failed fetch are kept, so a retry
//! only asks for what is still missing.

use tracing::{Instrument, debug, info, info_span};

use crate::builder::{build_multiple_trees, build_tree_under, group_by_system};
use crate::config::HierarchyConfig;
use crate::display::get_display_from_trees;
use crate::error::HierarchyError;
use crate::fetcher::{FetchHandler, fill_missing_codes, fill_missing_codes_with_systems};
use crate::model::{
    CodeRecord, CodeStore, Codes, HierarchyNode, Mode, SelectedCodes, SelectedMap,
    SelectionStatus, Trees,
};
use crate::result::Result;
use crate::selection::{get_selected_codes_from_tree, get_selected_codes_from_trees, set_node_status};
use crate::store::CodeCache;
use crate::tree::{find_node, find_node_mut};

pub struct HierarchySession<F> {
    codes: Codes,
    trees: Trees,
    selected: SelectedCodes,
    codes_of_interest: Vec<CodeRecord>,
    handler: F,
    config: HierarchyConfig,
}

impl<F: FetchHandler> HierarchySession<F> {
    pub fn new(handler: F) -> Self {
        Self::with_config(handler, HierarchyConfig::default())
    }

    pub fn with_config(handler: F, config: HierarchyConfig) -> Self {
        Self {
            codes: Codes::new(),
            trees: Trees::new(),
            selected: SelectedCodes::new(),
            codes_of_interest: Vec::new(),
            handler,
            config,
        }
    }

    /// Start from previously persisted code stores.
    pub fn from_cache(handler: F, config: HierarchyConfig, cache: &CodeCache) -> Self {
        let mut session = Self::with_config(handler, config);
        session.codes = cache.to_codes();
        session
    }

    /// Seed the selection recorded by an earlier session.
    ///
    /// Applied to nodes created by the next `load`, `search` or `expand`.
    pub fn with_selection(mut self, selected: SelectedCodes) -> Self {
        self.selected = selected;
        self
    }

    /// Complete the stores for `codes_of_interest` and rebuild their trees.
    ///
    /// Every ancestor is resolved, descendants only `fetch.loadDepth` levels
    /// down. Returns the display forest of the codes of interest.
    pub async fn load(&mut self, codes_of_interest: &[CodeRecord]) -> Result<Vec<HierarchyNode>> {
        let span = info_span!("load", codes = codes_of_interest.len());
        self.rebuild(codes_of_interest, Mode::Init).instrument(span).await?;
        self.codes_of_interest = codes_of_interest.to_vec();
        Ok(self.display())
    }

    /// Merge search results into the existing trees.
    ///
    /// Unlike [`load`](Self::load), expanded branches are kept.
    pub async fn search(&mut self, results: &[CodeRecord]) -> Result<Vec<HierarchyNode>> {
        let span = info_span!("search", results = results.len());
        self.rebuild(results, Mode::Search).instrument(span).await?;
        Ok(get_display_from_trees(results, &self.trees))
    }

    async fn rebuild(&mut self, codes_of_interest: &[CodeRecord], mode: Mode) -> Result<()> {
        let groups = group_by_system(codes_of_interest);
        fill_missing_codes_with_systems(
            &self.trees,
            &groups,
            &mut self.codes,
            &self.handler,
            &self.config.fetch,
            Some(self.config.fetch.load_depth),
        )
        .await?;
        let trees = build_multiple_trees(&self.trees, &groups, &self.codes, &self.selected, mode)?;

        self.selected = get_selected_codes_from_trees(&trees, &self.selected);
        self.trees = trees;
        info!(
            "Loaded {} systems, {} codes",
            self.trees.len(),
            self.codes.values().map(|store| store.len()).sum::<usize>()
        );
        Ok(())
    }

    /// Fetch and materialize the children of `(system, id)`.
    ///
    /// Returns the expanded node. Children that list several parents are
    /// placed under it.
    ///
    /// # Errors
    ///
    /// `HierarchyError::NodeNotFound` when the node is not in the tree. On
    /// fetch failure the tree is left as it was.
    pub async fn expand(&mut self, system: &str, id: &str) -> Result<&HierarchyNode> {
        let span = info_span!("expand", system = %system, id = %id);
        self.expand_node(system, id).instrument(span).await?;
        self.node(system, id)
    }

    async fn expand_node(&mut self, system: &str, id: &str) -> Result<()> {
        let tree_record = self.node(system, id)?.code.clone();
        let store = self.codes.entry(system.to_string()).or_default();
        let record = store.get(id).cloned().unwrap_or(tree_record);

        fill_missing_codes(
            store,
            std::slice::from_ref(&record),
            &[],
            system,
            Mode::Expand,
            &self.handler,
            &self.config.fetch,
        )
        .await?;

        let store: &CodeStore = store;
        let children: Vec<CodeRecord> = record
            .child_ids()
            .into_iter()
            .filter_map(|child_id| store.get(child_id).cloned())
            .collect();
        debug!("Expanding {} with {} children", id, children.len());

        let base_tree = self.trees.get(system).cloned().unwrap_or_default();
        let empty_selection = SelectedMap::new();
        let selection = self.selected.get(system).unwrap_or(&empty_selection);
        let mut forest = build_tree_under(base_tree, system, id, &children, store, selection)?;

        // Only a node without resolvable children is an expanded leaf
        if children.is_empty()
            && let Some(node) = find_node_mut(&mut forest, id)
            && node.sub_items.is_none()
        {
            node.sub_items = Some(Vec::new());
        }

        self.selected
            .insert(system.to_string(), get_selected_codes_from_tree(&forest));
        self.trees.insert(system.to_string(), forest);
        Ok(())
    }

    /// Select or deselect the branch rooted at `(system, id)`.
    pub fn select(&mut self, system: &str, id: &str, selected: bool) -> Result<()> {
        let _span = info_span!("select", system = %system, id = %id, selected).entered();

        let forest = self
            .trees
            .get_mut(system)
            .ok_or_else(|| HierarchyError::node_not_found(system, id))?;
        if !set_node_status(forest, id, SelectionStatus::from_selected(selected)) {
            return Err(HierarchyError::node_not_found(system, id));
        }

        let selection = get_selected_codes_from_tree(forest);
        debug!("{} selected codes in {}", selection.len(), system);
        self.selected.insert(system.to_string(), selection);
        Ok(())
    }

    /// Remove `(system, id)` from the selection.
    ///
    /// A code only known from a recorded selection is dropped from it.
    pub fn delete_code(&mut self, system: &str, id: &str) -> Result<()> {
        let _span = info_span!("delete_code", system = %system, id = %id).entered();

        let in_tree = self
            .trees
            .get(system)
            .is_some_and(|forest| find_node(forest, id).is_some());
        if in_tree {
            return self.select(system, id, false);
        }

        match self
            .selected
            .get_mut(system)
            .and_then(|selection| selection.shift_remove(id))
        {
            Some(_) => Ok(()),
            None => Err(HierarchyError::node_not_found(system, id)),
        }
    }

    pub fn node(&self, system: &str, id: &str) -> Result<&HierarchyNode> {
        self.trees
            .get(system)
            .and_then(|forest| find_node(forest, id))
            .ok_or_else(|| HierarchyError::node_not_found(system, id))
    }

    pub fn trees(&self) -> &Trees {
        &self.trees
    }

    pub fn codes(&self) -> &Codes {
        &self.codes
    }

    pub fn selected_codes(&self) -> &SelectedCodes {
        &self.selected
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Display forest of the codes passed to the last `load`.
    pub fn display(&self) -> Vec<HierarchyNode> {
        get_display_from_trees(&self.codes_of_interest, &self.trees)
    }

    /// Display forest of the currently selected codes.
    pub fn selected_display(&self) -> Vec<HierarchyNode> {
        let selected: Vec<CodeRecord> = self
            .selected
            .values()
            .flat_map(|selection| selection.values())
            .map(|node| node.code.clone())
            .collect();
        get_display_from_trees(&selected, &self.trees)
    }

    /// Flat form of the stores, for persistence.
    pub fn cache(&self) -> CodeCache {
        CodeCache::from_codes(&self.codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::fetcher::InMemoryTerminology;

    fn icd10() -> Vec<CodeRecord> {
        vec![
            CodeRecord::new("A00-A09", "Maladies intestinales", "icd10").with_children("A00,A01"),
            CodeRecord::new("A00", "Choléra", "icd10").with_parents("A00-A09"),
            CodeRecord::new("A01", "Fièvres typhoïde", "icd10")
                .with_parents("A00-A09")
                .with_children("A01.0,A01.1"),
            CodeRecord::new("A01.0", "Fièvre typhoïde", "icd10").with_parents("A01"),
            CodeRecord::new("A01.1", "Paratyphoïde A", "icd10").with_parents("A01"),
        ]
    }

    fn terminology() -> InMemoryTerminology {
        let store: CodeStore = icd10().into_iter().map(|r| (r.id.clone(), r)).collect();
        let mut codes = Codes::new();
        codes.insert("icd10".to_string(), store);
        InMemoryTerminology::new(codes)
    }

    #[tokio::test]
    async fn test_load_places_code_under_its_ancestors() {
        let mut session = HierarchySession::new(terminology());
        let leaf = icd10()[4].clone();

        let display = session.load(std::slice::from_ref(&leaf)).await.unwrap();

        assert_eq!(display.len(), 1);
        assert_eq!(display[0].id(), "A00-A09");
        assert!(display[0].contains("A01.1"));
    }

    #[tokio::test]
    async fn test_expand_materializes_children() {
        let mut session = HierarchySession::new(terminology());
        session.load(&icd10()[..1]).await.unwrap();

        let root = session.node("icd10", "A00-A09").unwrap();
        assert!(root.sub_items.is_none());

        let expanded = session.expand("icd10", "A00-A09").await.unwrap();
        let ids: Vec<&str> = expanded.children().iter().map(HierarchyNode::id).collect();
        assert_eq!(ids, vec!["A00", "A01"]);
    }

    #[tokio::test]
    async fn test_expand_leaf_marks_it_expanded() {
        let mut session = HierarchySession::new(terminology());
        session.load(&icd10()[1..2]).await.unwrap();

        let leaf = session.expand("icd10", "A00").await.unwrap();
        assert_eq!(leaf.sub_items, Some(vec![]));
    }

    #[tokio::test]
    async fn test_expand_unknown_node() {
        let mut session = HierarchySession::new(terminology());
        let result = session.expand("icd10", "Z99").await;
        assert!(matches!(result, Err(HierarchyError::NodeNotFound { .. })));
    }

    #[tokio::test]
    async fn test_select_updates_selected_codes() {
        let mut session = HierarchySession::new(terminology());
        session.load(&icd10()[4..]).await.unwrap();

        session.select("icd10", "A01", true).unwrap();
        let selected = &session.selected_codes()["icd10"];
        assert!(selected.contains_key("A01"));
        assert!(selected.contains_key("A01.0"));
        assert!(!selected.contains_key("A00-A09"));
        assert_eq!(
            session.node("icd10", "A00-A09").unwrap().status,
            SelectionStatus::Indeterminate
        );

        session.select("icd10", "A00", true).unwrap();
        assert_eq!(
            session.node("icd10", "A00-A09").unwrap().status,
            SelectionStatus::Selected
        );
    }

    #[tokio::test]
    async fn test_delete_code_deselects() {
        let mut session = HierarchySession::new(terminology());
        session.load(&icd10()[4..]).await.unwrap();
        session.select("icd10", "A01", true).unwrap();

        session.delete_code("icd10", "A01.0").unwrap();

        let selected = &session.selected_codes()["icd10"];
        assert!(!selected.contains_key("A01.0"));
        assert!(!selected.contains_key("A01"));
        assert!(selected.contains_key("A01.1"));
    }

    #[tokio::test]
    async fn test_delete_code_only_in_selection() {
        let mut recorded = SelectedMap::new();
        recorded.insert(
            "B01".to_string(),
            HierarchyNode::new(CodeRecord::new("B01", "Varicelle", "icd10"), SelectionStatus::Selected),
        );
        let mut selection = SelectedCodes::new();
        selection.insert("icd10".to_string(), recorded);
        let mut session = HierarchySession::new(terminology()).with_selection(selection);

        session.delete_code("icd10", "B01").unwrap();
        assert!(session.selected_codes()["icd10"].is_empty());
        assert!(session.delete_code("icd10", "B01").is_err());
    }

    #[tokio::test]
    async fn test_recorded_selection_is_applied_on_load() {
        let mut recorded = SelectedMap::new();
        let a01 = icd10()[2].clone();
        recorded.insert(
            "A01".to_string(),
            HierarchyNode::new(a01.clone(), SelectionStatus::Selected),
        );
        let mut selection = SelectedCodes::new();
        selection.insert("icd10".to_string(), recorded);

        let mut session = HierarchySession::new(terminology()).with_selection(selection);
        session.load(&[a01]).await.unwrap();

        assert_eq!(
            session.node("icd10", "A01").unwrap().status,
            SelectionStatus::Selected
        );
        assert_eq!(
            session.node("icd10", "A00-A09").unwrap().status,
            SelectionStatus::Indeterminate
        );

        let expanded = session.expand("icd10", "A01").await.unwrap();
        assert!(
            expanded
                .children()
                .iter()
                .all(|child| child.status == SelectionStatus::Selected)
        );
    }

    #[tokio::test]
    async fn test_failed_expand_keeps_fetched_records() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let source: CodeStore = icd10().into_iter().map(|r| (r.id.clone(), r)).collect();
        let handler = move |id: String, _system: String| {
            log.lock().unwrap().push(id.clone());
            let found: Vec<CodeRecord> = source.get(&id).cloned().into_iter().collect();
            async move {
                if id == "A01" {
                    return Err(anyhow::anyhow!("terminology down for {id}"));
                }
                Ok(found)
            }
        };
        let mut session = HierarchySession::new(handler);
        session.load(&icd10()[..1]).await.unwrap();
        let before = session.trees().clone();

        match session.expand("icd10", "A00-A09").await {
            Err(HierarchyError::Fetch { code_id, .. }) => assert_eq!(code_id, "A01"),
            other => panic!("Expected Fetch error, got {other:?}"),
        }

        assert_eq!(session.trees(), &before);
        assert!(session.codes()["icd10"].contains_key("A00"));
        assert!(!session.codes()["icd10"].contains_key("A01"));

        // Retrying only asks for what is still missing
        requests.lock().unwrap().clear();
        assert!(session.expand("icd10", "A00-A09").await.is_err());
        assert_eq!(*requests.lock().unwrap(), vec!["A01".to_string()]);
    }

    #[tokio::test]
    async fn test_expand_node_with_unresolvable_children_is_a_leaf() {
        let mut parent = icd10()[1].clone();
        parent.inferior_levels_ids = Some("A00.0,A00.1".to_string());
        let mut session = HierarchySession::new(terminology());
        session.load(&[parent]).await.unwrap();

        let expanded = session.expand("icd10", "A00").await.unwrap();
        assert_eq!(expanded.sub_items, Some(vec![]));
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let mut session = HierarchySession::new(terminology());
        session.load(&icd10()[3..4]).await.unwrap();

        let restored =
            HierarchySession::from_cache(terminology(), HierarchyConfig::default(), &session.cache());
        assert_eq!(restored.codes(), session.codes());
    }
}
