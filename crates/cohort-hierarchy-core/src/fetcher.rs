//! Missing-code resolution against a remote terminology.
//!
//! Trees can only be built from codes present in the store. When a code of
//! interest references parents or children the store does not hold yet, the
//! gap filler asks a [`FetchHandler`] for them and merges the answers into
//! the store until nothing new is discovered.
//!
//! Merges are first-write-wins: a record already in the store is never
//! replaced. Every id is requested at most once per resolution, so a
//! terminology that never answers for an id cannot make the loop spin; the
//! total number of requests is further bounded by
//! [`FetchConfig::max_fetches`].
//!
//! ```
//! use cohort_hierarchy_core::fetcher::{InMemoryTerminology, get_missing_codes};
//! use cohort_hierarchy_core::model::{CodeRecord, CodeStore, Codes, Mode};
//! use cohort_hierarchy_core::config::FetchConfig;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> cohort_hierarchy_core::Result<()> {
//! let mut icd10 = CodeStore::new();
//! icd10.insert("A01.0".into(), CodeRecord::new("A01.0", "Fièvre typhoïde", "icd10"));
//! let mut terminology = Codes::new();
//! terminology.insert("icd10".into(), icd10);
//! let terminology = InMemoryTerminology::new(terminology);
//!
//! let expanded = CodeRecord::new("A01", "Fièvres typhoïde", "icd10").with_children("A01.0");
//! let store = get_missing_codes(
//!     &[expanded],
//!     &CodeStore::new(),
//!     &[],
//!     "icd10",
//!     Mode::Expand,
//!     &terminology,
//!     &FetchConfig::default(),
//! )
//! .await?;
//! assert!(store.contains_key("A01.0"));
//! # Ok(())
//! # }
//! ```

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace, warn};

use crate::config::FetchConfig;
use crate::error::HierarchyError;
use crate::model::{CodeRecord, CodeStore, Codes, Mode, SystemGroup, Trees};
use crate::result::Result;
use crate::store::insert_codes;
use crate::tree::walk;

/// Source of code records, typically a REST terminology service.
///
/// `fetch` returns the records known for `code_id` in `system`. Returning
/// related records (children, ancestors) as well is allowed; they are merged
/// like any other answer.
#[async_trait]
pub trait FetchHandler: Send + Sync {
    async fn fetch(&self, code_id: &str, system: &str) -> anyhow::Result<Vec<CodeRecord>>;
}

#[async_trait]
impl<F, Fut> FetchHandler for F
where
    F: Fn(String, String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<CodeRecord>>> + Send + 'static,
{
    async fn fetch(&self, code_id: &str, system: &str) -> anyhow::Result<Vec<CodeRecord>> {
        (self)(code_id.to_string(), system.to_string()).await
    }
}

/// Fill the gaps below `nodes_of_interest` and return the merged store.
///
/// In `Mode::Expand` only `expand_depth` levels below the nodes of interest
/// are resolved. Other modes also seed the resolution with `full_list` and go
/// down `eager_depth` levels, or until no new code shows up.
///
/// # Errors
///
/// - `HierarchyError::Fetch` when the handler fails; nothing is retried.
/// - `HierarchyError::FetchLimitExceeded` when `max_fetches` is reached.
pub async fn get_missing_codes<F>(
    nodes_of_interest: &[CodeRecord],
    prev_codes: &CodeStore,
    full_list: &[CodeRecord],
    system: &str,
    mode: Mode,
    fetch_handler: &F,
    config: &FetchConfig,
) -> Result<CodeStore>
where
    F: FetchHandler + ?Sized,
{
    let mut store = prev_codes.clone();
    fill_missing_codes(
        &mut store,
        nodes_of_interest,
        full_list,
        system,
        mode,
        fetch_handler,
        config,
    )
    .await?;
    Ok(store)
}

/// [`get_missing_codes`] merging straight into `store`.
///
/// On error, the records merged before the failing request stay in `store`.
#[instrument(skip_all, fields(system = %system, mode = ?mode))]
pub async fn fill_missing_codes<F>(
    store: &mut CodeStore,
    nodes_of_interest: &[CodeRecord],
    full_list: &[CodeRecord],
    system: &str,
    mode: Mode,
    fetch_handler: &F,
    config: &FetchConfig,
) -> Result<()>
where
    F: FetchHandler + ?Sized,
{
    let mut seeds: Vec<&CodeRecord> = nodes_of_interest.iter().collect();
    if mode != Mode::Expand {
        seeds.extend(full_list.iter().filter(|code| code.system == system));
    }
    insert_codes(store, seeds.iter().map(|code| (*code).clone()));

    let max_depth = match mode {
        Mode::Expand => Some(config.expand_depth),
        Mode::Init | Mode::Search => config.eager_depth,
    };

    let mut filler = GapFiller::new(system, fetch_handler, config);
    let seed_ids = seeds.iter().map(|code| code.id.clone()).collect();
    filler.resolve_descendants(seed_ids, store, max_depth).await?;

    debug!(
        "Resolved {} store: {} codes, {} fetches",
        system,
        store.len(),
        filler.fetches
    );
    Ok(())
}

/// Resolve, for every group, the ancestors and descendants of its codes.
///
/// Ancestors are looked up in `codes`, then in the system's tree, and only
/// fetched when found in neither. The direct children of every ancestor are
/// resolved too, so a parent placed on a path shows all of its children.
/// Descendants of the codes are resolved `eager_depth` levels down, until no
/// new code shows up by default.
pub async fn get_missing_codes_with_systems<F>(
    trees: &Trees,
    groups: &[SystemGroup],
    codes: &Codes,
    fetch_handler: &F,
    config: &FetchConfig,
) -> Result<Codes>
where
    F: FetchHandler + ?Sized,
{
    let mut result = codes.clone();
    fill_missing_codes_with_systems(
        trees,
        groups,
        &mut result,
        fetch_handler,
        config,
        config.eager_depth,
    )
    .await?;
    Ok(result)
}

/// [`get_missing_codes_with_systems`] merging straight into `codes`, going
/// at most `descent` levels below the codes of each group (`None` for no
/// limit).
///
/// On error, the records merged before the failing request stay in `codes`.
#[instrument(skip_all, fields(systems = groups.len()))]
pub async fn fill_missing_codes_with_systems<F>(
    trees: &Trees,
    groups: &[SystemGroup],
    codes: &mut Codes,
    fetch_handler: &F,
    config: &FetchConfig,
    descent: Option<usize>,
) -> Result<()>
where
    F: FetchHandler + ?Sized,
{
    for group in groups {
        let system = group.system.as_str();
        let store = codes.entry(system.to_string()).or_default();
        insert_codes(store, group.codes.iter().cloned());

        let mut from_tree = CodeStore::new();
        if let Some(tree) = trees.get(system) {
            walk(tree, &mut |node| {
                from_tree
                    .entry(node.id().to_string())
                    .or_insert_with(|| node.code.clone());
            });
        }

        let seed_ids: Vec<String> = group.codes.iter().map(|code| code.id.clone()).collect();
        let mut filler = GapFiller::new(system, fetch_handler, config);
        let ancestors = filler
            .resolve_ancestors(seed_ids.clone(), store, &from_tree)
            .await?;
        filler.resolve_descendants(ancestors, store, Some(1)).await?;
        filler.resolve_descendants(seed_ids, store, descent).await?;

        debug!(
            "Resolved {} store: {} codes, {} fetches",
            system,
            store.len(),
            filler.fetches
        );
    }

    Ok(())
}

struct GapFiller<'a, F: ?Sized> {
    system: &'a str,
    handler: &'a F,
    config: &'a FetchConfig,
    requested: HashSet<String>,
    fetches: usize,
}

impl<'a, F> GapFiller<'a, F>
where
    F: FetchHandler + ?Sized,
{
    fn new(system: &'a str, handler: &'a F, config: &'a FetchConfig) -> Self {
        Self {
            system,
            handler,
            config,
            requested: HashSet::new(),
            fetches: 0,
        }
    }

    /// Request `id` once and merge the answer.
    async fn fetch_into(&mut self, id: &str, store: &mut CodeStore) -> Result<()> {
        if !self.requested.insert(id.to_string()) {
            return Ok(());
        }
        if self.fetches >= self.config.max_fetches {
            return Err(HierarchyError::FetchLimitExceeded {
                system: self.system.to_string(),
                limit: self.config.max_fetches,
            });
        }
        self.fetches += 1;

        trace!("Fetching {} in {}", id, self.system);
        let records = self
            .handler
            .fetch(id, self.system)
            .await
            .map_err(|source| HierarchyError::Fetch {
                code_id: id.to_string(),
                system: self.system.to_string(),
                source,
            })?;
        let inserted = insert_codes(store, records);
        trace!("{} new codes from {}", inserted, id);

        if !store.contains_key(id) {
            warn!("Code {} could not be resolved in {}", id, self.system);
        }
        Ok(())
    }

    /// Breadth-first walk down `inferior_levels_ids`, fetching missing
    /// children, for at most `max_depth` levels.
    async fn resolve_descendants(
        &mut self,
        seeds: Vec<String>,
        store: &mut CodeStore,
        max_depth: Option<usize>,
    ) -> Result<()> {
        let mut visited: HashSet<String> = seeds.iter().cloned().collect();
        let mut frontier = seeds;
        let mut depth = 0;

        while !frontier.is_empty() {
            if max_depth.is_some_and(|max_depth| depth >= max_depth) {
                break;
            }
            depth += 1;

            let mut next = Vec::new();
            for parent_id in frontier {
                let child_ids: Vec<String> = match store.get(&parent_id) {
                    Some(parent) => parent.child_ids().into_iter().map(String::from).collect(),
                    None => continue,
                };
                for child_id in child_ids {
                    if !store.contains_key(&child_id) {
                        self.fetch_into(&child_id, store).await?;
                    }
                    if store.contains_key(&child_id) && visited.insert(child_id.clone()) {
                        next.push(child_id);
                    }
                }
            }
            frontier = next;
        }
        Ok(())
    }

    /// Walk up `above_levels_ids` from the seeds until every ancestor is
    /// known. Returns the ancestors found, nearest first.
    async fn resolve_ancestors(
        &mut self,
        seeds: Vec<String>,
        store: &mut CodeStore,
        from_tree: &CodeStore,
    ) -> Result<Vec<String>> {
        let mut ancestors = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = seeds.into();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let parent_ids: Vec<String> = match store.get(&id) {
                Some(code) => code.parent_ids().into_iter().map(String::from).collect(),
                None => continue,
            };
            for parent_id in parent_ids {
                if !store.contains_key(&parent_id) {
                    match from_tree.get(&parent_id) {
                        Some(record) => {
                            store.insert(parent_id.clone(), record.clone());
                        }
                        None => self.fetch_into(&parent_id, store).await?,
                    }
                }
                if store.contains_key(&parent_id) && !ancestors.contains(&parent_id) {
                    ancestors.push(parent_id.clone());
                    queue.push_back(parent_id);
                }
            }
        }
        Ok(ancestors)
    }
}

/// A [`FetchHandler`] answering from an in-memory copy of a terminology.
///
/// Returns `[record]` for a known id and `[]` otherwise. Requests are
/// recorded so callers can inspect what was asked.
#[derive(Debug, Default)]
pub struct InMemoryTerminology {
    codes: Codes,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, String)>>,
}

impl InMemoryTerminology {
    pub fn new(codes: Codes) -> Self {
        Self {
            codes,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn codes(&self) -> &Codes {
        &self.codes
    }

    /// Number of `fetch` calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(code_id, system)` pairs in request order.
    pub async fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl FetchHandler for InMemoryTerminology {
    async fn fetch(&self, code_id: &str, system: &str) -> anyhow::Result<Vec<CodeRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .await
            .push((code_id.to_string(), system.to_string()));

        Ok(self
            .codes
            .get(system)
            .and_then(|store| store.get(code_id))
            .cloned()
            .into_iter()
            .collect())
    }
}
