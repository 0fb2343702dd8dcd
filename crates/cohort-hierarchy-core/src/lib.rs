//! Cohort Hierarchy Core
//!
//! Hierarchy engine for the Cohort360 code picker. Medical terminologies
//! (ICD-10, CCAM, ATC, ...) are delivered as flat records that reference
//! their parents and children by id. This crate turns them into navigable
//! per-system forests, fills the gaps by asking a remote terminology for
//! missing codes, and keeps a tri-state selection consistent across each
//! forest.

pub mod builder;
pub mod config;
pub mod display;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod result;
pub mod selection;
pub mod session;
pub mod store;
pub mod tree;

// Re-export commonly used types
pub use builder::{
    build_multiple_trees, build_tree, build_tree_under, create_hierarchy_root, group_by_system,
};
pub use config::{ConfigLoader, FetchConfig, HierarchyConfig};
pub use display::{get_display_from_tree, get_display_from_trees};
pub use error::{ErrorKind, HierarchyError};
pub use fetcher::{
    FetchHandler, InMemoryTerminology, fill_missing_codes, fill_missing_codes_with_systems,
    get_missing_codes, get_missing_codes_with_systems,
};
pub use model::{
    CodeRecord, CodeStore, Codes, HIERARCHY_ROOT, HIERARCHY_ROOT_LABEL, HierarchyNode, Mode,
    SelectedCodes, SelectedMap, SelectionStatus, SystemGroup, Trees,
};
pub use result::Result;
pub use selection::{
    get_item_selected_status, get_selected_codes_from_tree, get_selected_codes_from_trees,
    update_branch_status,
};
pub use session::HierarchySession;
pub use store::{CacheEntry, CodeCache, find_cycles, map_cache_to_codes, map_codes_to_cache};

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    init_tracing_with("cohort_hierarchy_core=info,cohort_hierarchy=info");
}

/// Initialize tracing with `default_directives` unless `RUST_LOG` is set.
pub fn init_tracing_with(default_directives: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
