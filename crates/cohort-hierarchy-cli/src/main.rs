//! Cohort hierarchy CLI
//!
//! Inspect code caches the way the Cohort360 code picker sees them

mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use cohort_hierarchy_core::{
    CodeCache, CodeRecord, Codes, ConfigLoader, HIERARCHY_ROOT, HierarchyConfig,
    HierarchySession, InMemoryTerminology, find_cycles, init_tracing_with,
};
use tracing::{debug, error};

use crate::output::{CheckReport, render_forest};

#[derive(Parser)]
#[command(name = "cohort-hierarchy")]
#[command(about = "Browse, select and check medical code hierarchies from a code cache")]
#[command(version = cohort_hierarchy_core::VERSION)]
#[command(
    long_about = "Loads a code cache (the JSON list of {id: system, options: {code: record}} \
entries) as an in-memory terminology and runs the Cohort360 hierarchy engine on it.\n\
\n\
Examples:\n  \
cohort-hierarchy tree codes.json --system icd10 --depth 1\n  \
cohort-hierarchy tree codes.json --system icd10 --codes A01.1,B00\n  \
cohort-hierarchy selected codes.json --select icd10:A01 --deselect icd10:A01.0\n  \
cohort-hierarchy check codes.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(
        short,
        long,
        global = true,
        help = "Path to configuration file (.cohortrc.json/.cohortrc.toml)"
    )]
    config: Option<PathBuf>,

    /// Verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the hierarchy around some codes
    Tree {
        /// Code cache file
        cache: PathBuf,

        /// Restrict to one coding system
        #[arg(short, long)]
        system: Option<String>,

        /// Codes of interest (default: the hierarchy roots)
        #[arg(long, value_delimiter = ',')]
        codes: Vec<String>,

        /// Expand nodes down to this depth
        #[arg(short, long, default_value_t = 1)]
        depth: usize,

        /// Print the forest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply selections and print the resulting selected codes as JSON
    Selected {
        /// Code cache file
        cache: PathBuf,

        /// Select a code, as `system:id`
        #[arg(long = "select", value_parser = parse_code_ref)]
        select: Vec<(String, String)>,

        /// Deselect a code after all selections, as `system:id`
        #[arg(long = "deselect", value_parser = parse_code_ref)]
        deselect: Vec<(String, String)>,
    },

    /// Report unresolved references and cycles in a code cache
    Check {
        /// Code cache file
        cache: PathBuf,
    },
}

/// Parse a `system:id` reference
fn parse_code_ref(s: &str) -> Result<(String, String), String> {
    match s.split_once(':') {
        Some((system, id)) if !system.is_empty() && !id.is_empty() => {
            Ok((system.to_string(), id.to_string()))
        }
        _ => Err(format!(
            "Invalid code reference '{s}'. Expected 'system:id'"
        )),
    }
}

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.no_color || std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    let log_level = match cli.verbose {
        0 => "cohort_hierarchy=error,cohort_hierarchy_core=error",
        1 => "cohort_hierarchy=warn,cohort_hierarchy_core=warn",
        2 => "cohort_hierarchy=info,cohort_hierarchy_core=info",
        3 => "cohort_hierarchy=debug,cohort_hierarchy_core=debug",
        _ => "cohort_hierarchy=trace,cohort_hierarchy_core=trace",
    };
    init_tracing_with(log_level);

    match run_command(cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("cohort-hierarchy failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = ConfigLoader::load(cli.config.as_deref(), None)?;

    match cli.command {
        Commands::Tree {
            cache,
            system,
            codes,
            depth,
            json,
        } => tree_command(&cache, system.as_deref(), &codes, depth, json, config).await,
        Commands::Selected {
            cache,
            select,
            deselect,
        } => selected_command(&cache, &select, &deselect, config).await,
        Commands::Check { cache } => check_command(&cache),
    }
}

fn load_codes(path: &Path) -> anyhow::Result<Codes> {
    let cache = CodeCache::load(path)
        .with_context(|| format!("Failed to load code cache {}", path.display()))?;
    let codes = cache.to_codes();
    debug!("{} systems in {}", codes.len(), path.display());
    Ok(codes)
}

/// Look `id` up in `system`, or in every system when none is given.
fn find_code(codes: &Codes, system: Option<&str>, id: &str) -> anyhow::Result<CodeRecord> {
    codes
        .iter()
        .filter(|(name, _)| system.is_none_or(|system| system == name.as_str()))
        .find_map(|(_, store)| store.get(id).cloned())
        .with_context(|| match system {
            Some(system) => format!("Unknown code '{id}' in system '{system}'"),
            None => format!("Unknown code '{id}'"),
        })
}

/// Top of each system: the stored hierarchy root, or every parentless code.
fn hierarchy_roots(codes: &Codes, system: Option<&str>) -> Vec<CodeRecord> {
    codes
        .iter()
        .filter(|(name, _)| system.is_none_or(|system| system == name.as_str()))
        .flat_map(|(_, store)| match store.get(HIERARCHY_ROOT) {
            Some(root) => vec![root.clone()],
            None => store
                .values()
                .filter(|code| code.parent_ids().is_empty())
                .cloned()
                .collect(),
        })
        .collect()
}

async fn tree_command(
    cache: &Path,
    system: Option<&str>,
    ids: &[String],
    depth: usize,
    json: bool,
    config: HierarchyConfig,
) -> anyhow::Result<()> {
    let codes = load_codes(cache)?;
    if let Some(system) = system
        && !codes.contains_key(system)
    {
        bail!("Unknown system '{system}'");
    }

    let interest = if ids.is_empty() {
        hierarchy_roots(&codes, system)
    } else {
        ids.iter()
            .map(|id| find_code(&codes, system, id))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let mut session = HierarchySession::with_config(InMemoryTerminology::new(codes), config);
    session.load(&interest).await?;

    // Expand level by level; every expansion materializes its node
    let mut frontier: Vec<(String, String)> = session
        .display()
        .iter()
        .map(|node| (node.system().to_string(), node.id().to_string()))
        .collect();
    for _ in 0..depth {
        let mut next = Vec::new();
        for (system, id) in frontier {
            let node = session.expand(&system, &id).await?;
            next.extend(
                node.children()
                    .iter()
                    .map(|child| (system.clone(), child.id().to_string())),
            );
        }
        frontier = next;
    }

    let display = session.display();
    if json {
        println!("{}", serde_json::to_string_pretty(&display)?);
    } else {
        print!("{}", render_forest(&display));
    }
    Ok(())
}

async fn selected_command(
    cache: &Path,
    select: &[(String, String)],
    deselect: &[(String, String)],
    config: HierarchyConfig,
) -> anyhow::Result<()> {
    let codes = load_codes(cache)?;
    let interest = select
        .iter()
        .chain(deselect)
        .map(|(system, id)| find_code(&codes, Some(system.as_str()), id))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut session = HierarchySession::with_config(InMemoryTerminology::new(codes), config);
    session.load(&interest).await?;

    for (system, id) in select {
        session.select(system, id, true)?;
    }
    for (system, id) in deselect {
        session.select(system, id, false)?;
    }

    println!("{}", serde_json::to_string_pretty(session.selected_codes())?);
    Ok(())
}

fn check_command(cache: &Path) -> anyhow::Result<()> {
    let codes = load_codes(cache)?;
    let mut cycles = 0;

    for (system, store) in &codes {
        let mut report = CheckReport::new(system.as_str(), store.len());

        for code in store.values() {
            for reference in code.parent_ids().into_iter().chain(code.child_ids()) {
                if !store.contains_key(reference) {
                    report
                        .unresolved
                        .push((code.id.clone(), reference.to_string()));
                }
            }
        }
        report.cycles = find_cycles(store);
        debug!(
            "{}: {} unresolved, {} cycles",
            system,
            report.unresolved.len(),
            report.cycles.len()
        );

        cycles += report.cycles.len();
        print!("{}", report.render());
    }

    if cycles > 0 {
        bail!("{cycles} cyclic hierarchies found");
    }
    Ok(())
}
