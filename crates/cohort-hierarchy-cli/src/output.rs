//! Terminal rendering of forests and check reports

use colored::*;
use cohort_hierarchy_core::{HierarchyNode, SelectionStatus};

/// Render `forest` as an indented tree, one node per line.
pub fn render_forest(forest: &[HierarchyNode]) -> String {
    let mut out = String::new();
    for node in forest {
        render_node(node, 0, &mut out);
    }
    out
}

fn render_node(node: &HierarchyNode, depth: usize, out: &mut String) {
    let folded = if node.sub_items.is_none() && !node.code.child_ids().is_empty() {
        " …".dimmed().to_string()
    } else {
        String::new()
    };
    out.push_str(&format!(
        "{}{} {} {}{}\n",
        "  ".repeat(depth),
        status_marker(node.status),
        node.id().bold(),
        node.code.label,
        folded
    ));
    for child in node.children() {
        render_node(child, depth + 1, out);
    }
}

fn status_marker(status: SelectionStatus) -> ColoredString {
    match status {
        SelectionStatus::Selected => "[x]".green(),
        SelectionStatus::NotSelected => "[ ]".normal(),
        SelectionStatus::Indeterminate => "[-]".yellow(),
        SelectionStatus::Unknown => "[ ]".dimmed(),
    }
}

/// Problems found in one system's store.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub system: String,
    pub codes: usize,
    pub unresolved: Vec<(String, String)>,
    pub cycles: Vec<Vec<String>>,
}

impl CheckReport {
    pub fn new(system: impl Into<String>, codes: usize) -> Self {
        Self {
            system: system.into(),
            codes,
            ..Self::default()
        }
    }

    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{}: {} codes, {} unresolved references, {} cycles\n",
            self.system.bold(),
            self.codes,
            self.unresolved.len(),
            self.cycles.len()
        );
        for (code, reference) in &self.unresolved {
            out.push_str(&format!(
                "  {} {} references unknown code {}\n",
                "warning:".yellow(),
                code,
                reference
            ));
        }
        for chain in &self.cycles {
            out.push_str(&format!("  {} cycle {}\n", "error:".red(), chain.join(" → ")));
        }
        out
    }
}
