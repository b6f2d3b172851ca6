//! Result aggregation.
//!
//! [`ResultAggregator::build`] turns an executed [`ProbeTree`] into a
//! [`RenderableTree`]: a label-only arena mirroring the resolution hierarchy,
//! plus the pass/fail totals and the captured error lines. Both renderers read
//! only the renderable tree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::probe::{AssertionResult, Probe};
use crate::resolver::{ProbeTree, TreeNode};
use crate::tree::{Arena, ROOT_ID};

pub const PASS_SYMBOL: &str = "🟢";
pub const FAIL_SYMBOL: &str = "🔴";
pub const ROOT_LABEL: &str = "Results";

/// Counts of individual assertion results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub passed: usize,
    pub failed: usize,
}

impl Totals {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    fn record(&mut self, result: &AssertionResult) {
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Display-ready outcome tree.
#[derive(Debug, Clone)]
pub struct RenderableTree {
    /// Node labels keyed by the probe tree's identifiers.
    pub tree: Arena<String>,
    pub totals: Totals,
    /// `<name> (<function>): <error>` for every failing result.
    pub exceptions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator {
    verbose: bool,
}

impl ResultAggregator {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Status symbol, name and (verbose) per-function breakdown.
    pub fn label(&self, name: &str, results: &[AssertionResult]) -> String {
        let symbol = if results.iter().all(|r| r.passed) {
            PASS_SYMBOL
        } else {
            FAIL_SYMBOL
        };
        if !self.verbose {
            return format!("{symbol} {name}");
        }
        let breakdown: Vec<String> = results
            .iter()
            .map(|r| format!("{} {}", if r.passed { "✔" } else { "✘" }, r.function))
            .collect();
        format!("{symbol} {name} ({})", breakdown.join(", "))
    }

    pub fn build(&self, probe_tree: &ProbeTree) -> RenderableTree {
        let mut output = RenderableTree {
            tree: Arena::new(ROOT_LABEL.to_string()),
            totals: Totals::default(),
            exceptions: Vec::new(),
        };

        let probes: HashMap<Uuid, &Probe> = probe_tree.probes.iter().map(|p| (p.id, p)).collect();

        for id in &probe_tree.order {
            if let Some(TreeNode::RuleSet { name, .. }) = probe_tree.tree.get(id) {
                let parent = probe_tree.tree.parent(id).unwrap_or(ROOT_ID);
                attach(&mut output.tree, *id, parent, format!("RuleSet - {name}"));
                continue;
            }
            let Some(probe) = probes.get(id).filter(|p| !p.results.is_empty()) else {
                continue;
            };
            let parent = probe.parent_id().unwrap_or(ROOT_ID);
            let label = self.label(&probe.name, &probe.results);
            attach(&mut output.tree, probe.id, parent, label);
            self.collect(&mut output, &probe.name, &probe.results);
        }

        for builtin in &probe_tree.builtins {
            if builtin.results.is_empty() {
                continue;
            }
            let name = builtin.label();
            let parent = builtin.owner_chain.last().copied().unwrap_or(ROOT_ID);
            let label = self.label(&name, &builtin.results);
            attach(&mut output.tree, Uuid::new_v4(), parent, label);
            self.collect(&mut output, &name, &builtin.results);
        }

        output
    }

    fn collect(&self, output: &mut RenderableTree, name: &str, results: &[AssertionResult]) {
        for result in results {
            output.totals.record(result);
            if let Some(error) = result.error.as_deref().filter(|_| !result.passed) {
                output
                    .exceptions
                    .push(format!("{} ({}): {}", name, result.function, error));
            }
        }
    }
}

/// Insert under `parent`, falling back to the root when the parent is unknown.
fn attach(tree: &mut Arena<String>, id: Uuid, parent: Uuid, label: String) {
    let parent = if tree.contains(&parent) {
        parent
    } else {
        error!(node = %id, parent = %parent, "result node has no parent in the tree");
        ROOT_ID
    };
    if let Err(e) = tree.insert(id, parent, label) {
        error!(node = %id, "could not attach result node: {}", e);
    }
}
