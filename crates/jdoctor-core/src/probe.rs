//! Leaf probes and their assertion outcomes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fetcher::FetchedFile;

/// Outcome of one probe function, or of one built-in's whole validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub function: String,
    pub passed: bool,
    pub error: Option<String>,
}

impl AssertionResult {
    pub fn pass(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            passed: true,
            error: None,
        }
    }

    pub fn fail(function: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            passed: false,
            error: Some(error.into()),
        }
    }
}

/// A resolved leaf assertion unit.
///
/// Every resolution produces a fresh identity, so one file reached through two
/// rulesets is two probes with independent results.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub id: Uuid,
    /// Relative identity path, used as the display name.
    pub name: String,
    /// Materialized copy of the probe under `root`.
    pub path: PathBuf,
    /// Staging root the probe was fetched into.
    pub root: PathBuf,
    /// Ancestor identifiers, ending with `id`.
    pub call_chain: Vec<Uuid>,
    pub results: Vec<AssertionResult>,
}

impl Probe {
    /// Create a probe for `file`, extending the caller's call chain.
    pub fn new(file: &FetchedFile, parent_chain: &[Uuid]) -> Self {
        let id = Uuid::new_v4();
        let mut call_chain = parent_chain.to_vec();
        call_chain.push(id);
        Self {
            id,
            name: file.name.clone(),
            path: file.local_path.clone(),
            root: file.root.clone(),
            call_chain,
            results: Vec::new(),
        }
    }

    /// A probe is a root when nothing called it.
    pub fn is_root(&self) -> bool {
        self.call_chain.len() == 1
    }

    /// The identifier of the ruleset that referenced this probe.
    pub fn parent_id(&self) -> Option<Uuid> {
        self.call_chain
            .len()
            .checked_sub(2)
            .map(|index| self.call_chain[index])
    }

    /// `true` when no recorded function failed.
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }
}
