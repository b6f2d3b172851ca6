//! Deployment snapshots ("artifacts") partitioned by kind.
//!
//! Three kinds are understood:
//! - `status`: the topology graph (`juju status --format yaml`)
//! - `bundle`: the deployment manifest (`juju export-bundle`)
//! - `show-unit`: the per-unit relation dump (`juju show-unit`)
//!
//! Each kind maps snapshot names (file path or model name) to the parsed
//! document. A kind without snapshots is *absent*, which callers report as an
//! environment gap rather than an assertion failure.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{DoctorError, Result};

/// The kind of a deployment snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Topology graph.
    Status,
    /// Deployment manifest.
    Bundle,
    /// Per-unit relation dump.
    ShowUnit,
}

impl ArtifactKind {
    /// Every kind, in check order.
    pub const ALL: [ArtifactKind; 3] = [Self::Status, Self::Bundle, Self::ShowUnit];

    /// The user-facing name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Bundle => "bundle",
            Self::ShowUnit => "show-unit",
        }
    }

    /// The probe entry point that checks this kind.
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Bundle => "bundle",
            Self::ShowUnit => "show_unit",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot name → parsed document, for a single kind.
pub type Snapshots = BTreeMap<String, Value>;

/// The artifact bundle handed to probes and builtins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifacts {
    snapshots: BTreeMap<ArtifactKind, Snapshots>,
}

impl Artifacts {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a snapshot of the given kind.
    pub fn insert(&mut self, kind: ArtifactKind, name: impl Into<String>, document: Value) {
        self.snapshots
            .entry(kind)
            .or_default()
            .insert(name.into(), document);
    }

    /// Builder variant of [`Artifacts::insert`].
    pub fn with(mut self, kind: ArtifactKind, name: impl Into<String>, document: Value) -> Self {
        self.insert(kind, name, document);
        self
    }

    /// The merged snapshots of a kind, or `None` when no snapshot was supplied.
    pub fn get(&self, kind: ArtifactKind) -> Option<&Snapshots> {
        self.snapshots.get(&kind).filter(|s| !s.is_empty())
    }

    /// Whether at least one snapshot of `kind` is present.
    pub fn has(&self, kind: ArtifactKind) -> bool {
        self.get(kind).is_some()
    }

    /// Kinds with at least one snapshot.
    pub fn kinds(&self) -> Vec<ArtifactKind> {
        ArtifactKind::ALL
            .into_iter()
            .filter(|kind| self.has(*kind))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }

    /// Read and parse a YAML snapshot file, registering it under its path.
    pub fn load_file(&mut self, kind: ArtifactKind, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| DoctorError::Artifact {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let document = parse_snapshot(&content).map_err(|e| DoctorError::Artifact {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.insert(kind, path.display().to_string(), document);
        Ok(())
    }

    /// Build a bundle from snapshot files. Unreadable files are skipped with a warning.
    pub fn from_files(status: &[PathBuf], bundle: &[PathBuf], show_unit: &[PathBuf]) -> Self {
        let mut artifacts = Self::new();
        let sources = [
            (ArtifactKind::Status, status),
            (ArtifactKind::Bundle, bundle),
            (ArtifactKind::ShowUnit, show_unit),
        ];
        for (kind, paths) in sources {
            for path in paths {
                if let Err(e) = artifacts.load_file(kind, path) {
                    warn!(kind = %kind, "skipping {} artifact: {}", kind, e);
                }
            }
        }
        artifacts
    }
}

/// Parse a YAML snapshot into a JSON value. Empty documents are rejected.
pub fn parse_snapshot(content: &str) -> Result<Value> {
    let document: Value = serde_yaml::from_str(content)?;
    if document.is_null() {
        return Err(DoctorError::Artifact {
            path: PathBuf::new(),
            reason: "empty document".to_string(),
        });
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_kind_is_none() {
        let artifacts = Artifacts::new().with(ArtifactKind::Status, "s.yaml", json!({}));
        assert!(artifacts.has(ArtifactKind::Status));
        assert!(artifacts.get(ArtifactKind::Bundle).is_none());
        assert_eq!(artifacts.kinds(), vec![ArtifactKind::Status]);
    }

    #[test]
    fn test_function_name_mapping() {
        assert_eq!(ArtifactKind::ShowUnit.function_name(), "show_unit");
        assert_eq!(ArtifactKind::ShowUnit.to_string(), "show-unit");
    }

    #[test]
    fn test_parse_snapshot_yaml() {
        let doc = parse_snapshot("applications:\n  loki:\n    scale: 2\n").unwrap();
        assert_eq!(doc["applications"]["loki"]["scale"], json!(2));
    }

    #[test]
    fn test_parse_snapshot_rejects_empty() {
        assert!(parse_snapshot("").is_err());
    }

    #[test]
    fn test_from_files_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let status = dir.path().join("status.yaml");
        std::fs::write(&status, "applications: {}\n").unwrap();
        let missing = dir.path().join("missing.yaml");

        let artifacts = Artifacts::from_files(&[status.clone()], &[missing], &[]);
        let snapshots = artifacts.get(ArtifactKind::Status).unwrap();
        assert!(snapshots.contains_key(&status.display().to_string()));
        assert!(!artifacts.has(ArtifactKind::Bundle));
    }
}
