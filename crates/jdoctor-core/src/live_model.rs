//! Live-model artifact acquisition through the `juju` CLI.

use std::process::Command;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::artifacts::{parse_snapshot, ArtifactKind, Artifacts};
use crate::error::{DoctorError, Result};

/// Source of raw snapshot text for a live model.
pub trait ModelSource {
    /// `juju status --format yaml`
    fn status(&self, model: &str) -> Result<String>;
    /// `juju export-bundle`
    fn export_bundle(&self, model: &str) -> Result<String>;
    /// `juju show-unit <unit>`
    fn show_unit(&self, model: &str, unit: &str) -> Result<String>;
}

/// [`ModelSource`] backed by the `juju` binary on `PATH`.
#[derive(Debug, Clone)]
pub struct JujuCli {
    binary: String,
}

impl Default for JujuCli {
    fn default() -> Self {
        Self {
            binary: "juju".to_string(),
        }
    }
}

impl JujuCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, model: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .args(["--model", model])
            .output()
            .map_err(|e| DoctorError::LiveModel {
                model: model.to_string(),
                reason: format!("failed to run {}: {e}", self.binary),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DoctorError::LiveModel {
                model: model.to_string(),
                reason: format!("{} {} failed: {}", self.binary, args.join(" "), stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ModelSource for JujuCli {
    fn status(&self, model: &str) -> Result<String> {
        self.run(model, &["status", "--format", "yaml"])
    }

    fn export_bundle(&self, model: &str) -> Result<String> {
        self.run(model, &["export-bundle"])
    }

    fn show_unit(&self, model: &str, unit: &str) -> Result<String> {
        self.run(model, &["show-unit", unit, "--format", "yaml"])
    }
}

/// Unit names listed under `applications.*.units` of a status document.
fn unit_names(status: &Value) -> Vec<String> {
    let Some(applications) = status.get("applications").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut units: Vec<String> = applications
        .values()
        .filter_map(|app| app.get("units").and_then(Value::as_object))
        .flat_map(|units| units.keys().cloned())
        .collect();
    units.sort();
    units
}

fn fetch_snapshot(model: &str, raw: Result<String>) -> Result<Value> {
    let text = raw?;
    parse_snapshot(&text).map_err(|e| DoctorError::LiveModel {
        model: model.to_string(),
        reason: e.to_string(),
    })
}

/// Acquire all three snapshot kinds for each model, named by the model.
///
/// A failed acquisition is logged and leaves that kind absent for the model.
pub fn collect_models(source: &dyn ModelSource, models: &[String]) -> Artifacts {
    let mut artifacts = Artifacts::new();

    for model in models {
        let status = match fetch_snapshot(model, source.status(model)) {
            Ok(status) => {
                artifacts.insert(ArtifactKind::Status, model.clone(), status.clone());
                Some(status)
            }
            Err(e) => {
                warn!(model = %model, "could not acquire status: {}", e);
                None
            }
        };

        match fetch_snapshot(model, source.export_bundle(model)) {
            Ok(bundle) => artifacts.insert(ArtifactKind::Bundle, model.clone(), bundle),
            Err(e) => warn!(model = %model, "could not acquire bundle: {}", e),
        }

        let Some(status) = status else {
            warn!(model = %model, "skipping show-unit: no status to list units from");
            continue;
        };

        let mut merged = Map::new();
        for unit in unit_names(&status) {
            match fetch_snapshot(model, source.show_unit(model, &unit)) {
                Ok(Value::Object(entries)) => merged.extend(entries),
                Ok(other) => {
                    merged.insert(unit.clone(), other);
                }
                Err(e) => warn!(model = %model, unit = %unit, "could not acquire show-unit: {}", e),
            }
        }
        debug!(model = %model, units = merged.len(), "collected show-unit data");
        if !merged.is_empty() {
            artifacts.insert(ArtifactKind::ShowUnit, model.clone(), Value::Object(merged));
        }
    }

    artifacts
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeModel {
        bundle_fails: bool,
    }

    impl ModelSource for FakeModel {
        fn status(&self, _model: &str) -> Result<String> {
            Ok("applications:\n  loki:\n    scale: 1\n    units:\n      loki/0: {}\n".to_string())
        }

        fn export_bundle(&self, model: &str) -> Result<String> {
            if self.bundle_fails {
                return Err(DoctorError::LiveModel {
                    model: model.to_string(),
                    reason: "permission denied".to_string(),
                });
            }
            Ok("relations: []\n".to_string())
        }

        fn show_unit(&self, _model: &str, unit: &str) -> Result<String> {
            Ok(format!("{unit}:\n  relation-info: []\n"))
        }
    }

    #[test]
    fn test_collect_models_all_kinds() {
        let artifacts = collect_models(&FakeModel { bundle_fails: false }, &["cos".to_string()]);
        assert_eq!(artifacts.kinds().len(), 3);
        let show_unit = artifacts.get(ArtifactKind::ShowUnit).unwrap();
        assert!(show_unit["cos"].get("loki/0").is_some());
    }

    #[test]
    fn test_collect_models_failed_kind_is_absent() {
        let artifacts = collect_models(&FakeModel { bundle_fails: true }, &["cos".to_string()]);
        assert!(artifacts.has(ArtifactKind::Status));
        assert!(!artifacts.has(ArtifactKind::Bundle));
    }

    #[test]
    fn test_unit_names_sorted() {
        let status = serde_json::json!({
            "applications": {
                "b": {"units": {"b/1": {}, "b/0": {}}},
                "a": {"units": {"a/0": {}}},
            }
        });
        assert_eq!(unit_names(&status), vec!["a/0", "b/0", "b/1"]);
    }
}
