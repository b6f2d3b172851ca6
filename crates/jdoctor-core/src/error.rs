//! Error taxonomy for probe resolution, rulesets and artifacts.

use std::path::PathBuf;

/// Errors produced by the juju-doctor core.
#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("invalid probe uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("source not found: {uri}")]
    SourceNotFound { uri: String },

    #[error("failed to fetch '{uri}': {reason}")]
    Fetch { uri: String, reason: String },

    #[error("invalid ruleset {path:?}: {reason}")]
    RuleSetParse { path: PathBuf, reason: String },

    #[error("ruleset {path:?} declares neither probes nor builtin assertions")]
    EmptyRuleSet { path: PathBuf },

    #[error("probe '{name}' is declared as {declared} but its url '{uri}' is not")]
    KindMismatch {
        name: String,
        declared: String,
        uri: String,
    },

    #[error("maximum call depth ({max_depth}) exceeded while resolving '{uri}'")]
    DepthExceeded { uri: String, max_depth: usize },

    #[error("circular ruleset reference: {chain}")]
    CircularRuleSet { chain: String },

    #[error("failed to load artifact {path:?}: {reason}")]
    Artifact { path: PathBuf, reason: String },

    #[error("live model '{model}': {reason}")]
    LiveModel { model: String, reason: String },

    #[error("tree node {child} refers to missing parent {parent}")]
    MissingParent {
        child: uuid::Uuid,
        parent: uuid::Uuid,
    },

    #[error("tree node {0} already exists")]
    DuplicateNode(uuid::Uuid),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for juju-doctor core operations.
pub type Result<T> = std::result::Result<T, DoctorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mismatch_display() {
        let err = DoctorError::KindMismatch {
            name: "local".to_string(),
            declared: "scriptlet".to_string(),
            uri: "file://probes/rules.yaml".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("local"));
        assert!(msg.contains("scriptlet"));
        assert!(msg.contains("rules.yaml"));
    }

    #[test]
    fn test_depth_exceeded_display() {
        let err = DoctorError::DepthExceeded {
            uri: "file://loop.yaml".to_string(),
            max_depth: 32,
        };
        assert!(err.to_string().contains("32"));
        assert!(err.to_string().contains("loop.yaml"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DoctorError = io.into();
        assert!(err.to_string().contains("io error"));
    }
}
