//! Declarative ruleset documents.
//!
//! ```yaml
//! name: cos-lite
//! probes:
//!   - name: local
//!     type: scriptlet
//!     url: file://probes/relation_check.py
//! applications:
//!   - name: alertmanager
//!     minimum: 2
//! ```
//!
//! The top level is closed: `name`, `probes` and the built-in catalog keys.
//! Built-in blocks are validated one by one; a bad block is logged and dropped
//! while the rest of the ruleset still counts.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use crate::builtins::{BuiltinDefinition, BuiltinKind};
use crate::error::{DoctorError, Result};

/// File extensions that mark a ruleset document.
pub const RULESET_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

pub fn is_ruleset_extension(extension: &str) -> bool {
    RULESET_EXTENSIONS
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(extension))
}

pub fn is_ruleset_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| is_ruleset_extension(&ext.to_string_lossy()))
        .unwrap_or(false)
}

/// Declared kind of a probe reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeType {
    Scriptlet,
    Ruleset,
}

impl fmt::Display for ProbeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scriptlet => f.write_str("scriptlet"),
            Self::Ruleset => f.write_str("ruleset"),
        }
    }
}

/// One entry of a ruleset's `probes` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeReference {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProbeType,
    pub url: String,
}

/// A loaded ruleset with its schema-valid built-in blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub name: String,
    pub probes: Vec<ProbeReference>,
    pub builtins: Vec<BuiltinDefinition>,
}

fn parse_error(path: &Path, reason: impl Into<String>) -> DoctorError {
    DoctorError::RuleSetParse {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

impl RuleSet {
    /// Load a ruleset file.
    ///
    /// Unreadable or empty documents yield `Ok(None)`. Schema violations of
    /// the document itself are errors; violations inside one built-in block
    /// only drop that block.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), "could not read ruleset: {}", e);
                return Ok(None);
            }
        };
        Self::parse(path, &content)
    }

    /// Parse ruleset text; `path` is only used in messages.
    pub fn parse(path: &Path, content: &str) -> Result<Option<Self>> {
        let document: Value =
            serde_yaml::from_str(content).map_err(|e| parse_error(path, e.to_string()))?;

        let mut fields = match document {
            Value::Null => {
                debug!(path = %path.display(), "empty ruleset document");
                return Ok(None);
            }
            Value::Object(fields) => fields,
            _ => return Err(parse_error(path, "expected a mapping at the top level")),
        };

        let unknown: Vec<&String> = fields
            .keys()
            .filter(|key| {
                !matches!(key.as_str(), "name" | "probes") && BuiltinKind::from_name(key).is_none()
            })
            .collect();
        if !unknown.is_empty() {
            let keys: Vec<&str> = unknown.iter().map(|k| k.as_str()).collect();
            return Err(parse_error(
                path,
                format!("unknown top-level key(s): {}", keys.join(", ")),
            ));
        }

        let name = match fields.remove("name") {
            Some(Value::String(name)) => name,
            Some(_) => return Err(parse_error(path, "`name` must be a string")),
            None => return Err(parse_error(path, "missing required key `name`")),
        };

        let probes: Vec<ProbeReference> = match fields.remove("probes") {
            Some(value) if !value.is_null() => serde_json::from_value(value)
                .map_err(|e| parse_error(path, format!("probes: {e}")))?,
            _ => Vec::new(),
        };

        let declared: Vec<(BuiltinKind, Value)> = BuiltinKind::ALL
            .into_iter()
            .filter_map(|kind| fields.remove(kind.name()).map(|block| (kind, block)))
            .filter(|(_, block)| !is_blank(block))
            .collect();

        if probes.is_empty() && declared.is_empty() {
            return Err(DoctorError::EmptyRuleSet {
                path: path.to_path_buf(),
            });
        }

        let mut builtins = Vec::new();
        for (kind, block) in declared {
            match BuiltinDefinition::parse(kind, &block) {
                Ok(definition) => builtins.push(definition),
                Err(reason) => error!(
                    path = %path.display(),
                    builtin = %kind,
                    "dropping invalid built-in block: {}",
                    reason
                ),
            }
        }

        Ok(Some(Self {
            name,
            probes,
            builtins,
        }))
    }
}

/// JSON Schema (draft 2020-12) of a ruleset document.
pub fn ruleset_schema() -> Value {
    let mut properties = Map::new();
    properties.insert(
        "name".to_string(),
        json!({ "type": "string", "description": "Display name of the ruleset" }),
    );
    properties.insert(
        "probes".to_string(),
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "additionalProperties": false,
                "required": ["name", "type", "url"],
                "properties": {
                    "name": { "type": "string" },
                    "type": { "enum": ["scriptlet", "ruleset"] },
                    "url": { "type": "string" }
                }
            }
        }),
    );
    for kind in BuiltinKind::ALL {
        properties.insert(
            kind.name().to_string(),
            json!({
                "type": "array",
                "description": format!("Built-in assertion checked against the {} artifact", kind.artifact_kind()),
                "items": kind.item_schema()
            }),
        );
    }

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "RuleSet",
        "type": "object",
        "additionalProperties": false,
        "required": ["name"],
        "properties": properties
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Option<RuleSet>> {
        RuleSet::parse(Path::new("rules.yaml"), content)
    }

    #[test]
    fn test_parse_full_ruleset() {
        let ruleset = parse(
            r#"
name: cos
probes:
  - name: local
    type: scriptlet
    url: file://probes/check.py
  - name: nested
    type: ruleset
    url: file://probes/nested.yaml
applications:
  - name: alertmanager
    minimum: 2
relations:
  - apps: [grafana:catalogue, catalogue:catalogue]
"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(ruleset.name, "cos");
        assert_eq!(ruleset.probes.len(), 2);
        assert_eq!(ruleset.probes[1].kind, ProbeType::Ruleset);
        let kinds: Vec<BuiltinKind> = ruleset.builtins.iter().map(|b| b.kind()).collect();
        assert_eq!(kinds, vec![BuiltinKind::Applications, BuiltinKind::Relations]);
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let err = parse("name: x\napplication:\n  - name: loki\n").unwrap_err();
        assert!(err.to_string().contains("application"));
    }

    #[test]
    fn test_unknown_probe_key_rejected() {
        let err = parse("name: x\nprobes:\n  - name: a\n    type: scriptlet\n    uri: file://a.py\n")
            .unwrap_err();
        assert!(matches!(err, DoctorError::RuleSetParse { .. }));
    }

    #[test]
    fn test_empty_ruleset_rejected() {
        assert!(matches!(
            parse("name: lonely\n"),
            Err(DoctorError::EmptyRuleSet { .. })
        ));
        assert!(matches!(
            parse("name: lonely\nprobes: []\napplications: []\n"),
            Err(DoctorError::EmptyRuleSet { .. })
        ));
    }

    #[test]
    fn test_empty_document_is_silent() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(RuleSet::load(Path::new("/nonexistent/rules.yaml")).unwrap(), None);
    }

    #[test]
    fn test_invalid_builtin_block_dropped() {
        let ruleset = parse(
            "name: x\nrelations:\n  - apps: [only-one]\napplications:\n  - name: loki\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(ruleset.builtins.len(), 1);
        assert_eq!(ruleset.builtins[0].kind(), BuiltinKind::Applications);
    }

    #[test]
    fn test_ruleset_extension() {
        assert!(is_ruleset_path(Path::new("a/b.yaml")));
        assert!(is_ruleset_path(Path::new("a/b.YML")));
        assert!(!is_ruleset_path(Path::new("a/b.py")));
        assert!(!is_ruleset_path(Path::new("a/yaml")));
    }

    #[test]
    fn test_schema_is_closed_and_lists_builtins() {
        let schema = ruleset_schema();
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["required"], json!(["name"]));
        for kind in BuiltinKind::ALL {
            assert!(schema["properties"].get(kind.name()).is_some());
        }
        assert_eq!(
            schema["properties"]["probes"]["items"]["properties"]["type"]["enum"],
            json!(["scriptlet", "ruleset"])
        );
    }
}
