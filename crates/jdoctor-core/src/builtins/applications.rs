use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{application_scale, Builtin, BuiltinKind};

/// `{name, minimum?, maximum?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationAssertion {
    pub name: String,
    #[serde(default)]
    pub minimum: Option<u64>,
    #[serde(default)]
    pub maximum: Option<u64>,
}

/// Applications must exist with a unit count inside the declared bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationsBuiltin {
    pub assertions: Vec<ApplicationAssertion>,
}

impl Builtin for ApplicationsBuiltin {
    const KIND: BuiltinKind = BuiltinKind::Applications;
    type Assertion = ApplicationAssertion;

    fn new(assertions: Vec<ApplicationAssertion>) -> Result<Self, String> {
        Ok(Self { assertions })
    }

    fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    fn violations(&self, snapshot_name: &str, snapshot: &Value) -> Vec<String> {
        let applications = snapshot.get("applications").and_then(Value::as_object);
        let mut violations = Vec::new();

        for expected in &self.assertions {
            let Some(app) = applications.and_then(|apps| apps.get(&expected.name)) else {
                violations.push(format!(
                    "application \"{}\" was not found in \"{}\"",
                    expected.name, snapshot_name
                ));
                continue;
            };

            let scale = application_scale(app);
            if let Some(minimum) = expected.minimum.filter(|min| scale < *min) {
                violations.push(format!(
                    "{} scale ({}) is below the allowable limit: {}",
                    expected.name, scale, minimum
                ));
            }
            if let Some(maximum) = expected.maximum.filter(|max| scale > *max) {
                violations.push(format!(
                    "{} scale ({}) exceeds the allowable limit: {}",
                    expected.name, scale, maximum
                ));
            }
        }

        violations
    }
}

pub(super) fn item_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["name"],
        "properties": {
            "name": { "type": "string" },
            "minimum": { "type": "integer", "minimum": 0 },
            "maximum": { "type": "integer", "minimum": 0 }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin(assertions: Value) -> ApplicationsBuiltin {
        let assertions: Vec<ApplicationAssertion> = serde_json::from_value(assertions).unwrap();
        ApplicationsBuiltin::new(assertions).unwrap()
    }

    #[test]
    fn test_scale_below_minimum() {
        let b = builtin(json!([{ "name": "alertmanager", "minimum": 2 }]));
        let snapshot = json!({ "applications": { "alertmanager": { "scale": 1 } } });
        assert_eq!(
            b.violations("status.yaml", &snapshot),
            vec!["alertmanager scale (1) is below the allowable limit: 2"]
        );
    }

    #[test]
    fn test_scale_above_maximum() {
        let b = builtin(json!([{ "name": "loki", "minimum": 1, "maximum": 3 }]));
        let snapshot = json!({ "applications": { "loki": { "scale": 5 } } });
        assert_eq!(
            b.violations("status.yaml", &snapshot),
            vec!["loki scale (5) exceeds the allowable limit: 3"]
        );
    }

    #[test]
    fn test_missing_application_names_snapshot() {
        let b = builtin(json!([{ "name": "grafana" }]));
        let snapshot = json!({ "applications": { "loki": { "scale": 1 } } });
        assert_eq!(
            b.violations("cos.yaml", &snapshot),
            vec!["application \"grafana\" was not found in \"cos.yaml\""]
        );
    }

    #[test]
    fn test_snapshot_without_applications_key() {
        let b = builtin(json!([{ "name": "grafana" }, { "name": "loki" }]));
        assert_eq!(b.violations("empty.yaml", &json!({})).len(), 2);
    }

    #[test]
    fn test_negative_bound_rejected() {
        let parsed: Result<Vec<ApplicationAssertion>, _> =
            serde_json::from_value(json!([{ "name": "loki", "minimum": -1 }]));
        assert!(parsed.is_err());
    }
}
