use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Builtin, BuiltinKind};

/// `{apps: [endpoint-a, endpoint-b]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationAssertion {
    pub apps: Vec<String>,
}

/// Relations between two endpoints must exist in the bundle, in either order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationsBuiltin {
    pub assertions: Vec<RelationAssertion>,
}

fn endpoints(relation: &Value) -> Option<(&str, &str)> {
    match relation.as_array()?.as_slice() {
        [a, b] => Some((a.as_str()?, b.as_str()?)),
        _ => None,
    }
}

impl Builtin for RelationsBuiltin {
    const KIND: BuiltinKind = BuiltinKind::Relations;
    type Assertion = RelationAssertion;

    fn new(assertions: Vec<RelationAssertion>) -> Result<Self, String> {
        if let Some(bad) = assertions.iter().find(|a| a.apps.len() != 2) {
            return Err(format!(
                "a relation needs exactly 2 endpoints, got {}: {:?}",
                bad.apps.len(),
                bad.apps
            ));
        }
        Ok(Self { assertions })
    }

    fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    fn violations(&self, snapshot_name: &str, snapshot: &Value) -> Vec<String> {
        let present: Vec<(&str, &str)> = snapshot
            .get("relations")
            .and_then(Value::as_array)
            .map(|relations| relations.iter().filter_map(endpoints).collect())
            .unwrap_or_default();

        self.assertions
            .iter()
            .filter(|expected| {
                let (a, b) = (expected.apps[0].as_str(), expected.apps[1].as_str());
                !present.contains(&(a, b)) && !present.contains(&(b, a))
            })
            .map(|expected| {
                format!(
                    "Relation ([{}]) not found in \"{}\"",
                    expected.apps.join(", "),
                    snapshot_name
                )
            })
            .collect()
    }
}

pub(super) fn item_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["apps"],
        "properties": {
            "apps": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 2,
                "maxItems": 2
            }
        }
    })
}
