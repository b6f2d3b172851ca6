use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{Builtin, BuiltinKind};

/// `{name, endpoint?, interface?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OfferAssertion {
    pub name: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub interface: Option<String>,
}

/// Offers must exist, publishing the declared endpoint and interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffersBuiltin {
    pub assertions: Vec<OfferAssertion>,
}

fn interface_of(endpoint: &Value) -> Option<&str> {
    endpoint.get("interface").and_then(Value::as_str)
}

fn check_offer(expected: &OfferAssertion, endpoints: &Map<String, Value>) -> Option<String> {
    let names: Vec<&str> = endpoints.keys().map(String::as_str).collect();

    match (&expected.endpoint, &expected.interface) {
        (Some(endpoint), interface) => {
            let Some(published) = endpoints.get(endpoint) else {
                return Some(format!(
                    "{}: endpoint ({}) not in ([{}])",
                    expected.name,
                    endpoint,
                    names.join(", ")
                ));
            };
            let actual = interface_of(published).unwrap_or_default();
            match interface {
                Some(interface) if interface != actual => Some(format!(
                    "{}: interface ({}) != ({})",
                    expected.name, interface, actual
                )),
                _ => None,
            }
        }
        (None, Some(interface)) => {
            let published: Vec<&str> = endpoints.values().filter_map(interface_of).collect();
            (!published.contains(&interface.as_str())).then(|| {
                format!(
                    "{}: interface ({}) not in ([{}])",
                    expected.name,
                    interface,
                    published.join(", ")
                )
            })
        }
        (None, None) => None,
    }
}

impl Builtin for OffersBuiltin {
    const KIND: BuiltinKind = BuiltinKind::Offers;
    type Assertion = OfferAssertion;

    fn new(assertions: Vec<OfferAssertion>) -> Result<Self, String> {
        Ok(Self { assertions })
    }

    fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    fn violations(&self, snapshot_name: &str, snapshot: &Value) -> Vec<String> {
        let offers = snapshot.get("offers").and_then(Value::as_object);
        let no_endpoints = Map::new();

        self.assertions
            .iter()
            .filter_map(|expected| {
                let Some(offer) = offers.and_then(|o| o.get(&expected.name)) else {
                    return Some(format!(
                        "offer \"{}\" was not found in \"{}\"",
                        expected.name, snapshot_name
                    ));
                };
                let endpoints = offer
                    .get("endpoints")
                    .and_then(Value::as_object)
                    .unwrap_or(&no_endpoints);
                check_offer(expected, endpoints)
            })
            .collect()
    }
}

pub(super) fn item_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["name"],
        "properties": {
            "name": { "type": "string" },
            "endpoint": { "type": "string" },
            "interface": { "type": "string" }
        }
    })
}
