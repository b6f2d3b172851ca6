//! Built-in assertion types.
//!
//! The catalog is static: [`BuiltinKind::ALL`] lists every supported type.
//! Each type declares the artifact kind it checks, a JSON Schema for one
//! expectation record, and how to find violations in a single snapshot. The
//! shared validation shape lives in [`BuiltinDefinition::validate`]:
//!
//! 1. missing artifact kind → warning, no results
//! 2. one failing result per violation, across all snapshots
//! 3. no violations at all → exactly one passing result

mod applications;
mod offers;
mod relations;

pub use applications::{ApplicationAssertion, ApplicationsBuiltin};
pub use offers::{OfferAssertion, OffersBuiltin};
pub use relations::{RelationAssertion, RelationsBuiltin};

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::artifacts::{ArtifactKind, Artifacts};
use crate::obs;
use crate::probe::AssertionResult;

/// A supported built-in assertion type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinKind {
    Applications,
    Relations,
    Offers,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 3] = [Self::Applications, Self::Relations, Self::Offers];

    /// Key of the block in a ruleset document.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Applications => "applications",
            Self::Relations => "relations",
            Self::Offers => "offers",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// The artifact kind the type checks.
    pub fn artifact_kind(&self) -> ArtifactKind {
        match self {
            Self::Applications | Self::Offers => ArtifactKind::Status,
            Self::Relations => ArtifactKind::Bundle,
        }
    }

    /// JSON Schema of a single expectation record.
    pub fn item_schema(&self) -> Value {
        match self {
            Self::Applications => applications::item_schema(),
            Self::Relations => relations::item_schema(),
            Self::Offers => offers::item_schema(),
        }
    }
}

impl fmt::Display for BuiltinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Behaviour shared by every built-in type.
pub trait Builtin: Sized {
    const KIND: BuiltinKind;

    /// One expectation record as written in a ruleset.
    type Assertion: DeserializeOwned;

    /// Build the built-in from its records, rejecting records the schema alone cannot.
    fn new(assertions: Vec<Self::Assertion>) -> Result<Self, String>;

    fn is_empty(&self) -> bool;

    /// Violation messages for one snapshot.
    fn violations(&self, snapshot_name: &str, snapshot: &Value) -> Vec<String>;
}

/// A schema-validated built-in block.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinDefinition {
    Applications(ApplicationsBuiltin),
    Relations(RelationsBuiltin),
    Offers(OffersBuiltin),
}

fn parse_block<B: Builtin>(block: &Value) -> Result<B, String> {
    let assertions: Vec<B::Assertion> =
        serde_json::from_value(block.clone()).map_err(|e| e.to_string())?;
    B::new(assertions)
}

impl BuiltinDefinition {
    /// Validate a raw block against the schema of `kind`.
    pub fn parse(kind: BuiltinKind, block: &Value) -> Result<Self, String> {
        match kind {
            BuiltinKind::Applications => parse_block(block).map(Self::Applications),
            BuiltinKind::Relations => parse_block(block).map(Self::Relations),
            BuiltinKind::Offers => parse_block(block).map(Self::Offers),
        }
    }

    pub fn kind(&self) -> BuiltinKind {
        match self {
            Self::Applications(_) => BuiltinKind::Applications,
            Self::Relations(_) => BuiltinKind::Relations,
            Self::Offers(_) => BuiltinKind::Offers,
        }
    }

    /// Check the block against every snapshot of its artifact kind.
    pub fn validate(&self, artifacts: &Artifacts, owner: &str) -> Vec<AssertionResult> {
        match self {
            Self::Applications(b) => validate(b, artifacts, owner),
            Self::Relations(b) => validate(b, artifacts, owner),
            Self::Offers(b) => validate(b, artifacts, owner),
        }
    }
}

fn validate<B: Builtin>(builtin: &B, artifacts: &Artifacts, owner: &str) -> Vec<AssertionResult> {
    if builtin.is_empty() {
        return Vec::new();
    }

    let kind = B::KIND.artifact_kind();
    let Some(snapshots) = artifacts.get(kind) else {
        obs::warn_artifact_gap(kind, owner);
        return Vec::new();
    };

    let mut results: Vec<AssertionResult> = snapshots
        .iter()
        .flat_map(|(name, snapshot)| builtin.violations(name, snapshot))
        .map(|message| AssertionResult::fail(B::KIND.name(), message))
        .collect();

    if results.is_empty() {
        results.push(AssertionResult::pass(B::KIND.name()));
    }

    let passed = results.iter().all(|r| r.passed);
    obs::emit_builtin_validated(owner, B::KIND.name(), results.len(), passed);
    results
}

/// A built-in block attached to the ruleset that declared it.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinNode {
    /// Display path of the owning ruleset.
    pub owner: String,
    /// Call chain of the owning ruleset.
    pub owner_chain: Vec<Uuid>,
    pub definition: BuiltinDefinition,
    pub results: Vec<AssertionResult>,
}

impl BuiltinNode {
    pub fn new(owner: impl Into<String>, owner_chain: Vec<Uuid>, definition: BuiltinDefinition) -> Self {
        Self {
            owner: owner.into(),
            owner_chain,
            definition,
            results: Vec::new(),
        }
    }

    pub fn kind(&self) -> BuiltinKind {
        self.definition.kind()
    }

    /// `<ruleset>:<type>`
    pub fn label(&self) -> String {
        format!("{}:{}", self.owner, self.kind())
    }

    /// Run the validation and record its results.
    pub fn run(&mut self, artifacts: &Artifacts) {
        self.results = self.definition.validate(artifacts, &self.owner);
    }
}

/// `scale`, else the number of `units`, else 0.
pub(crate) fn application_scale(app: &Value) -> u64 {
    app.get("scale")
        .and_then(Value::as_u64)
        .or_else(|| {
            app.get("units")
                .and_then(Value::as_object)
                .map(|units| units.len() as u64)
        })
        .unwrap_or(0)
}
