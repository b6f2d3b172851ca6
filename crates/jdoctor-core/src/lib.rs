//! juju-doctor core library
//!
//! Resolves probe sources into a probe tree, validates built-in assertions
//! against deployment snapshots and aggregates outcomes for rendering.

pub mod artifacts;
pub mod builtins;
pub mod error;
pub mod fetcher;
pub mod live_model;
pub mod obs;
pub mod probe;
pub mod render;
pub mod resolver;
pub mod results;
pub mod ruleset;
pub mod telemetry;
pub mod tree;

pub use artifacts::{parse_snapshot, ArtifactKind, Artifacts, Snapshots};
pub use builtins::{Builtin, BuiltinDefinition, BuiltinKind, BuiltinNode};
pub use error::{DoctorError, Result};
pub use fetcher::{
    FetchedFile, Fetcher, GithubFetcher, LocalFetcher, ProbeUri, SourceFetcher, SourceLocation,
};
pub use live_model::{collect_models, JujuCli, ModelSource};
pub use probe::{AssertionResult, Probe};
pub use render::{render_json, render_text, totals_line};
pub use resolver::{ProbeTree, Resolver, ResolverConfig, TreeNode, DEFAULT_MAX_DEPTH};
pub use results::{RenderableTree, ResultAggregator, Totals};
pub use ruleset::{ruleset_schema, ProbeReference, ProbeType, RuleSet};
pub use telemetry::init_tracing;
pub use tree::{Arena, ROOT_ID};
