//! Probe tree resolution.
//!
//! Turns a list of root probe URIs into a [`ProbeTree`]:
//! - each root resolves into a scratch [`Fragment`] that is merged only on success
//! - rulesets expand recursively, with their probes extending the call chain
//! - a per-path visited set detects ruleset cycles, and `max_depth` caps recursion
//! - cycles and depth overruns abort only the offending root
//! - fetch gaps, kind mismatches and bad documents drop only the one reference

use std::path::{Path, PathBuf};

use tracing::{error, warn};
use uuid::Uuid;

use crate::builtins::{BuiltinKind, BuiltinNode};
use crate::error::{DoctorError, Result};
use crate::fetcher::{FetchedFile, ProbeUri, SourceFetcher};
use crate::obs;
use crate::probe::Probe;
use crate::ruleset::{is_ruleset_extension, ProbeReference, ProbeType, RuleSet};
use crate::tree::{Arena, ROOT_ID};

pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Resolver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Maximum call-chain length before a root is abandoned.
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ResolverConfig {
    /// Defaults overridden by `JDOCTOR_MAX_DEPTH` when it holds a positive integer.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("JDOCTOR_MAX_DEPTH") {
            match raw.parse::<usize>() {
                Ok(depth) if depth > 0 => config.max_depth = depth,
                _ => warn!(value = %raw, "ignoring invalid JDOCTOR_MAX_DEPTH"),
            }
        }
        config
    }
}

/// A node of the resolved hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Root,
    /// Display group for a ruleset; produces no outcome itself.
    RuleSet {
        name: String,
        path: String,
        call_chain: Vec<Uuid>,
    },
    /// A probe resolved directly from a root URI.
    Probe { name: String },
}

/// Output of [`Resolver::resolve`].
#[derive(Debug, Clone)]
pub struct ProbeTree {
    /// Every resolved leaf probe, in resolution order.
    pub probes: Vec<Probe>,
    /// Built-in blocks with their owning ruleset; unique per (type, owner chain).
    pub builtins: Vec<BuiltinNode>,
    pub tree: Arena<TreeNode>,
    /// Ruleset group and probe ids in resolution (declaration) order.
    pub order: Vec<Uuid>,
}

impl Default for ProbeTree {
    fn default() -> Self {
        Self {
            probes: Vec::new(),
            builtins: Vec::new(),
            tree: Arena::new(TreeNode::Root),
            order: Vec::new(),
        }
    }
}

impl ProbeTree {
    /// Look up the built-in of `kind` declared by the ruleset with `owner_chain`.
    pub fn builtin(&self, kind: BuiltinKind, owner_chain: &[Uuid]) -> Option<&BuiltinNode> {
        self.builtins
            .iter()
            .find(|b| b.kind() == kind && b.owner_chain == owner_chain)
    }

    fn merge(&mut self, fragment: Fragment) -> Result<()> {
        for (id, parent, node) in fragment.nodes {
            self.tree.insert(id, parent, node)?;
        }
        self.probes.extend(fragment.probes);
        self.builtins.extend(fragment.builtins);
        self.order.extend(fragment.order);
        Ok(())
    }
}

/// Resolution output of a single root URI, merged only when the root succeeds.
#[derive(Debug, Default)]
struct Fragment {
    nodes: Vec<(Uuid, Uuid, TreeNode)>,
    probes: Vec<Probe>,
    builtins: Vec<BuiltinNode>,
    order: Vec<Uuid>,
}

/// Errors that abandon the whole root instead of a single reference.
fn aborts_root(error: &DoctorError) -> bool {
    matches!(
        error,
        DoctorError::DepthExceeded { .. } | DoctorError::CircularRuleSet { .. }
    )
}

/// How the files of a fetched URI are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expansion {
    /// Root URI: YAML files are rulesets, everything else is a probe.
    Auto,
    /// Every file is a probe.
    Scriptlets,
    /// A single YAML file expands as a ruleset; several files are probes.
    RuleSet,
}

pub struct Resolver<'a> {
    fetcher: &'a dyn SourceFetcher,
    config: ResolverConfig,
    staging: PathBuf,
}

impl<'a> Resolver<'a> {
    pub fn new(fetcher: &'a dyn SourceFetcher, config: ResolverConfig, staging: &Path) -> Self {
        Self {
            fetcher,
            config,
            staging: staging.to_path_buf(),
        }
    }

    /// Resolve every root URI. Failures are logged and scoped to their root.
    pub fn resolve(&self, uris: &[String]) -> ProbeTree {
        let mut output = ProbeTree::default();
        let mut seen: Vec<&str> = Vec::new();

        for raw in uris {
            if seen.contains(&raw.as_str()) {
                warn!(uri = %raw, "duplicate probe source `{}` ignored", raw);
                continue;
            }
            seen.push(raw);

            let mut fragment = Fragment::default();
            let resolved = ProbeUri::parse(raw).and_then(|uri| {
                let mut visited = Vec::new();
                self.resolve_uri(&uri, Expansion::Auto, &[], &mut visited, &mut fragment)
            });

            match resolved.and_then(|()| output.merge(fragment)) {
                Ok(()) => {}
                Err(e @ DoctorError::SourceNotFound { .. }) => {
                    warn!(uri = %raw, "skipping probe source: {}", e)
                }
                Err(e) => error!(uri = %raw, "skipping probe source: {}", e),
            }
        }

        output
    }

    fn resolve_uri(
        &self,
        uri: &ProbeUri,
        expansion: Expansion,
        chain: &[Uuid],
        visited: &mut Vec<String>,
        fragment: &mut Fragment,
    ) -> Result<()> {
        if chain.len() >= self.config.max_depth {
            return Err(DoctorError::DepthExceeded {
                uri: uri.to_string(),
                max_depth: self.config.max_depth,
            });
        }

        let files = self.fetcher.fetch(uri, &self.staging)?;
        let single = files.len() == 1;

        for file in &files {
            let as_ruleset = match expansion {
                Expansion::Auto => file.is_ruleset(),
                Expansion::Scriptlets => false,
                Expansion::RuleSet => single && file.is_ruleset(),
            };

            if as_ruleset {
                let key = if single {
                    uri.canonical()
                } else {
                    format!("{}#{}", uri.canonical(), file.name)
                };
                self.expand_ruleset(file, key, chain, visited, fragment)?;
            } else {
                self.attach_probe(file, chain, fragment);
            }
        }

        Ok(())
    }

    fn expand_ruleset(
        &self,
        file: &FetchedFile,
        key: String,
        chain: &[Uuid],
        visited: &mut Vec<String>,
        fragment: &mut Fragment,
    ) -> Result<()> {
        if visited.contains(&key) {
            let mut path = visited.clone();
            path.push(key);
            return Err(DoctorError::CircularRuleSet {
                chain: path.join(" -> "),
            });
        }

        let ruleset = match RuleSet::load(&file.local_path) {
            Ok(Some(ruleset)) => ruleset,
            Ok(None) => return Ok(()),
            Err(e) => {
                error!(ruleset = %file.name, "skipping ruleset: {}", e);
                return Ok(());
            }
        };

        let id = Uuid::new_v4();
        let mut own_chain = chain.to_vec();
        own_chain.push(id);
        let parent = chain.last().copied().unwrap_or(ROOT_ID);

        fragment.nodes.push((
            id,
            parent,
            TreeNode::RuleSet {
                name: ruleset.name.clone(),
                path: file.name.clone(),
                call_chain: own_chain.clone(),
            },
        ));
        fragment.order.push(id);
        for definition in ruleset.builtins {
            fragment
                .builtins
                .push(BuiltinNode::new(file.name.clone(), own_chain.clone(), definition));
        }

        visited.push(key);
        let outcome =
            self.expand_references(&file.name, &ruleset.probes, &own_chain, visited, fragment);
        visited.pop();
        outcome
    }

    fn expand_references(
        &self,
        ruleset: &str,
        references: &[ProbeReference],
        chain: &[Uuid],
        visited: &mut Vec<String>,
        fragment: &mut Fragment,
    ) -> Result<()> {
        for reference in references {
            match self.resolve_reference(reference, chain, visited, fragment) {
                Ok(()) => {}
                Err(e) if aborts_root(&e) => return Err(e),
                Err(e @ DoctorError::SourceNotFound { .. }) => {
                    warn!(ruleset = %ruleset, probe = %reference.name, "skipping probe reference: {}", e)
                }
                Err(e) => {
                    error!(ruleset = %ruleset, probe = %reference.name, "skipping probe reference: {}", e)
                }
            }
        }
        Ok(())
    }

    fn resolve_reference(
        &self,
        reference: &ProbeReference,
        chain: &[Uuid],
        visited: &mut Vec<String>,
        fragment: &mut Fragment,
    ) -> Result<()> {
        let uri = ProbeUri::parse(&reference.url)?;
        let yaml = uri.extension().map(|ext| is_ruleset_extension(&ext));

        let expansion = match (reference.kind, yaml) {
            (ProbeType::Scriptlet, Some(true)) | (ProbeType::Ruleset, Some(false)) => {
                return Err(DoctorError::KindMismatch {
                    name: reference.name.clone(),
                    declared: reference.kind.to_string(),
                    uri: reference.url.clone(),
                });
            }
            (ProbeType::Scriptlet, _) => Expansion::Scriptlets,
            (ProbeType::Ruleset, _) => Expansion::RuleSet,
        };

        self.resolve_uri(&uri, expansion, chain, visited, fragment)
    }

    fn attach_probe(&self, file: &FetchedFile, chain: &[Uuid], fragment: &mut Fragment) {
        let probe = Probe::new(file, chain);
        obs::emit_probe_resolved(&probe.id, &probe.name, chain.len());
        if probe.is_root() {
            fragment.nodes.push((
                probe.id,
                ROOT_ID,
                TreeNode::Probe {
                    name: probe.name.clone(),
                },
            ));
        }
        fragment.order.push(probe.id);
        fragment.probes.push(probe);
    }
}
