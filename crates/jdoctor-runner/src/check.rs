//! Check-run orchestration.
//!
//! One run is three sequential passes: resolve the probe sources, execute
//! probes and built-ins against the artifacts, then aggregate the outcomes.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use jdoctor_core::obs::{self, CheckSpan};
use jdoctor_core::{
    render_json, render_text, Artifacts, ProbeTree, RenderableTree, ResultAggregator, Resolver,
    ResolverConfig, SourceFetcher, Totals,
};

use crate::executor::{FunctionInvoker, ProbeExecutor, ProcessInvoker};

/// Outcome of a complete check run.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub run_id: String,
    /// The executed probe tree.
    pub probe_tree: ProbeTree,
    pub result: RenderableTree,
    pub verbose: bool,
}

impl CheckReport {
    pub fn totals(&self) -> Totals {
        self.result.totals
    }

    pub fn to_text(&self) -> String {
        render_text(&self.result, self.verbose)
    }

    pub fn to_json(&self) -> Value {
        render_json(&self.result, self.verbose)
    }
}

/// Check-run orchestrator.
pub struct Check<'a, I = ProcessInvoker> {
    fetcher: &'a dyn SourceFetcher,
    executor: ProbeExecutor<I>,
    resolver: ResolverConfig,
    staging: PathBuf,
    verbose: bool,
}

impl<'a, I: FunctionInvoker> Check<'a, I> {
    /// `staging` receives every fetched probe file for the run.
    pub fn new(fetcher: &'a dyn SourceFetcher, executor: ProbeExecutor<I>, staging: &Path) -> Self {
        Self {
            fetcher,
            executor,
            resolver: ResolverConfig::default(),
            staging: staging.to_path_buf(),
            verbose: false,
        }
    }

    pub fn with_resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver = config;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run every probe source against `artifacts`.
    ///
    /// Always completes; resolution and assertion failures end up in logs or
    /// in the report.
    pub async fn run(&self, probe_sources: &[String], artifacts: &Artifacts) -> CheckReport {
        let run_id = Uuid::new_v4().to_string();
        let _span = CheckSpan::enter(&run_id);
        obs::emit_check_started(&run_id, probe_sources.len(), artifacts.kinds().len());

        let resolver = Resolver::new(self.fetcher, self.resolver.clone(), &self.staging);
        let mut probe_tree = resolver.resolve(probe_sources);
        info!(
            probes = probe_tree.probes.len(),
            builtins = probe_tree.builtins.len(),
            "resolved probe tree"
        );

        for probe in probe_tree.probes.iter_mut() {
            self.executor.execute(probe, artifacts).await;
        }
        for builtin in probe_tree.builtins.iter_mut() {
            builtin.run(artifacts);
        }

        let result = ResultAggregator::new(self.verbose).build(&probe_tree);
        obs::emit_check_finished(&run_id, result.totals.passed, result.totals.failed);

        CheckReport {
            run_id,
            probe_tree,
            result,
            verbose: self.verbose,
        }
    }
}
