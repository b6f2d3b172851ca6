//! Structured observability hooks for the check lifecycle.
//!
//! This module provides:
//! - Run-scoped tracing spans via the `CheckSpan` RAII guard
//! - Emission functions for lifecycle events: start, probe resolution,
//!   probe execution, builtin validation, finish
//!
//! Lifecycle events are emitted at `debug!` level so they stay out of the
//! default `WARN` output; set `RUST_LOG=debug` to see them.

use tracing::{debug, warn};

use crate::artifacts::ArtifactKind;

/// RAII guard that enters a run-scoped tracing span for the duration of a check.
///
/// ```ignore
/// let _span = CheckSpan::enter(&run_id);
/// // every event emitted below is tagged with run_id
/// ```
pub struct CheckSpan {
    _span: tracing::span::EnteredSpan,
}

impl CheckSpan {
    /// Create and enter a span tagged with the run id.
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("jdoctor.check", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a check run started.
pub fn emit_check_started(run_id: &str, probe_sources: usize, artifact_kinds: usize) {
    debug!(
        event = "check.started",
        run_id = %run_id,
        probe_sources = probe_sources,
        artifact_kinds = artifact_kinds,
    );
}

/// Emit event: a leaf probe was resolved into the tree.
pub fn emit_probe_resolved(probe_id: &uuid::Uuid, name: &str, depth: usize) {
    debug!(event = "probe.resolved", probe_id = %probe_id, name = %name, depth = depth);
}

/// Emit event: a probe finished executing.
pub fn emit_probe_executed(name: &str, functions: usize, failed: usize) {
    debug!(
        event = "probe.executed",
        name = %name,
        functions = functions,
        failed = failed,
    );
}

/// Emit event: a builtin block finished validating.
pub fn emit_builtin_validated(owner: &str, builtin: &str, results: usize, passed: bool) {
    debug!(
        event = "builtin.validated",
        owner = %owner,
        builtin = %builtin,
        results = results,
        passed = passed,
    );
}

/// Warn that a probe or built-in needs an artifact kind nobody supplied.
///
/// This is an environment gap, not an assertion failure.
pub fn warn_artifact_gap(kind: ArtifactKind, probe: &str) {
    warn!(
        event = "artifact.missing",
        kind = %kind,
        "no `{}` artifact was provided for probe `{}`",
        kind,
        probe
    );
}

/// Emit event: the check run finished with its totals.
pub fn emit_check_finished(run_id: &str, passed: usize, failed: usize) {
    debug!(
        event = "check.finished",
        run_id = %run_id,
        passed = passed,
        failed = failed,
    );
}
