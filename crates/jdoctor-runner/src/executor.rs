//! Out-of-process probe execution.
//!
//! A probe is any executable file (or script with a configured interpreter)
//! honouring this contract:
//! - `<probe> describe` prints the names of the functions it exposes, one per line
//! - `<probe> <function>` reads the merged snapshot mapping as JSON on stdin;
//!   exit status 0 passes, anything else fails with stderr as the error

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use jdoctor_core::obs;
use jdoctor_core::{ArtifactKind, Artifacts, AssertionResult, Probe};

/// Interpreter selection for probe files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// File extension → launcher argv, e.g. `py → ["python3"]`.
    pub interpreters: BTreeMap<String, Vec<String>>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let mut interpreters = BTreeMap::new();
        interpreters.insert("py".to_string(), vec!["python3".to_string()]);
        interpreters.insert("sh".to_string(), vec!["sh".to_string()]);
        Self { interpreters }
    }
}

impl ExecutorConfig {
    /// Defaults, with `JDOCTOR_PYTHON` replacing the python launcher.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(python) = std::env::var("JDOCTOR_PYTHON") {
            let launcher: Vec<String> = python.split_whitespace().map(str::to_string).collect();
            if launcher.is_empty() {
                warn!("ignoring empty JDOCTOR_PYTHON");
            } else {
                config.interpreters.insert("py".to_string(), launcher);
            }
        }
        config
    }

    /// Register (or replace) the launcher for an extension.
    pub fn with_interpreter(mut self, extension: &str, launcher: &[&str]) -> Self {
        self.interpreters.insert(
            extension.to_string(),
            launcher.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Program and leading arguments used to run `probe`.
    pub fn launcher(&self, probe: &Path) -> (String, Vec<String>) {
        let interpreter = probe
            .extension()
            .and_then(|ext| self.interpreters.get(ext.to_string_lossy().as_ref()))
            .and_then(|argv| argv.split_first());

        match interpreter {
            Some((program, args)) => {
                let mut args = args.to_vec();
                args.push(probe.display().to_string());
                (program.clone(), args)
            }
            None => (probe.display().to_string(), Vec::new()),
        }
    }
}

/// Result of one probe process.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl Invocation {
    /// Text used as the captured error of a failed invocation.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exited with status {}", self.exit_code)
        } else {
            stderr.to_string()
        }
    }
}

/// Access to a probe's entry points.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Names of the functions the probe exposes.
    async fn describe(&self, probe: &Path) -> anyhow::Result<Vec<String>>;

    /// Call `function` with `input` as its argument.
    async fn invoke(&self, probe: &Path, function: &str, input: &Value)
        -> anyhow::Result<Invocation>;
}

/// [`FunctionInvoker`] that spawns the probe as a child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    config: ExecutorConfig,
}

impl ProcessInvoker {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    async fn run(
        &self,
        probe: &Path,
        argument: &str,
        input: Option<Vec<u8>>,
    ) -> anyhow::Result<Invocation> {
        let (program, args) = self.config.launcher(probe);
        let mut command = Command::new(&program);
        command
            .args(&args)
            .arg(argument)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {program} for {}", probe.display()))?;

        let writer = match (child.stdin.take(), input) {
            (Some(mut stdin), Some(bytes)) => Some(tokio::spawn(async move {
                match stdin.write_all(&bytes).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                    _ => Ok(()),
                }
            })),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("failed to wait for {}", probe.display()))?;

        if let Some(writer) = writer {
            writer
                .await
                .context("stdin writer task failed")?
                .context("failed to write probe input")?;
        }

        Ok(Invocation {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }
}

#[async_trait]
impl FunctionInvoker for ProcessInvoker {
    async fn describe(&self, probe: &Path) -> anyhow::Result<Vec<String>> {
        let invocation = self.run(probe, "describe", None).await?;
        if !invocation.success {
            anyhow::bail!("describe failed: {}", invocation.error_text());
        }
        Ok(invocation
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn invoke(
        &self,
        probe: &Path,
        function: &str,
        input: &Value,
    ) -> anyhow::Result<Invocation> {
        let bytes = serde_json::to_vec(input).context("failed to encode probe input")?;
        self.run(probe, function, Some(bytes)).await
    }
}

/// Runs each recognized probe function against its artifact kind.
pub struct ProbeExecutor<I = ProcessInvoker> {
    invoker: I,
}

impl ProbeExecutor<ProcessInvoker> {
    pub fn from_config(config: ExecutorConfig) -> Self {
        Self::new(ProcessInvoker::new(config))
    }
}

impl<I: FunctionInvoker> ProbeExecutor<I> {
    pub fn new(invoker: I) -> Self {
        Self { invoker }
    }

    /// Execute `probe`, appending one result per invoked function.
    ///
    /// Missing artifact kinds are logged and skipped; failures are recorded as
    /// failing results and never returned.
    pub async fn execute(&self, probe: &mut Probe, artifacts: &Artifacts) {
        let exposed = match self.invoker.describe(&probe.path).await {
            Ok(functions) => functions,
            Err(e) => {
                warn!(probe = %probe.name, "could not describe probe: {:#}", e);
                obs::emit_probe_executed(&probe.name, 0, 0);
                return;
            }
        };

        let kinds: Vec<ArtifactKind> = ArtifactKind::ALL
            .into_iter()
            .filter(|kind| exposed.iter().any(|f| f == kind.function_name()))
            .collect();
        debug!(probe = %probe.name, exposed = ?exposed, "described probe");

        for kind in kinds {
            let Some(snapshots) = artifacts.get(kind) else {
                obs::warn_artifact_gap(kind, &probe.name);
                continue;
            };
            let function = kind.function_name();

            let input = match serde_json::to_value(snapshots) {
                Ok(input) => input,
                Err(e) => {
                    probe
                        .results
                        .push(AssertionResult::fail(function, format!("invalid input: {e}")));
                    continue;
                }
            };

            let result = match self.invoker.invoke(&probe.path, function, &input).await {
                Ok(invocation) if invocation.success => AssertionResult::pass(function),
                Ok(invocation) => AssertionResult::fail(function, invocation.error_text()),
                Err(e) => AssertionResult::fail(function, format!("{e:#}")),
            };
            probe.results.push(result);
        }

        let failed = probe.results.iter().filter(|r| !r.passed).count();
        obs::emit_probe_executed(&probe.name, probe.results.len(), failed);
    }
}
