//! juju-doctor runner
//!
//! Executes resolved probes out of process and orchestrates complete check
//! runs on top of `jdoctor-core`.

pub mod check;
pub mod executor;

pub use check::{Check, CheckReport};
pub use executor::{ExecutorConfig, FunctionInvoker, Invocation, ProbeExecutor, ProcessInvoker};
