//! Runner process lifecycle management
//!
//! This module tracks runner processes through PID files, starts and stops
//! them as detached OS processes, and serves their log tails. All OS process
//! table access goes through [`ProcessSupervisor`] so it can be swapped out.

#[cfg(test)]
pub(crate) mod fake;
mod log_store;
mod manager;
mod os;
mod pid_store;

pub use log_store::{LogStore, DEFAULT_TAIL_LINES, NO_LOGS_PLACEHOLDER};
pub use manager::{ProcessManager, ProcessStatus, RunnerState};
pub use os::OsSupervisor;
pub use pid_store::{PidRecord, PidStore};

use std::ffi::OsString;
use std::fs::File;
use std::path::PathBuf;

use crate::Result;

/// How to launch a runner process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: PathBuf,
}

/// Identity of a spawned process
///
/// `start_ticks` is the kernel's record of when the process started. When both
/// sides have it, a mismatch means the pid now belongs to someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub start_ticks: Option<u64>,
}

/// Termination strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGTERM
    Graceful,
    /// SIGKILL
    Forceful,
}

/// Access to the OS process table
pub trait ProcessSupervisor: Send + Sync {
    /// Launch a detached process with stdout and stderr both written to `output`.
    /// Must not wait for the process.
    fn spawn(&self, spec: &LaunchSpec, output: File) -> Result<ProcessIdentity>;

    /// Whether the process still exists and is the one that was launched
    fn is_alive(&self, process: &ProcessIdentity) -> bool;

    /// Deliver a termination signal without waiting for exit
    fn terminate(&self, pid: u32, mode: Termination) -> Result<()>;
}
