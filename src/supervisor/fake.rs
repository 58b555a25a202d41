//! In-memory process supervisor for tests

use std::collections::HashSet;
use std::io::Write;

use parking_lot::Mutex;

use super::{LaunchSpec, ProcessIdentity, ProcessSupervisor, Termination};
use crate::{Error, Result};

/// In-memory process table
#[derive(Default)]
pub(crate) struct FakeSupervisor {
    next_pid: Mutex<u32>,
    alive: Mutex<HashSet<u32>>,
    pub(crate) spawned: Mutex<Vec<LaunchSpec>>,
    pub(crate) signals: Mutex<Vec<(u32, Termination)>>,
    pub(crate) fail_spawn: Mutex<bool>,
    /// Processes that ignore SIGTERM
    pub(crate) stubborn: Mutex<bool>,
}

impl FakeSupervisor {
    /// Simulate the process dying on its own
    pub(crate) fn kill_out_of_band(&self, pid: u32) {
        self.alive.lock().remove(&pid);
    }

    pub(crate) fn is_running(&self, pid: u32) -> bool {
        self.alive.lock().contains(&pid)
    }
}

impl ProcessSupervisor for FakeSupervisor {
    fn spawn(&self, spec: &LaunchSpec, mut output: std::fs::File) -> Result<ProcessIdentity> {
        if *self.fail_spawn.lock() {
            return Err(Error::Spawn("no such file or directory".to_string()));
        }

        let pid = {
            let mut next = self.next_pid.lock();
            *next += 1;
            1000 + *next
        };
        writeln!(output, "fake runner started: {:?}", spec.args)?;

        self.alive.lock().insert(pid);
        self.spawned.lock().push(spec.clone());
        Ok(ProcessIdentity {
            pid,
            start_ticks: Some(pid as u64 * 10),
        })
    }

    fn is_alive(&self, process: &ProcessIdentity) -> bool {
        self.is_running(process.pid)
    }

    fn terminate(&self, pid: u32, mode: Termination) -> Result<()> {
        self.signals.lock().push((pid, mode));
        if !self.is_running(pid) {
            return Err(Error::ProcessNotRunning(pid));
        }
        if mode == Termination::Forceful || !*self.stubborn.lock() {
            self.alive.lock().remove(&pid);
        }
        Ok(())
    }
}
