//! Process supervisor backed by the real OS process table

use std::fs::File;
use std::process::Stdio;

use super::{LaunchSpec, ProcessIdentity, ProcessSupervisor, Termination};
use crate::{Error, Result};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::Pid as NixPid;

/// Spawns runners with tokio and signals them with `kill(2)`
///
/// Spawning needs a Tokio runtime: each child is awaited on a background task
/// so it gets reaped once it exits instead of lingering as a zombie.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSupervisor;

impl OsSupervisor {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSupervisor for OsSupervisor {
    fn spawn(&self, spec: &LaunchSpec, output: File) -> Result<ProcessIdentity> {
        let stderr = output.try_clone()?;

        let mut command = tokio::process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(output))
            .stderr(Stdio::from(stderr));

        // Own process group, so signals aimed at the manager don't reach runners
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| Error::Spawn(format!("{}: {}", spec.program.display(), e)))?;

        let pid = child
            .id()
            .ok_or_else(|| Error::Spawn("Process exited before its PID could be read".to_string()))?;

        let identity = ProcessIdentity {
            pid,
            start_ticks: read_proc_stat(pid).map(|stat| stat.start_ticks),
        };

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::info!("Runner process {} exited with {}", pid, status),
                Err(e) => tracing::warn!("Failed to wait for runner process {}: {}", pid, e),
            }
        });

        Ok(identity)
    }

    #[cfg(unix)]
    fn is_alive(&self, process: &ProcessIdentity) -> bool {
        let Some(pid) = nix_pid(process.pid) else {
            return false;
        };

        match kill(pid, None) {
            // EPERM: it exists, it just isn't ours to signal
            Ok(()) | Err(Errno::EPERM) => {}
            Err(_) => return false,
        }

        match read_proc_stat(process.pid) {
            Some(stat) if stat.state == 'Z' => false,
            Some(stat) => match process.start_ticks {
                Some(expected) => expected == stat.start_ticks,
                None => true,
            },
            None => true,
        }
    }

    #[cfg(not(unix))]
    fn is_alive(&self, _process: &ProcessIdentity) -> bool {
        false
    }

    #[cfg(unix)]
    fn terminate(&self, pid: u32, mode: Termination) -> Result<()> {
        let target = nix_pid(pid).ok_or(Error::ProcessNotRunning(pid))?;
        let signal = match mode {
            Termination::Graceful => Signal::SIGTERM,
            Termination::Forceful => Signal::SIGKILL,
        };

        match kill(target, signal) {
            Ok(()) => {
                tracing::debug!("Sent {} to PID {}", signal, pid);
                Ok(())
            }
            Err(Errno::ESRCH) => Err(Error::ProcessNotRunning(pid)),
            Err(e) => Err(Error::Signal(format!("{} to PID {}: {}", signal, pid, e))),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&self, pid: u32, _mode: Termination) -> Result<()> {
        Err(Error::Signal(format!(
            "Signals are not supported on this platform (PID {})",
            pid
        )))
    }
}

/// Reject pid 0 and values that would wrap negative; both address process groups
#[cfg(unix)]
fn nix_pid(pid: u32) -> Option<NixPid> {
    i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .map(NixPid::from_raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProcStat {
    state: char,
    start_ticks: u64,
}

#[cfg(target_os = "linux")]
fn read_proc_stat(pid: u32) -> Option<ProcStat> {
    let text = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    parse_proc_stat(&text)
}

#[cfg(not(target_os = "linux"))]
fn read_proc_stat(_pid: u32) -> Option<ProcStat> {
    None
}

/// Parse `/proc/<pid>/stat`; `comm` may itself contain spaces and parentheses
fn parse_proc_stat(text: &str) -> Option<ProcStat> {
    let (_, rest) = text.rsplit_once(')')?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let state = fields.first()?.chars().next()?;
    // starttime is field 22 overall, the 20th after the comm
    let start_ticks = fields.get(19)?.parse().ok()?;
    Some(ProcStat { state, start_ticks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_stat() {
        let text = "4242 (gitlab (runner) x) S 1 4242 4242 0 -1 4194560 1234 0 0 0 \
                    10 5 0 0 20 0 12 0 987654 123456789 2000 18446744073709551615";
        let stat = parse_proc_stat(text).unwrap();
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.start_ticks, 987654);
    }

    #[test]
    fn test_parse_proc_stat_truncated() {
        assert_eq!(parse_proc_stat("12 (sh) Z 1 2 3"), None);
        assert_eq!(parse_proc_stat("garbage"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_pid_zero_is_never_signalled() {
        let supervisor = OsSupervisor::new();
        assert!(!supervisor.is_alive(&ProcessIdentity { pid: 0, start_ticks: None }));
        assert!(matches!(
            supervisor.terminate(0, Termination::Graceful),
            Err(Error::ProcessNotRunning(0))
        ));
        assert!(supervisor.terminate(u32::MAX, Termination::Forceful).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_is_alive_terminate() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-runner");
        std::fs::write(&script, "#!/bin/sh\necho \"fake runner $@\"\necho oops >&2\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let log_path = dir.path().join("out.log");
        let log = File::create(&log_path).unwrap();

        let supervisor = OsSupervisor::new();
        let spec = LaunchSpec {
            program: script,
            args: vec!["run".into(), "-n".into(), "build-1".into()],
            working_dir: dir.path().to_path_buf(),
        };
        let identity = supervisor.spawn(&spec, log).unwrap();
        assert!(identity.pid > 0);
        assert!(supervisor.is_alive(&identity));

        // A different start time means the pid was recycled
        if let Some(ticks) = identity.start_ticks {
            let recycled = ProcessIdentity { pid: identity.pid, start_ticks: Some(ticks + 1) };
            assert!(!supervisor.is_alive(&recycled));
        }

        // Wait for the script to produce output before killing it
        for _ in 0..50 {
            let text = std::fs::read_to_string(&log_path).unwrap();
            if text.contains("oops") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        supervisor.terminate(identity.pid, Termination::Graceful).unwrap();

        let mut alive = true;
        for _ in 0..50 {
            if !supervisor.is_alive(&identity) {
                alive = false;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(!alive, "process should exit after SIGTERM");

        let text = std::fs::read_to_string(&log_path).unwrap();
        assert!(text.contains("fake runner run -n build-1"));
        assert!(text.contains("oops"));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let log = File::create(dir.path().join("out.log")).unwrap();
        let spec = LaunchSpec {
            program: dir.path().join("does-not-exist"),
            args: Vec::new(),
            working_dir: dir.path().to_path_buf(),
        };
        assert!(matches!(
            OsSupervisor::new().spawn(&spec, log),
            Err(Error::Spawn(_))
        ));
    }
}
