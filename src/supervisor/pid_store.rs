//! PID file persistence
//!
//! A PID file's first line is the decimal pid, so plain `echo $! > name.pid`
//! files stay readable. Later `key=value` lines carry launch metadata used to
//! tell a live runner from a recycled pid.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ProcessIdentity;
use crate::{Error, Result};

/// Contents of one `<name>.pid` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidRecord {
    pub pid: u32,
    pub launch_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub start_ticks: Option<u64>,
}

impl PidRecord {
    /// Record for a process launched just now
    pub fn new(identity: ProcessIdentity) -> Self {
        Self {
            pid: identity.pid,
            launch_id: Some(Uuid::new_v4()),
            started_at: Some(Utc::now()),
            start_ticks: identity.start_ticks,
        }
    }

    pub fn identity(&self) -> ProcessIdentity {
        ProcessIdentity {
            pid: self.pid,
            start_ticks: self.start_ticks,
        }
    }

    fn render(&self) -> String {
        let mut out = format!("{}\n", self.pid);
        if let Some(id) = self.launch_id {
            out.push_str(&format!("launch_id={}\n", id));
        }
        if let Some(at) = self.started_at {
            out.push_str(&format!("started_at={}\n", at.to_rfc3339()));
        }
        if let Some(ticks) = self.start_ticks {
            out.push_str(&format!("start_ticks={}\n", ticks));
        }
        out
    }

    fn parse(text: &str) -> Option<Self> {
        let mut lines = text.lines();
        let pid = lines.next()?.trim().parse::<u32>().ok().filter(|pid| *pid > 0)?;

        let mut record = Self {
            pid,
            launch_id: None,
            started_at: None,
            start_ticks: None,
        };

        // Unknown keys and unparseable values are ignored
        for line in lines {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "launch_id" => record.launch_id = value.parse().ok(),
                "started_at" => {
                    record.started_at = DateTime::parse_from_rfc3339(value)
                        .ok()
                        .map(|at| at.with_timezone(&Utc))
                }
                "start_ticks" => record.start_ticks = value.parse().ok(),
                _ => {}
            }
        }

        Some(record)
    }
}

/// Directory of `<name>.pid` files
#[derive(Debug, Clone)]
pub struct PidStore {
    dir: PathBuf,
}

impl PidStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.pid", name))
    }

    /// Read the record for `name`; `Ok(None)` when there is none
    pub fn read(&self, name: &str) -> Result<Option<PidRecord>> {
        let path = self.path(name);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        PidRecord::parse(&text)
            .map(Some)
            .ok_or_else(|| Error::Other(format!("Malformed PID file {:?}", path)))
    }

    /// Persist the record for `name`, replacing any previous one
    pub fn write(&self, name: &str, record: &PidRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path(name);
        let tmp = self.dir.join(format!(".{}.pid.tmp", name));
        std::fs::write(&tmp, record.render())?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Delete the record for `name`; returns whether one existed
    pub fn remove(&self, name: &str) -> Result<bool> {
        match std::fs::remove_file(self.path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
