//! Runner log files

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::Result;

/// Returned instead of an error when a runner has never been started
pub const NO_LOGS_PLACEHOLDER: &str = "No logs available yet. Runner may not have been started.";

/// Lines returned by a log request
pub const DEFAULT_TAIL_LINES: usize = 1000;

const TAIL_CHUNK: u64 = 8 * 1024;

/// Directory of `<name>.log` files
#[derive(Debug, Clone)]
pub struct LogStore {
    dir: PathBuf,
}

impl LogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.log", name))
    }

    /// Create a fresh log file for a new run of `name`
    ///
    /// The previous file is unlinked rather than truncated, so a process from
    /// the previous run that is still shutting down keeps writing to its own inode.
    pub fn create(&self, name: &str) -> Result<File> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(File::create(path)?)
    }

    /// Last `lines` lines of the log for `name`, or the placeholder if there is none
    pub fn tail(&self, name: &str, lines: usize) -> Result<String> {
        let mut file = match File::open(self.path(name)) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(NO_LOGS_PLACEHOLDER.to_string());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(tail_file(&mut file, lines)?)
    }
}

/// Read the last `lines` lines of `file` without loading the rest
///
/// The file length is sampled once up front, so bytes appended while reading
/// are not included. A trailing newline does not count as an empty last line.
pub fn tail_file(file: &mut File, lines: usize) -> std::io::Result<String> {
    let len = file.seek(SeekFrom::End(0))?;
    tail_from_snapshot(file, lines, len)
}

/// Tail from a sampled length, resampling once if the file shrank underneath
fn tail_from_snapshot(file: &mut File, lines: usize, len: u64) -> std::io::Result<String> {
    match read_tail(file, lines, len) {
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            let len = file.seek(SeekFrom::End(0))?;
            read_tail(file, lines, len)
        }
        other => other,
    }
}

fn read_tail(file: &mut File, lines: usize, len: u64) -> std::io::Result<String> {
    if len == 0 || lines == 0 {
        return Ok(String::new());
    }

    let mut buf = vec![0u8; TAIL_CHUNK as usize];
    let mut pos = len;
    let mut start = 0u64;
    let mut newlines = 0usize;

    'scan: while pos > 0 {
        let read_len = TAIL_CHUNK.min(pos);
        pos -= read_len;
        file.seek(SeekFrom::Start(pos))?;
        let chunk = &mut buf[..read_len as usize];
        file.read_exact(chunk)?;

        for (idx, byte) in chunk.iter().enumerate().rev() {
            let offset = pos + idx as u64;
            if *byte != b'\n' || offset == len - 1 {
                continue;
            }
            newlines += 1;
            if newlines == lines {
                start = offset + 1;
                break 'scan;
            }
        }
    }

    file.seek(SeekFrom::Start(start))?;
    let mut out = Vec::with_capacity((len - start) as usize);
    file.by_ref().take(len - start).read_to_end(&mut out)?;

    Ok(String::from_utf8_lossy(&out).into_owned())
}
