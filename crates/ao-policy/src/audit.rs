use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use ao_domain::error::{Error, Result};
use ao_domain::risk::RiskLevel;
use ao_domain::trace::TraceEvent;

/// One line of the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub ts: DateTime<Utc>,
    pub session_id: String,
    pub call_id: String,
    pub tool: String,
    pub risk: RiskLevel,
    pub decision: String,
    pub reason: String,
    pub args_redacted: serde_json::Value,
}

/// Append-only, atomically-rotated JSON-lines audit log.
///
/// Concurrent writers in the same process serialize through `inner`'s
/// mutex; rotation (temp-write + rename) happens before the record
/// that would push the file past `rotate_bytes` is appended, so no
/// line is ever split across the boundary.
pub struct AuditWriter {
    path: PathBuf,
    rotate_bytes: u64,
    inner: Mutex<AuditState>,
}

struct AuditState {
    file: File,
    bytes_written: u64,
}

impl AuditWriter {
    pub fn open(path: impl AsRef<Path>, rotate_bytes: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let bytes_written = file.metadata()?.len();
        Ok(Self {
            path,
            rotate_bytes,
            inner: Mutex::new(AuditState { file, bytes_written }),
        })
    }

    /// Append one record, rotating first if it would exceed the limit.
    pub fn record(&self, record: &AuditRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut state = self.inner.lock();

        if state.bytes_written > 0 && state.bytes_written + line.len() as u64 + 1 > self.rotate_bytes {
            self.rotate(&mut state)?;
        }

        writeln!(state.file, "{line}")?;
        state.bytes_written += line.len() as u64 + 1;
        Ok(())
    }

    fn rotate(&self, state: &mut AuditState) -> Result<()> {
        let rotated = self.next_rotation_path()?;
        let tmp = self.path.with_extension("jsonl.tmp");
        std::fs::copy(&self.path, &tmp)?;
        std::fs::rename(&tmp, &rotated)?;
        state.file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
        state.bytes_written = 0;
        TraceEvent::AuditRotated { path: rotated.display().to_string(), bytes: 0 }.emit();
        Ok(())
    }

    fn next_rotation_path(&self) -> Result<PathBuf> {
        for n in 1..10_000u32 {
            let candidate = self.path.with_extension(format!("jsonl.{n}"));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(Error::Store("exhausted audit rotation slots".into()))
    }
}
