//! Append-only audit log.
//!
//! Entries are held in memory for the feed and, when a path is configured,
//! mirrored to a JSON Lines file (one JSON object per line). The file format
//! is crash-safe: complete lines are always valid JSON, and every append is
//! fsynced before the surrounding command is acknowledged, so an entry the
//! client saw confirmed survives a restart.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{SectionId, TrainId};

use super::entry::{Actor, AuditEntry, EventKind};

/// Errors from audit log operations.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// The fields of an entry the applier supplies; seq and timestamp are
/// assigned by the log itself.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub event: EventKind,
    pub train: Option<TrainId>,
    pub section: Option<SectionId>,
    pub actor: Actor,
    pub action: String,
    pub details: String,
}

/// The append-only audit trail for one region.
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    file: Option<File>,
    path: Option<PathBuf>,
    next_seq: u64,
}

impl AuditLog {
    /// An in-memory log (tests, ephemeral deployments).
    pub fn in_memory() -> Self {
        AuditLog {
            entries: Vec::new(),
            file: None,
            path: None,
            next_seq: 1,
        }
    }

    /// A log mirrored to a JSON Lines file, opened for append.
    ///
    /// Existing entries are replayed into memory so the feed is complete
    /// after a restart; a trailing partial line (crash mid-write) is
    /// ignored.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut entries = Vec::new();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            for line in contents.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<AuditEntry>(line) {
                    Ok(entry) => entries.push(entry),
                    // A partial final line is expected after a crash; any
                    // other unparseable line is surfaced.
                    Err(_) if Some(line) == contents.lines().last() => break,
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let next_seq = entries.last().map_or(1, |e| e.seq + 1);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(AuditLog {
            entries,
            file: Some(file),
            path: Some(path),
            next_seq,
        })
    }

    /// Appends a record, assigning the next sequence number and the current
    /// timestamp.
    ///
    /// When file-backed, the line is written and fsynced before this
    /// returns; an IO failure leaves the in-memory feed untouched so the
    /// caller can roll back the surrounding mutation.
    pub fn append(&mut self, record: AuditRecord, now: DateTime<Utc>) -> Result<AuditEntry> {
        let entry = AuditEntry {
            seq: self.next_seq,
            timestamp: now,
            event: record.event,
            train: record.train,
            section: record.section,
            actor: record.actor,
            action: record.action,
            details: record.details,
        };

        if let Some(file) = &mut self.file {
            let mut line = serde_json::to_string(&entry)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
            file.sync_all()?;
        }

        self.next_seq += 1;
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
