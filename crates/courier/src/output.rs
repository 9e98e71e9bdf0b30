//! Append-only output log shown to the UI

use chrono::{DateTime, Local};
use courier_proto::{Frame, ProtocolError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Order in which [`OutputLog::snapshot`] returns entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputOrder {
    /// Order of arrival
    #[default]
    Arrival,
    /// Sorted by arrival timestamp, ties kept in arrival order
    Timestamp,
}

/// One logged frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEntry {
    /// Logged frame
    pub frame: Frame,
    /// When the frame was appended
    pub received_at: DateTime<Local>,
}

/// Append-only log of frames for display.
///
/// Clones share the same log. Readers never iterate the live vector; they
/// get a copy taken under the lock. Nothing is evicted or deduplicated.
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    entries: Arc<Mutex<Vec<OutputEntry>>>,
    order: OutputOrder,
}

impl OutputLog {
    /// Create an empty log
    pub fn new(order: OutputOrder) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            order,
        }
    }

    /// Snapshot order of this log
    pub fn order(&self) -> OutputOrder {
        self.order
    }

    /// Append a frame stamped with the current time
    pub fn append(&self, frame: Frame) {
        self.append_at(frame, Local::now());
    }

    /// Append a frame with an explicit timestamp
    pub fn append_at(&self, frame: Frame, received_at: DateTime<Local>) {
        self.entries.lock().push(OutputEntry { frame, received_at });
    }

    /// Append several frames in order, under one lock
    pub fn extend(&self, frames: impl IntoIterator<Item = Frame>) {
        let received_at = Local::now();
        let mut entries = self.entries.lock();
        entries.extend(frames.into_iter().map(|frame| OutputEntry { frame, received_at }));
    }

    /// Point-in-time copy of every entry
    pub fn snapshot(&self) -> Vec<OutputEntry> {
        let mut entries = self.entries.lock().clone();
        if self.order == OutputOrder::Timestamp {
            entries.sort_by_key(|entry| entry.received_at);
        }
        entries
    }

    /// Take every entry out of the log, leaving it empty
    pub fn drain(&self) -> Vec<OutputEntry> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot decoded as text, one line per frame, each ending in `\n`
    pub fn render(&self) -> Result<String, ProtocolError> {
        let mut text = String::new();
        for entry in self.snapshot() {
            text.push_str(entry.frame.to_text()?);
            text.push('\n');
        }
        Ok(text)
    }
}
