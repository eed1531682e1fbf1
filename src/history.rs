//! Append-only count history.
//!
//! The history log is the only state shared across pipeline iterations. It
//! is owned by the driver's caller, mutated only through `append` and
//! `clear`, and serializes to a deterministic CSV artifact.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::count::CountSnapshot;
use crate::ClassMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub counts: BTreeMap<u32, u64>,
}

#[derive(Debug, Default)]
pub struct HistoryLog {
    records: Vec<HistoryRecord>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record. O(1) amortized, preserves insertion order, never
    /// fails. Records arrive in capture order, so timestamps are
    /// non-decreasing by construction.
    pub fn append(&mut self, snapshot: &CountSnapshot) {
        self.records.push(HistoryRecord {
            timestamp: snapshot.timestamp,
            counts: snapshot.counts().clone(),
        });
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Discard all records.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Serialize the full history as CSV: a header row (`timestamp` plus one
    /// column per class label in id order), then one row per record. The
    /// output is deterministic for a given history state; an empty history
    /// yields the header row only.
    pub fn export_csv(&self, classes: &ClassMap) -> String {
        let mut out = self.header(classes);
        for record in &self.records {
            let mut row = record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Secs, true);
            for id in classes.ids() {
                let count = record.counts.get(&id).copied().unwrap_or(0);
                if write!(row, ",{}", count).is_err() {
                    // Serialization failure degrades to header-only output
                    // instead of aborting the caller.
                    log::warn!("history export failed; returning header only");
                    return self.header(classes);
                }
            }
            row.push('\n');
            out.push_str(&row);
        }
        out
    }

    fn header(&self, classes: &ClassMap) -> String {
        let mut header = String::from("timestamp");
        for label in classes.labels() {
            header.push(',');
            header.push_str(label);
        }
        header.push('\n');
        header
    }
}
