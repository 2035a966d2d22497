//! Run reports

use crate::directive::ObjectKind;
use crate::operation::{Operation, Verb};
use serde::{Deserialize, Serialize};

/// Outcome of one planned operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Computed but not transmitted (inspect or dry run)
    Planned,
    /// Transmitted and accepted
    Applied,
    /// Rejected by the backend
    Failed,
    /// Not attempted because of an earlier failure or a declined confirmation
    Skipped,
}

/// One line of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub kind: ObjectKind,
    pub identity: String,
    pub operation: Verb,
    /// Statement text with password material masked
    pub statement: String,
    pub status: Status,
    /// Backend message for a failed entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportEntry {
    pub fn new(operation: &Operation, status: Status) -> Self {
        let key = operation.key();
        Self {
            kind: key.kind(),
            identity: key.identity(),
            operation: operation.verb(),
            statement: operation.display_statement(),
            status,
            error: None,
        }
    }
}

/// Ordered record of what a run planned or did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub dry_run: bool,
    pub entries: Vec<ReportEntry>,
}

/// Counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub planned: usize,
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ReportSummary {
    /// Total number of entries counted
    pub fn total(&self) -> usize {
        self.planned + self.applied + self.failed + self.skipped
    }
}

impl Report {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            entries: Vec::new(),
        }
    }

    /// A report listing every operation with the same status.
    pub fn uniform<'a>(
        operations: impl IntoIterator<Item = &'a Operation>,
        status: Status,
        dry_run: bool,
    ) -> Self {
        Self {
            dry_run,
            entries: operations
                .into_iter()
                .map(|op| ReportEntry::new(op, status))
                .collect(),
        }
    }

    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no entry failed
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|e| e.status != Status::Failed)
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for entry in &self.entries {
            match entry.status {
                Status::Planned => summary.planned += 1,
                Status::Applied => summary.applied += 1,
                Status::Failed => summary.failed += 1,
                Status::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    /// The failing entry of a fail-fast run.
    pub fn failure(&self) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.status == Status::Failed)
    }
}
