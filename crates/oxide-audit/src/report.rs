//! Results of a synchronization run.
//!
//! Every new, obsolete and altered column is listed by name, never just
//! counted: an unnoticed column drop would silently end its history.

use std::collections::BTreeMap;
use std::fmt;

use crate::schema::{Column, ColumnSet};

/// A data column whose definition changed since the last recorded snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlteredColumn {
    /// Definition in the recorded snapshot.
    pub previous: Column,
    /// Definition in the live data table.
    pub current: Column,
}

/// What happened to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    /// Not processed yet.
    Pending,
    /// DDL (if any) and triggers were applied. `clean` is false when altered
    /// columns withheld the snapshot.
    Synced {
        /// The audit table was created by this run.
        created: bool,
        /// The snapshot may be persisted.
        clean: bool,
    },
    /// New and obsolete columns appeared together; nothing was changed.
    Conflict,
    /// Present in the configuration with auditing disabled.
    Disabled,
    /// Present in the data schema but not in the configuration.
    Untracked,
    /// Present in the configuration but not in the data schema.
    Missing,
    /// Processing stopped on an error.
    Failed(String),
}

/// Per-table report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    /// Data table name.
    pub table: String,
    /// Outcome.
    pub outcome: TableOutcome,
    /// Columns added to the audit table.
    pub new_columns: Vec<String>,
    /// Columns gone from the data table, kept in the audit table.
    pub obsolete_columns: Vec<String>,
    /// Columns whose definition drifted.
    pub altered_columns: Vec<AlteredColumn>,
    /// Statements executed (or, in dry-run mode, that would be executed).
    pub statements: Vec<String>,
    /// Statements suggested for manual review, never executed.
    pub review_sql: Vec<String>,
    /// Snapshot to record for this table, set only for clean runs.
    pub snapshot: Option<ColumnSet>,
}

impl TableReport {
    /// Creates an empty, pending report.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            outcome: TableOutcome::Pending,
            new_columns: Vec::new(),
            obsolete_columns: Vec::new(),
            altered_columns: Vec::new(),
            statements: Vec::new(),
            review_sql: Vec::new(),
            snapshot: None,
        }
    }

    /// Creates a report that only carries an outcome.
    #[must_use]
    pub fn with_outcome(table: impl Into<String>, outcome: TableOutcome) -> Self {
        Self {
            outcome,
            ..Self::new(table)
        }
    }

    /// Returns `true` if the table has anything a reader should look at.
    /// Untracked and disabled tables never do.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match self.outcome {
            TableOutcome::Untracked | TableOutcome::Disabled => false,
            TableOutcome::Synced { .. } | TableOutcome::Pending => {
                !self.new_columns.is_empty()
                    || !self.obsolete_columns.is_empty()
                    || !self.altered_columns.is_empty()
            }
            TableOutcome::Conflict | TableOutcome::Missing | TableOutcome::Failed(_) => true,
        }
    }
}

impl fmt::Display for TableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Synced {
                created: true,
                clean,
            } => write!(f, "created{}", if *clean { "" } else { " (snapshot withheld)" }),
            Self::Synced {
                created: false,
                clean,
            } => write!(f, "synced{}", if *clean { "" } else { " (snapshot withheld)" }),
            Self::Conflict => f.write_str("CONFLICT: skipped"),
            Self::Disabled => f.write_str("disabled"),
            Self::Untracked => f.write_str("untracked"),
            Self::Missing => f.write_str("missing from database"),
            Self::Failed(message) => write!(f, "FAILED: {message}"),
        }
    }
}

impl fmt::Display for TableReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.table, self.outcome)?;
        for name in &self.new_columns {
            writeln!(f, "  + {name}")?;
        }
        for name in &self.obsolete_columns {
            writeln!(f, "  - {name} (kept in audit table)")?;
        }
        for altered in &self.altered_columns {
            writeln!(
                f,
                "  ~ {}: {} -> {}",
                altered.current.name, altered.previous.column_type, altered.current.column_type
            )?;
        }
        Ok(())
    }
}

/// Report of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// One entry per table considered, in processing order.
    pub tables: Vec<TableReport>,
}

impl SyncReport {
    /// Looks up a table's report.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Snapshots to persist, keyed by table.
    #[must_use]
    pub fn snapshots(&self) -> BTreeMap<&str, &ColumnSet> {
        self.tables
            .iter()
            .filter_map(|t| t.snapshot.as_ref().map(|s| (t.table.as_str(), s)))
            .collect()
    }

    /// Tables skipped because of a conflict.
    pub fn conflicts(&self) -> impl Iterator<Item = &TableReport> {
        self.tables
            .iter()
            .filter(|t| t.outcome == TableOutcome::Conflict)
    }

    /// Tables whose processing failed.
    pub fn failures(&self) -> impl Iterator<Item = &TableReport> {
        self.tables
            .iter()
            .filter(|t| matches!(t.outcome, TableOutcome::Failed(_)))
    }

    /// Returns `true` if any table failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// All statements of the run, in order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .flat_map(|t| t.statements.iter().map(String::as_str))
    }
}
