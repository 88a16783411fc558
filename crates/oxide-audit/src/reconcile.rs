//! Three-way column reconciliation.
//!
//! Three column sources meet here: the live data table, the live audit
//! table, and the data columns recorded at the last clean run. The audit
//! columns declared in the configuration lead both the expected and the
//! previously configured layout.
//!
//! - `target = audit ⊕ nullable(data_live)`: what the audit table should hold.
//! - `configured = audit ⊕ recorded`: what it was believed to hold.
//! - `new = target − audit_live`
//! - `obsolete = configured − target` (reported, never dropped)
//! - `altered = data_live ≠ recorded`, compared on type, charset and
//!   collation.
//!
//! A table with both new and obsolete columns most likely had a column
//! renamed. That is not guessed: the table is left untouched.

use crate::schema::{ColumnAttribute, ColumnSet};

/// Attributes ignored when looking for altered columns.
pub const ALTERED_IGNORES: &[ColumnAttribute] = &[ColumnAttribute::Nullable];

/// What to do with a table after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// New and obsolete columns at once: skip the table entirely.
    Conflict,
    /// Apply DDL for new columns and regenerate triggers. The snapshot may be
    /// recorded only if `clean`.
    Proceed {
        /// No altered columns.
        clean: bool,
    },
}

/// Outcome of reconciling one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Audit columns followed by all (nullable) data columns.
    pub target: ColumnSet,
    /// Columns missing from the audit table.
    pub new_columns: ColumnSet,
    /// Recorded data columns that are gone from the data table.
    pub obsolete_columns: ColumnSet,
    /// Data columns whose definition changed since the recorded snapshot.
    pub altered_columns: ColumnSet,
}

impl Reconciliation {
    /// Applies the decision policy.
    #[must_use]
    pub fn decision(&self) -> Decision {
        if !self.new_columns.is_empty() && !self.obsolete_columns.is_empty() {
            Decision::Conflict
        } else {
            Decision::Proceed {
                clean: self.altered_columns.is_empty(),
            }
        }
    }

    /// Returns `true` if the table must be skipped.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.decision() == Decision::Conflict
    }
}

/// Reconciles one table.
///
/// `audit_canonical` must already be canonical (see
/// [`canonicalize`](crate::canonicalize::canonicalize)); `recorded` is `None`
/// for tables never synchronized cleanly.
#[must_use]
pub fn reconcile(
    data_live: &ColumnSet,
    audit_live: &ColumnSet,
    audit_canonical: &ColumnSet,
    recorded: Option<&ColumnSet>,
) -> Reconciliation {
    let empty = ColumnSet::new();
    let recorded = recorded.unwrap_or(&empty);

    let mut mirrored = data_live.clone();
    mirrored.make_all_nullable();

    let target = audit_canonical.combine(&mirrored);
    let configured = audit_canonical.combine(recorded);

    Reconciliation {
        new_columns: target.difference(audit_live),
        obsolete_columns: configured.difference(&target),
        altered_columns: data_live.type_diff(recorded, ALTERED_IGNORES),
        target,
    }
}
