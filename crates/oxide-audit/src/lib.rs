//! Audit tables and history triggers for MySQL.
//!
//! `oxide-audit` keeps an append-only audit table next to every tracked data
//! table, plus `AFTER INSERT/UPDATE/DELETE` triggers that copy each changed
//! row into it. When data tables evolve, it works out what the audit tables
//! need:
//! - New data columns are added to the audit table at the matching position
//! - Dropped data columns stay in the audit table, so history survives
//! - Type changes are reported for review instead of being applied
//! - A column that seems renamed (one new, one gone) stops the table, since
//!   a rename cannot be told apart from a drop plus an add
//!
//! # Architecture
//!
//! - **Schema** - [`Column`](schema::Column) and ordered [`ColumnSet`](schema::ColumnSet)
//! - **Canonicalizer** - Normalizes declared audit column types via the database
//! - **Reconciler** - Diffs live data, live audit and recorded snapshot columns
//! - **DDL** - `CREATE TABLE` / `ADD COLUMN ... AFTER` generation
//! - **Triggers** - History trigger generation
//! - **Executor** - Runs a synchronization with a locked trigger swap
//! - **Config** - JSON configuration and recorded snapshots
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_audit::prelude::*;
//!
//! let config = AuditConfig::load("oxide-audit.json".as_ref())?;
//! let db = MySqlDatabase::connect("mysql://root@localhost/shop").await?;
//!
//! let mut executor = AuditExecutor::new(db);
//! let report = executor.run(&config).await?;
//! for table in &report.tables {
//!     print!("{table}");
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Write a starter config listing the data schema's tables
//! oxide-audit init --data-schema shop --audit-schema shop_audit
//!
//! # Show what would change
//! oxide-audit status
//!
//! # Write the statements to a file without executing them
//! oxide-audit sync --dry-run --output audit.sql
//!
//! # Apply and record snapshots
//! oxide-audit sync
//! ```

pub mod canonicalize;
pub mod config;
pub mod database;
pub mod ddl;
pub mod error;
pub mod executor;
pub mod mysql;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod script;
pub mod trigger;

#[cfg(test)]
mod testing;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::canonicalize::canonicalize;
    pub use crate::config::{AuditColumnSpec, AuditConfig, TableConfig};
    pub use crate::database::AuditDatabase;
    pub use crate::ddl::DdlGenerator;
    pub use crate::error::{AuditError, Result};
    pub use crate::executor::AuditExecutor;
    pub use crate::mysql::MySqlDatabase;
    pub use crate::reconcile::{reconcile, Decision, Reconciliation};
    pub use crate::report::{SyncReport, TableOutcome, TableReport};
    pub use crate::schema::{Column, ColumnSet, TableOptions, ValueBinding};
    pub use crate::script::render_script;
    pub use crate::trigger::{TriggerAction, TriggerGenerator};
}
