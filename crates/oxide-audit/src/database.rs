//! Database access used by the synchronizer.
//!
//! Everything the engine needs from the database goes through
//! [`AuditDatabase`], so generators and the reconciler never touch a
//! connection directly.

use crate::error::Result;
use crate::schema::{ColumnSet, TableOptions};

/// Metadata queries and statement execution against one database session.
///
/// Implementations must run every call on the same session: table locks
/// taken by [`lock_table_write`](Self::lock_table_write) are released by
/// [`unlock_all`](Self::unlock_all) on that session only.
#[allow(async_fn_in_trait)]
pub trait AuditDatabase {
    /// Lists base tables of a schema, ordered by name.
    async fn list_tables(&mut self, schema: &str) -> Result<Vec<String>>;

    /// Returns a table's columns in ordinal order. An unknown table yields
    /// an empty set.
    async fn get_columns(&mut self, schema: &str, table: &str) -> Result<ColumnSet>;

    /// Returns the names of all triggers defined on a table.
    async fn get_triggers(&mut self, schema: &str, table: &str) -> Result<Vec<String>>;

    /// Returns engine, default character set and collation of a table.
    async fn get_table_options(&mut self, schema: &str, table: &str) -> Result<TableOptions>;

    /// Executes a statement that returns no rows.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Takes an exclusive write lock on a table.
    async fn lock_table_write(&mut self, schema: &str, table: &str) -> Result<()>;

    /// Releases every table lock held by the session.
    async fn unlock_all(&mut self) -> Result<()>;
}
