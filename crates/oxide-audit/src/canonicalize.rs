//! Canonical types for declared audit columns.
//!
//! Audit columns are declared with whatever type spelling the user prefers
//! (`int`, `tinyint`, `varchar(64)`), but they are compared against the
//! engine's own `COLUMN_TYPE` output (`int(11)`, `tinyint(4)`, with the
//! default charset attached). Rather than re-implementing that normalization,
//! the declared columns are created in a throwaway table and read back.

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::AuditColumnSpec;
use crate::database::AuditDatabase;
use crate::ddl::{qualified_name, quote_identifier, DdlGenerator};
use crate::error::{AuditError, Result};
use crate::schema::ColumnSet;

/// Name of the scratch table for this process.
fn scratch_table_name() -> String {
    format!(
        "_oxide_audit_scratch_{}_{}",
        std::process::id(),
        Utc::now().timestamp_millis()
    )
}

/// `CREATE TABLE` for the scratch table, one declared column per line.
fn scratch_table_sql(schema: &str, table: &str, specs: &[AuditColumnSpec]) -> String {
    let col_defs: Vec<String> = specs
        .iter()
        .map(|spec| format!("{} {}", quote_identifier(&spec.name), spec.column_type))
        .collect();
    format!(
        "CREATE TABLE {} (\n  {}\n)",
        qualified_name(schema, table),
        col_defs.join(",\n  ")
    )
}

async fn create_and_read<D: AuditDatabase>(
    db: &mut D,
    schema: &str,
    table: &str,
    specs: &[AuditColumnSpec],
) -> Result<ColumnSet> {
    db.execute(&scratch_table_sql(schema, table, specs)).await?;
    db.get_columns(schema, table).await
}

/// Returns the canonical form of the declared audit columns, in declaration
/// order, each carrying its value binding.
///
/// The scratch table lives in `schema` and is dropped on every path, also
/// when creating or reading it failed. Any failure is reported as
/// [`AuditError::Canonicalization`].
pub async fn canonicalize<D: AuditDatabase>(
    db: &mut D,
    schema: &str,
    specs: &[AuditColumnSpec],
) -> Result<ColumnSet> {
    if specs.is_empty() {
        return Ok(ColumnSet::new());
    }

    let scratch = scratch_table_name();
    debug!(schema = %schema, table = %scratch, "Canonicalizing audit columns");

    let read = create_and_read(db, schema, &scratch, specs).await;
    let dropped = db.execute(&DdlGenerator::new().drop_table(schema, &scratch)).await;

    let live = match (read, dropped) {
        (Ok(live), Ok(())) => live,
        (Err(err), dropped) => {
            if let Err(drop_err) = dropped {
                warn!(table = %scratch, error = %drop_err, "Failed to drop scratch table");
            }
            return Err(AuditError::Canonicalization(Box::new(err)));
        }
        (Ok(_), Err(drop_err)) => return Err(AuditError::Canonicalization(Box::new(drop_err))),
    };

    let mut canonical = ColumnSet::new();
    for spec in specs {
        let mut column = live.get(&spec.name).cloned().ok_or_else(|| {
            AuditError::Canonicalization(Box::new(AuditError::InvalidConfig(format!(
                "audit column '{}' was not reported back by the database",
                spec.name
            ))))
        })?;
        column.value = spec.value.clone();
        debug!(
            column = %column.name,
            declared = %spec.column_type,
            canonical = %column.column_type,
            "Canonical audit column"
        );
        canonical.insert(column);
    }
    Ok(canonical)
}
