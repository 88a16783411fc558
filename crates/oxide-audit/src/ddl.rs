//! DDL generation for audit tables.
//!
//! Audit tables are only ever created or extended. Columns that disappear
//! from a data table stay in its audit table so that recorded history
//! remains readable; this module therefore has no DROP COLUMN counterpart.

use crate::schema::{Column, ColumnPosition, ColumnSet, TableOptions};

/// Statement releasing all table locks of the session.
pub const UNLOCK_TABLES_SQL: &str = "UNLOCK TABLES";

/// Quotes an identifier with backticks, doubling embedded backticks.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Returns `` `schema`.`table` ``.
#[must_use]
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

/// MySQL DDL generator.
#[derive(Debug, Clone, Default)]
pub struct DdlGenerator;

impl DdlGenerator {
    /// Creates a new DDL generator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generates a column clause: name, type, charset/collation, nullability.
    #[must_use]
    pub fn column_definition(&self, column: &Column) -> String {
        let mut parts = vec![quote_identifier(&column.name), column.column_type.clone()];

        if let Some(ref charset) = column.character_set {
            parts.push(format!("CHARACTER SET {charset}"));
        }
        if let Some(ref collation) = column.collation {
            parts.push(format!("COLLATE {collation}"));
        }

        parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());
        parts.join(" ")
    }

    /// Generates `CREATE TABLE` with one clause per column in set order.
    ///
    /// `options` are usually those of the data table so that the audit table
    /// shares its engine and default character set.
    #[must_use]
    pub fn create_table(
        &self,
        schema: &str,
        table: &str,
        columns: &ColumnSet,
        options: &TableOptions,
    ) -> String {
        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(&qualified_name(schema, table));
        sql.push_str(" (\n  ");

        let col_defs: Vec<String> = columns.iter().map(|c| self.column_definition(c)).collect();
        sql.push_str(&col_defs.join(",\n  "));
        sql.push_str("\n)");

        if let Some(ref engine) = options.engine {
            sql.push_str(&format!(" ENGINE={engine}"));
        }
        if let Some(ref charset) = options.character_set {
            sql.push_str(&format!(" DEFAULT CHARSET={charset}"));
        }
        if let Some(ref collation) = options.collation {
            sql.push_str(&format!(" COLLATE={collation}"));
        }
        sql
    }

    /// Generates a single `ALTER TABLE` adding every column of `new_columns`.
    ///
    /// Placement follows `target`, the authoritative order, since the audit
    /// table may itself be missing some of the predecessors. Columns are
    /// added in target order so every `AFTER` refers to a column that exists
    /// by the time the clause is applied.
    ///
    /// If an added column uses a character set other than the audit table's
    /// default, a second statement realigns the audit table's default with
    /// the data table's.
    #[must_use]
    pub fn add_columns(
        &self,
        schema: &str,
        table: &str,
        new_columns: &ColumnSet,
        target: &ColumnSet,
        audit_options: &TableOptions,
        data_options: &TableOptions,
    ) -> Vec<String> {
        let clauses: Vec<String> = target
            .iter()
            .filter(|c| new_columns.contains(&c.name))
            .map(|c| {
                let position = target.position_of(&c.name).unwrap_or(ColumnPosition::First);
                format!(
                    "ADD COLUMN {} {}",
                    self.column_definition(c),
                    self.position_sql(&position)
                )
            })
            .collect();

        if clauses.is_empty() {
            return Vec::new();
        }

        let qualified = qualified_name(schema, table);
        let mut statements = vec![format!("ALTER TABLE {} {}", qualified, clauses.join(", "))];

        let foreign_charset = new_columns.iter().find_map(|c| {
            c.character_set
                .as_ref()
                .filter(|cs| audit_options.character_set.as_ref() != Some(*cs))
        });

        if let Some(column_charset) = foreign_charset {
            let charset = data_options.character_set.as_ref().unwrap_or(column_charset);
            let mut sql = format!("ALTER TABLE {qualified} DEFAULT CHARACTER SET {charset}");
            if let Some(ref collation) = data_options.collation {
                sql.push_str(&format!(" COLLATE {collation}"));
            }
            statements.push(sql);
        }

        statements
    }

    /// Generates `MODIFY COLUMN` statements describing type drift.
    ///
    /// These are reported for review and never executed automatically.
    /// Audit columns stay nullable, whatever the data column says.
    #[must_use]
    pub fn modify_columns(&self, schema: &str, table: &str, altered: &ColumnSet) -> Vec<String> {
        let qualified = qualified_name(schema, table);
        altered
            .iter()
            .map(|c| {
                let mut column = c.clone();
                column.nullable = true;
                format!(
                    "ALTER TABLE {} MODIFY COLUMN {}",
                    qualified,
                    self.column_definition(&column)
                )
            })
            .collect()
    }

    /// Generates `DROP TABLE IF EXISTS`.
    #[must_use]
    pub fn drop_table(&self, schema: &str, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", qualified_name(schema, table))
    }

    /// Generates `LOCK TABLES ... WRITE`.
    #[must_use]
    pub fn lock_table_write(&self, schema: &str, table: &str) -> String {
        format!("LOCK TABLES {} WRITE", qualified_name(schema, table))
    }

    fn position_sql(&self, position: &ColumnPosition) -> String {
        match position {
            ColumnPosition::First => "FIRST".to_string(),
            ColumnPosition::After(name) => format!("AFTER {}", quote_identifier(name)),
        }
    }
}
