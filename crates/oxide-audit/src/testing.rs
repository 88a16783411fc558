//! In-memory [`AuditDatabase`] used by unit tests.
//!
//! It interprets the statements this crate generates (CREATE/DROP TABLE,
//! ADD COLUMN, CREATE/DROP TRIGGER) closely enough to observe their effect,
//! and normalizes a few types the way MySQL 5.7 reports them.

use std::collections::BTreeMap;

use crate::database::AuditDatabase;
use crate::ddl::{DdlGenerator, UNLOCK_TABLES_SQL};
use crate::error::{AuditError, Result};
use crate::schema::{Column, ColumnSet, TableOptions};

type TableKey = (String, String);

fn key(schema: &str, table: &str) -> TableKey {
    (schema.to_string(), table.to_string())
}

fn injected(sql: &str) -> AuditError {
    AuditError::Statement {
        sql: sql.to_string(),
        source: sqlx::Error::Protocol("injected failure".to_string()),
    }
}

/// Returns the identifiers quoted with backticks in `sql`, in order.
fn identifiers(sql: &str) -> Vec<String> {
    sql.split('`')
        .skip(1)
        .step_by(2)
        .map(str::to_string)
        .collect()
}

fn canonical_type(user_type: &str) -> String {
    let lower = user_type.trim().to_ascii_lowercase();
    match lower.as_str() {
        "int" | "integer" => "int(11)".to_string(),
        "int unsigned" => "int(10) unsigned".to_string(),
        "tinyint" => "tinyint(4)".to_string(),
        "bigint" => "bigint(20)".to_string(),
        "bool" | "boolean" => "tinyint(1)".to_string(),
        _ => user_type.trim().to_string(),
    }
}

fn is_character_type(column_type: &str) -> bool {
    let lower = column_type.to_ascii_lowercase();
    ["varchar", "char", "text", "enum", "set"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Parses "`name` type [CHARACTER SET cs] [COLLATE coll] [NULL|NOT NULL]".
fn parse_column(definition: &str) -> Column {
    let definition = definition.trim().trim_end_matches(',');
    let name = identifiers(definition).remove(0);
    let mut rest = definition
        .splitn(3, '`')
        .nth(2)
        .unwrap_or_default()
        .trim()
        .to_string();

    let mut nullable = true;
    if rest.to_ascii_uppercase().ends_with(" NOT NULL") {
        rest.truncate(rest.len() - " NOT NULL".len());
        nullable = false;
    } else if rest.to_ascii_uppercase().ends_with(" NULL") {
        rest.truncate(rest.len() - " NULL".len());
    }

    let (type_part, charset_part) = match rest.split_once(" CHARACTER SET ") {
        Some((ty, cs)) => (ty.to_string(), Some(cs.to_string())),
        None => (rest.clone(), None),
    };

    let column_type = canonical_type(&type_part);
    let mut column = Column::new(name, column_type.clone());
    column.nullable = nullable;

    match charset_part {
        Some(cs) => {
            let (charset, collation) = match cs.split_once(" COLLATE ") {
                Some((charset, collation)) => (charset.to_string(), collation.to_string()),
                None => (cs.clone(), format!("{cs}_general_ci")),
            };
            column.character_set = Some(charset);
            column.collation = Some(collation);
        }
        None if is_character_type(&column_type) => {
            column.character_set = Some("utf8mb4".to_string());
            column.collation = Some("utf8mb4_general_ci".to_string());
        }
        None => {}
    }
    column
}

/// In-memory database session.
#[derive(Debug, Default)]
pub struct MockDatabase {
    pub tables: BTreeMap<TableKey, ColumnSet>,
    pub options: BTreeMap<TableKey, TableOptions>,
    pub triggers: BTreeMap<TableKey, Vec<String>>,
    /// Every statement executed, plus lock/unlock markers, in order.
    pub log: Vec<String>,
    pub locked: Option<TableKey>,
    /// Statements containing this text fail.
    pub fail_on: Option<String>,
    pub fail_lock: bool,
    pub fail_unlock: bool,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, schema: &str, table: &str, columns: ColumnSet) -> Self {
        self.tables.insert(key(schema, table), columns);
        self.options.insert(
            key(schema, table),
            TableOptions {
                engine: Some("InnoDB".to_string()),
                character_set: Some("utf8mb4".to_string()),
                collation: Some("utf8mb4_general_ci".to_string()),
            },
        );
        self
    }

    pub fn with_trigger(mut self, schema: &str, table: &str, name: &str) -> Self {
        self.triggers
            .entry(key(schema, table))
            .or_default()
            .push(name.to_string());
        self
    }

    pub fn columns(&self, schema: &str, table: &str) -> Option<&ColumnSet> {
        self.tables.get(&key(schema, table))
    }

    pub fn trigger_names(&self, schema: &str, table: &str) -> Vec<String> {
        self.triggers
            .get(&key(schema, table))
            .cloned()
            .unwrap_or_default()
    }

    /// Statements executed (excluding lock markers) that start with `prefix`.
    pub fn executed(&self, prefix: &str) -> Vec<&str> {
        self.log
            .iter()
            .filter(|s| s.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    fn apply(&mut self, sql: &str) {
        let ids = identifiers(sql);
        if sql.starts_with("CREATE TABLE") {
            let columns: ColumnSet = sql
                .lines()
                .skip(1)
                .filter(|line| line.trim_start().starts_with('`'))
                .map(parse_column)
                .collect();
            self.tables.insert(key(&ids[0], &ids[1]), columns);
            self.options.insert(key(&ids[0], &ids[1]), TableOptions::default());
        } else if sql.starts_with("DROP TABLE") {
            self.tables.remove(&key(&ids[0], &ids[1]));
            self.options.remove(&key(&ids[0], &ids[1]));
        } else if sql.starts_with("ALTER TABLE") && sql.contains(" ADD COLUMN ") {
            let table = key(&ids[0], &ids[1]);
            let body = sql.split_once(" ADD COLUMN ").map(|(_, b)| b).unwrap_or_default();
            for clause in body.split(", ADD COLUMN ") {
                let (definition, after) = match clause.rsplit_once(" AFTER ") {
                    Some((def, after)) => (def, Some(identifiers(after).remove(0))),
                    None => (clause.trim_end_matches(" FIRST"), None),
                };
                let column = parse_column(definition);
                let existing: Vec<Column> = self
                    .tables
                    .get(&table)
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .collect();
                let idx = match after {
                    Some(ref name) => existing
                        .iter()
                        .position(|c| &c.name == name)
                        .map_or(existing.len(), |i| i + 1),
                    None => 0,
                };
                let mut reordered = existing;
                reordered.insert(idx, column);
                self.tables.insert(table.clone(), reordered.into());
            }
        } else if sql.starts_with("ALTER TABLE") && sql.contains(" DEFAULT CHARACTER SET ") {
            let charset = sql
                .split(" DEFAULT CHARACTER SET ")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .map(str::to_string);
            self.options
                .entry(key(&ids[0], &ids[1]))
                .or_default()
                .character_set = charset;
        } else if sql.starts_with("CREATE TRIGGER") {
            // `schema`.`name` AFTER ... ON `schema`.`table`
            self.triggers
                .entry(key(&ids[2], &ids[3]))
                .or_default()
                .push(ids[1].clone());
        } else if sql.starts_with("DROP TRIGGER") {
            for (table, names) in &mut self.triggers {
                if table.0 == ids[0] {
                    names.retain(|n| n != &ids[1]);
                }
            }
        }
    }
}

impl AuditDatabase for MockDatabase {
    async fn list_tables(&mut self, schema: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .keys()
            .filter(|(s, _)| s == schema)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn get_columns(&mut self, schema: &str, table: &str) -> Result<ColumnSet> {
        Ok(self.tables.get(&key(schema, table)).cloned().unwrap_or_default())
    }

    async fn get_triggers(&mut self, schema: &str, table: &str) -> Result<Vec<String>> {
        Ok(self.trigger_names(schema, table))
    }

    async fn get_table_options(&mut self, schema: &str, table: &str) -> Result<TableOptions> {
        self.options
            .get(&key(schema, table))
            .cloned()
            .ok_or_else(|| AuditError::TableNotFound {
                schema: schema.to_string(),
                table: table.to_string(),
            })
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        if let Some(ref needle) = self.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(injected(sql));
            }
        }
        self.log.push(sql.to_string());
        self.apply(sql);
        Ok(())
    }

    async fn lock_table_write(&mut self, schema: &str, table: &str) -> Result<()> {
        let sql = DdlGenerator::new().lock_table_write(schema, table);
        if self.fail_lock {
            return Err(injected(&sql));
        }
        self.log.push(sql);
        self.locked = Some(key(schema, table));
        Ok(())
    }

    async fn unlock_all(&mut self) -> Result<()> {
        if self.fail_unlock {
            return Err(injected(UNLOCK_TABLES_SQL));
        }
        self.log.push(UNLOCK_TABLES_SQL.to_string());
        self.locked = None;
        Ok(())
    }
}
