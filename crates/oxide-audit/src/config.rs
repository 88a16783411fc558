//! Configuration file.
//!
//! The configuration names the data and audit schemas, declares the audit
//! columns every audit table carries, and remembers, per table, the data
//! columns seen at the last clean synchronization. That remembered snapshot
//! is the third input of the reconciler.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::report::SyncReport;
use crate::schema::{ColumnSet, ValueBinding};
use crate::trigger::DEFAULT_TRIGGER_NAME;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "oxide-audit.json";

/// A user-declared audit column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditColumnSpec {
    /// Column name.
    pub name: String,
    /// Type as the user wrote it; canonicalized through the database.
    #[serde(rename = "type")]
    pub column_type: String,
    /// Where the trigger takes the value from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueBinding>,
}

impl AuditColumnSpec {
    /// Creates a column declaration.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        column_type: impl Into<String>,
        value: ValueBinding,
    ) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            value: Some(value),
        }
    }
}

/// Per-table settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Whether the table is audited.
    #[serde(default)]
    pub audit: bool,
    /// Overrides the global skip variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_variable: Option<String>,
    /// Data columns recorded at the last clean synchronization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<ColumnSet>,
    /// When the snapshot was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
}

impl TableConfig {
    /// An audited table without a recorded snapshot.
    #[must_use]
    pub fn audited() -> Self {
        Self {
            audit: true,
            ..Self::default()
        }
    }
}

fn default_trigger_name() -> String {
    DEFAULT_TRIGGER_NAME.to_string()
}

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Schema holding the data tables.
    pub data_schema: String,
    /// Schema holding the audit tables.
    pub audit_schema: String,
    /// Session variable that suppresses auditing when non-NULL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_variable: Option<String>,
    /// Trigger name template.
    #[serde(default = "default_trigger_name")]
    pub trigger_name: String,
    /// Statements copied verbatim at the start of each trigger body.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_sql: Vec<String>,
    /// Audit columns, in the order they lead each audit table.
    #[serde(default)]
    pub audit_columns: Vec<AuditColumnSpec>,
    /// Per-table settings keyed by table name.
    #[serde(default)]
    pub tables: BTreeMap<String, TableConfig>,
}

impl AuditConfig {
    /// Creates a configuration with the default audit columns and no tables.
    #[must_use]
    pub fn new(data_schema: impl Into<String>, audit_schema: impl Into<String>) -> Self {
        Self {
            data_schema: data_schema.into(),
            audit_schema: audit_schema.into(),
            skip_variable: None,
            trigger_name: default_trigger_name(),
            additional_sql: Vec::new(),
            audit_columns: Self::default_audit_columns(),
            tables: BTreeMap::new(),
        }
    }

    /// The audit columns written by `init`.
    #[must_use]
    pub fn default_audit_columns() -> Vec<AuditColumnSpec> {
        vec![
            AuditColumnSpec::new(
                "audit_action",
                "enum('INSERT','UPDATE','DELETE') NOT NULL",
                ValueBinding::Action,
            ),
            AuditColumnSpec::new("audit_state", "enum('OLD','NEW') NOT NULL", ValueBinding::State),
            AuditColumnSpec::new(
                "audit_timestamp",
                "timestamp(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)",
                ValueBinding::Expression {
                    sql: "CURRENT_TIMESTAMP(6)".to_string(),
                },
            ),
            AuditColumnSpec::new(
                "audit_user",
                "varchar(255)",
                ValueBinding::Expression {
                    sql: "CURRENT_USER()".to_string(),
                },
            ),
        ]
    }

    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| AuditError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Checks the configuration before anything touches the database.
    pub fn validate(&self) -> Result<()> {
        if self.data_schema.is_empty() || self.audit_schema.is_empty() {
            return Err(AuditError::InvalidConfig(
                "data_schema and audit_schema must be set".to_string(),
            ));
        }
        if self.data_schema == self.audit_schema {
            return Err(AuditError::InvalidConfig(format!(
                "data_schema and audit_schema must differ (both are '{}')",
                self.data_schema
            )));
        }
        if !self.trigger_name.contains("{table}") || !self.trigger_name.contains("{action}") {
            return Err(AuditError::InvalidConfig(format!(
                "trigger_name '{}' must contain {{table}} and {{action}}",
                self.trigger_name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.audit_columns {
            if !seen.insert(column.name.as_str()) {
                return Err(AuditError::InvalidConfig(format!(
                    "audit column '{}' is declared twice",
                    column.name
                )));
            }
            if column.value.is_none() {
                return Err(AuditError::MissingValueBinding {
                    column: column.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Skip variable for a table: its own override, else the global one.
    #[must_use]
    pub fn skip_variable_for(&self, table: &str) -> Option<&str> {
        self.tables
            .get(table)
            .and_then(|t| t.skip_variable.as_deref())
            .or(self.skip_variable.as_deref())
    }

    /// Stores the snapshots of every clean table in `report`. Returns the
    /// number of tables updated.
    pub fn apply_snapshots(&mut self, report: &SyncReport, now: DateTime<Utc>) -> usize {
        let mut updated = 0;
        for (table, columns) in report.snapshots() {
            let entry = self
                .tables
                .entry(table.to_string())
                .or_insert_with(TableConfig::audited);
            entry.columns = Some(columns.clone());
            entry.last_synced = Some(now);
            updated += 1;
        }
        updated
    }
}
