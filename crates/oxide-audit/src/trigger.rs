//! History trigger generation.
//!
//! Each audited table gets one `AFTER` trigger per action. The trigger copies
//! the affected row into the audit table together with the audit columns,
//! whose values come from their [`ValueBinding`].

use std::fmt;

use crate::ddl::{qualified_name, quote_identifier};
use crate::error::{AuditError, Result};
use crate::schema::{Column, ColumnSet, ValueBinding};

/// Default trigger name template.
pub const DEFAULT_TRIGGER_NAME: &str = "{table}_audit_{action}";

/// Row image a trigger can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// The row after the statement.
    New,
    /// The row before the statement.
    Old,
}

impl RowState {
    /// Returns the SQL keyword.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Old => "OLD",
        }
    }
}

/// Statement type a trigger fires on.
///
/// The set is closed: every audited table gets exactly these three
/// triggers, so there is no way to ask for any other action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerAction {
    /// `INSERT`.
    Insert,
    /// `UPDATE`.
    Update,
    /// `DELETE`.
    Delete,
}

impl TriggerAction {
    /// All actions, in the order triggers are created.
    pub const ALL: [Self; 3] = [Self::Insert, Self::Update, Self::Delete];

    /// Returns the SQL keyword.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Row images recorded for this action. Updates record the old image
    /// first.
    #[must_use]
    pub fn row_states(&self) -> &'static [RowState] {
        match self {
            Self::Insert => &[RowState::New],
            Self::Update => &[RowState::Old, RowState::New],
            Self::Delete => &[RowState::Old],
        }
    }
}

impl fmt::Display for TriggerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Checks that every audit column has a value binding.
pub fn validate_bindings(audit_columns: &ColumnSet) -> Result<()> {
    match audit_columns.iter().find(|c| c.value.is_none()) {
        Some(column) => Err(AuditError::MissingValueBinding {
            column: column.name.clone(),
        }),
        None => Ok(()),
    }
}

/// Resolves the SQL value of an audit column for one row image.
fn audit_value(column: &Column, action: TriggerAction, state: RowState) -> Result<String> {
    match &column.value {
        Some(ValueBinding::Action) => Ok(format!("'{}'", action.as_sql())),
        Some(ValueBinding::State) => Ok(format!("'{}'", state.as_sql())),
        Some(ValueBinding::Expression { sql }) => Ok(sql.clone()),
        None => Err(AuditError::MissingValueBinding {
            column: column.name.clone(),
        }),
    }
}

/// A generated trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDefinition {
    /// Trigger name (unqualified).
    pub name: String,
    /// Action the trigger fires on.
    pub action: TriggerAction,
    /// Full `CREATE TRIGGER` statement.
    pub sql: String,
}

/// Generates history triggers for one data/audit schema pair.
#[derive(Debug, Clone)]
pub struct TriggerGenerator {
    data_schema: String,
    audit_schema: String,
    name_template: String,
}

impl TriggerGenerator {
    /// Creates a generator using the default name template.
    #[must_use]
    pub fn new(data_schema: impl Into<String>, audit_schema: impl Into<String>) -> Self {
        Self {
            data_schema: data_schema.into(),
            audit_schema: audit_schema.into(),
            name_template: DEFAULT_TRIGGER_NAME.to_string(),
        }
    }

    /// Sets the trigger name template (`{table}` and `{action}` are
    /// substituted, the action in lower case).
    #[must_use]
    pub fn name_template(mut self, template: impl Into<String>) -> Self {
        self.name_template = template.into();
        self
    }

    /// Returns the trigger name for a table and action.
    #[must_use]
    pub fn trigger_name(&self, table: &str, action: TriggerAction) -> String {
        self.name_template
            .replace("{table}", table)
            .replace("{action}", &action.as_sql().to_ascii_lowercase())
    }

    /// Generates `DROP TRIGGER IF EXISTS` for a trigger of the data schema.
    #[must_use]
    pub fn drop_trigger(&self, name: &str) -> String {
        format!(
            "DROP TRIGGER IF EXISTS {}",
            qualified_name(&self.data_schema, name)
        )
    }

    /// Generates the `CREATE TRIGGER` statement for one action.
    ///
    /// The skip guard wraps the body in `IF (<skip> IS NULL)` so application
    /// code can suppress auditing by setting that session variable.
    /// `additional_sql` lines run before the inserts and are copied verbatim.
    pub fn build_trigger(
        &self,
        table: &str,
        action: TriggerAction,
        audit_columns: &ColumnSet,
        data_columns: &ColumnSet,
        skip_variable: Option<&str>,
        additional_sql: &[String],
    ) -> Result<String> {
        let mut inserts = Vec::new();
        for &state in action.row_states() {
            inserts.push(self.insert_statement(
                table,
                action,
                state,
                audit_columns,
                data_columns,
            )?);
        }

        let mut sql = format!(
            "CREATE TRIGGER {} AFTER {} ON {}\nFOR EACH ROW\nBEGIN\n",
            qualified_name(&self.data_schema, &self.trigger_name(table, action)),
            action.as_sql(),
            qualified_name(&self.data_schema, table),
        );

        let indent = if skip_variable.is_some() { "    " } else { "  " };
        if let Some(skip) = skip_variable {
            sql.push_str(&format!("  IF ({skip} IS NULL) THEN\n"));
        }
        for line in additional_sql {
            sql.push_str(indent);
            sql.push_str(line);
            sql.push('\n');
        }
        for insert in &inserts {
            sql.push_str(indent);
            sql.push_str(insert);
            sql.push('\n');
        }
        if skip_variable.is_some() {
            sql.push_str("  END IF;\n");
        }
        sql.push_str("END");

        Ok(sql)
    }

    /// Generates the triggers for every action of a table.
    pub fn build_all(
        &self,
        table: &str,
        audit_columns: &ColumnSet,
        data_columns: &ColumnSet,
        skip_variable: Option<&str>,
        additional_sql: &[String],
    ) -> Result<Vec<TriggerDefinition>> {
        TriggerAction::ALL
            .iter()
            .map(|&action| {
                Ok(TriggerDefinition {
                    name: self.trigger_name(table, action),
                    action,
                    sql: self.build_trigger(
                        table,
                        action,
                        audit_columns,
                        data_columns,
                        skip_variable,
                        additional_sql,
                    )?,
                })
            })
            .collect()
    }

    fn insert_statement(
        &self,
        table: &str,
        action: TriggerAction,
        state: RowState,
        audit_columns: &ColumnSet,
        data_columns: &ColumnSet,
    ) -> Result<String> {
        let mut names = Vec::with_capacity(audit_columns.len() + data_columns.len());
        let mut values = Vec::with_capacity(names.capacity());

        for column in audit_columns {
            names.push(quote_identifier(&column.name));
            values.push(audit_value(column, action, state)?);
        }
        for column in data_columns {
            let quoted = quote_identifier(&column.name);
            values.push(format!("{}.{}", state.as_sql(), quoted));
            names.push(quoted);
        }

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({});",
            qualified_name(&self.audit_schema, table),
            names.join(", "),
            values.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> TriggerGenerator {
        TriggerGenerator::new("app", "app_audit")
    }

    fn audit_columns() -> ColumnSet {
        ColumnSet::new()
            .column(Column::new("audit_action", "varchar(6)").bind(ValueBinding::Action))
            .column(Column::new("audit_state", "varchar(3)").bind(ValueBinding::State))
            .column(Column::new("audit_at", "datetime").bind(ValueBinding::Expression {
                sql: "NOW()".to_string(),
            }))
    }

    fn data_columns() -> ColumnSet {
        ColumnSet::new()
            .column(Column::new("id", "int(11)"))
            .column(Column::new("name", "varchar(20)"))
    }

    #[test]
    fn test_insert_trigger_with_guard() {
        let sql = generator()
            .build_trigger(
                "users",
                TriggerAction::Insert,
                &audit_columns(),
                &data_columns(),
                Some("@audit_skip"),
                &["SET @audit_user = CURRENT_USER();".to_string()],
            )
            .unwrap();

        assert_eq!(
            sql,
            "CREATE TRIGGER `app`.`users_audit_insert` AFTER INSERT ON `app`.`users`\n\
             FOR EACH ROW\n\
             BEGIN\n  \
             IF (@audit_skip IS NULL) THEN\n    \
             SET @audit_user = CURRENT_USER();\n    \
             INSERT INTO `app_audit`.`users` \
             (`audit_action`, `audit_state`, `audit_at`, `id`, `name`) \
             VALUES ('INSERT', 'NEW', NOW(), NEW.`id`, NEW.`name`);\n  \
             END IF;\n\
             END"
        );
    }

    #[test]
    fn test_delete_trigger_without_guard() {
        let sql = generator()
            .build_trigger(
                "users",
                TriggerAction::Delete,
                &audit_columns(),
                &data_columns(),
                None,
                &[],
            )
            .unwrap();

        assert!(!sql.contains("IF ("));
        assert!(!sql.contains("END IF"));
        assert!(sql.contains("VALUES ('DELETE', 'OLD', NOW(), OLD.`id`, OLD.`name`);"));
        assert!(!sql.contains("NEW"));
    }

    #[test]
    fn test_update_records_old_then_new() {
        let sql = generator()
            .build_trigger(
                "users",
                TriggerAction::Update,
                &audit_columns(),
                &data_columns(),
                None,
                &[],
            )
            .unwrap();

        let old = sql.find("'OLD', NOW(), OLD.`id`").unwrap();
        let new = sql.find("'NEW', NOW(), NEW.`id`").unwrap();
        assert!(old < new);
        assert_eq!(sql.matches("INSERT INTO").count(), 2);
    }

    #[test]
    fn test_row_state_references_match_action() {
        for action in TriggerAction::ALL {
            let sql = generator()
                .build_trigger("t", action, &audit_columns(), &data_columns(), None, &[])
                .unwrap();
            let states = action.row_states();
            for state in [RowState::New, RowState::Old] {
                let referenced = sql.contains(&format!("{}.`", state.as_sql()));
                assert_eq!(referenced, states.contains(&state), "{action} / {state:?}");
            }
        }
    }

    #[test]
    fn test_missing_binding_fails_fast() {
        let audit = audit_columns().column(Column::new("audit_user", "varchar(64)"));

        let result = generator().build_trigger(
            "users",
            TriggerAction::Insert,
            &audit,
            &data_columns(),
            None,
            &[],
        );
        assert!(matches!(
            result,
            Err(AuditError::MissingValueBinding { ref column }) if column == "audit_user"
        ));
        assert!(validate_bindings(&audit).is_err());
        assert!(validate_bindings(&audit_columns()).is_ok());
    }

    #[test]
    fn test_names_and_drop() {
        let custom = generator().name_template("trg_{action}_{table}");
        assert_eq!(custom.trigger_name("users", TriggerAction::Update), "trg_update_users");

        let all = generator()
            .build_all("users", &audit_columns(), &data_columns(), None, &[])
            .unwrap();
        let names: Vec<&str> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["users_audit_insert", "users_audit_update", "users_audit_delete"]
        );
        assert_eq!(
            generator().drop_trigger("users_audit_insert"),
            "DROP TRIGGER IF EXISTS `app`.`users_audit_insert`"
        );
    }
}
