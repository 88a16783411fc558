//! Synchronization executor.
//!
//! This module drives a run: canonicalize the audit columns once, then
//! reconcile and update each configured table in turn, over a single
//! database session.
//!
//! Triggers are replaced under `LOCK TABLES ... WRITE` on the data table, so
//! no write can land between dropping the old triggers and creating the new
//! ones. If creating a trigger fails, the ones already created in that swap
//! are dropped again: the table ends up with no triggers rather than a
//! partial set.

use tracing::{debug, error, info, warn};

use crate::canonicalize::canonicalize;
use crate::config::{AuditConfig, TableConfig};
use crate::database::AuditDatabase;
use crate::ddl::{DdlGenerator, UNLOCK_TABLES_SQL};
use crate::error::{AuditError, Result};
use crate::reconcile::{reconcile, Decision};
use crate::report::{AlteredColumn, SyncReport, TableOutcome, TableReport};
use crate::schema::ColumnSet;
use crate::trigger::{validate_bindings, TriggerDefinition, TriggerGenerator};

/// Per-run state shared by every table.
struct RunContext<'a> {
    config: &'a AuditConfig,
    audit_columns: ColumnSet,
    audit_tables: Vec<String>,
    triggers: TriggerGenerator,
}

/// Synchronizes audit tables and triggers against a database.
pub struct AuditExecutor<D: AuditDatabase> {
    db: D,
    ddl: DdlGenerator,
    dry_run: bool,
}

impl<D: AuditDatabase> AuditExecutor<D> {
    /// Creates a new executor.
    pub fn new(db: D) -> Self {
        Self {
            db,
            ddl: DdlGenerator::new(),
            dry_run: false,
        }
    }

    /// Enables dry-run mode: metadata is read and the audit-column scratch
    /// table is still created, but no DDL or trigger statement is executed.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the database.
    #[must_use]
    pub fn database(&self) -> &D {
        &self.db
    }

    /// Consumes the executor and returns the database.
    pub fn into_database(self) -> D {
        self.db
    }

    /// Runs one synchronization pass over every table of the data schema.
    ///
    /// Configuration errors and canonicalization failures abort the run.
    /// Conflicts and per-table failures are recorded in the report and the
    /// run moves on to the next table.
    pub async fn run(&mut self, config: &AuditConfig) -> Result<SyncReport> {
        config.validate()?;

        let audit_columns =
            canonicalize(&mut self.db, &config.audit_schema, &config.audit_columns).await?;
        validate_bindings(&audit_columns)?;

        let data_tables = self.db.list_tables(&config.data_schema).await?;
        let audit_tables = self.db.list_tables(&config.audit_schema).await?;

        let ctx = RunContext {
            config,
            audit_columns,
            audit_tables,
            triggers: TriggerGenerator::new(&config.data_schema, &config.audit_schema)
                .name_template(&config.trigger_name),
        };

        info!(
            data_schema = %config.data_schema,
            audit_schema = %config.audit_schema,
            tables = data_tables.len(),
            dry_run = self.dry_run,
            "Starting audit synchronization"
        );

        let mut report = SyncReport::default();

        for table in &data_tables {
            let table_config = match config.tables.get(table) {
                None => {
                    debug!(table = %table, "Table not configured, skipping");
                    report
                        .tables
                        .push(TableReport::with_outcome(table, TableOutcome::Untracked));
                    continue;
                }
                Some(tc) if !tc.audit => {
                    debug!(table = %table, "Auditing disabled, skipping");
                    report
                        .tables
                        .push(TableReport::with_outcome(table, TableOutcome::Disabled));
                    continue;
                }
                Some(tc) => tc,
            };

            let mut table_report = TableReport::new(table);
            if let Err(err) = self
                .sync_table(&ctx, table, table_config, &mut table_report)
                .await
            {
                error!(table = %table, error = %err, "Table synchronization failed");
                table_report.outcome = TableOutcome::Failed(err.to_string());
                table_report.snapshot = None;
            }
            report.tables.push(table_report);
        }

        for (table, table_config) in &config.tables {
            if table_config.audit && !data_tables.contains(table) {
                warn!(table = %table, "Configured table not found in data schema");
                report
                    .tables
                    .push(TableReport::with_outcome(table, TableOutcome::Missing));
            }
        }

        info!(
            tables = report.tables.len(),
            conflicts = report.conflicts().count(),
            failures = report.failures().count(),
            "Audit synchronization finished"
        );

        Ok(report)
    }

    /// Reconciles and updates one table, filling in `report`.
    async fn sync_table(
        &mut self,
        ctx: &RunContext<'_>,
        table: &str,
        table_config: &TableConfig,
        report: &mut TableReport,
    ) -> Result<()> {
        let config = ctx.config;
        let data_live = self.db.get_columns(&config.data_schema, table).await?;
        let audit_exists = ctx.audit_tables.iter().any(|t| t == table);
        let audit_live = if audit_exists {
            self.db.get_columns(&config.audit_schema, table).await?
        } else {
            ColumnSet::new()
        };
        let recorded = table_config.columns.as_ref();

        let rec = reconcile(&data_live, &audit_live, &ctx.audit_columns, recorded);

        report.new_columns = rec.new_columns.names().map(str::to_string).collect();
        report.obsolete_columns = rec.obsolete_columns.names().map(str::to_string).collect();
        report.altered_columns = rec
            .altered_columns
            .iter()
            .filter_map(|current| {
                recorded
                    .and_then(|r| r.get(&current.name))
                    .map(|previous| AlteredColumn {
                        previous: previous.clone(),
                        current: current.clone(),
                    })
            })
            .collect();

        for name in &report.new_columns {
            info!(table = %table, column = %name, "New audit column");
        }
        for name in &report.obsolete_columns {
            warn!(table = %table, column = %name, "Obsolete column kept in audit table");
        }
        for altered in &report.altered_columns {
            warn!(
                table = %table,
                column = %altered.current.name,
                previous = %altered.previous.column_type,
                current = %altered.current.column_type,
                "Column definition changed"
            );
        }

        let clean = match rec.decision() {
            Decision::Conflict => {
                warn!(
                    table = %table,
                    new = ?report.new_columns,
                    obsolete = ?report.obsolete_columns,
                    "New and obsolete columns at once (rename?), skipping table"
                );
                report.outcome = TableOutcome::Conflict;
                return Ok(());
            }
            Decision::Proceed { clean } => clean,
        };

        let data_options = self.db.get_table_options(&config.data_schema, table).await?;

        if !audit_exists {
            info!(table = %table, "Creating audit table");
            let sql = self
                .ddl
                .create_table(&config.audit_schema, table, &rec.target, &data_options);
            self.emit(report, sql).await?;
        } else if !rec.new_columns.is_empty() {
            let audit_options = self
                .db
                .get_table_options(&config.audit_schema, table)
                .await?;
            let statements = self.ddl.add_columns(
                &config.audit_schema,
                table,
                &rec.new_columns,
                &rec.target,
                &audit_options,
                &data_options,
            );
            for sql in statements {
                self.emit(report, sql).await?;
            }
        }

        let definitions = ctx.triggers.build_all(
            table,
            &ctx.audit_columns,
            &data_live,
            config.skip_variable_for(table),
            &config.additional_sql,
        )?;
        self.replace_triggers(ctx, table, &definitions, report).await?;

        report.review_sql = self
            .ddl
            .modify_columns(&config.audit_schema, table, &rec.altered_columns);
        report.outcome = TableOutcome::Synced {
            created: !audit_exists,
            clean,
        };
        if clean {
            report.snapshot = Some(data_live);
        } else {
            warn!(table = %table, "Altered columns present, snapshot not recorded");
        }

        Ok(())
    }

    /// Replaces a table's triggers while holding a write lock on it.
    ///
    /// If the lock cannot be taken nothing is dropped. Once taken, the lock
    /// is released whatever happens to the swap.
    async fn replace_triggers(
        &mut self,
        ctx: &RunContext<'_>,
        table: &str,
        definitions: &[TriggerDefinition],
        report: &mut TableReport,
    ) -> Result<()> {
        let schema = &ctx.config.data_schema;

        if !self.dry_run {
            self.db
                .lock_table_write(schema, table)
                .await
                .map_err(|source| AuditError::Lock {
                    schema: schema.clone(),
                    table: table.to_string(),
                    source: Box::new(source),
                })?;
        }
        report
            .statements
            .push(self.ddl.lock_table_write(schema, table));
        debug!(table = %table, "Table locked for trigger swap");

        let swapped = self.swap_triggers(ctx, table, definitions, report).await;

        let unlocked = if self.dry_run {
            Ok(())
        } else {
            self.db.unlock_all().await
        };
        report.statements.push(UNLOCK_TABLES_SQL.to_string());

        match (swapped, unlocked) {
            (Ok(()), unlocked) => unlocked,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(unlock)) => {
                warn!(table = %table, error = %unlock, "Failed to unlock tables after failed swap");
                Err(err)
            }
        }
    }

    async fn swap_triggers(
        &mut self,
        ctx: &RunContext<'_>,
        table: &str,
        definitions: &[TriggerDefinition],
        report: &mut TableReport,
    ) -> Result<()> {
        let mut to_drop = self.db.get_triggers(&ctx.config.data_schema, table).await?;
        for definition in definitions {
            if !to_drop.contains(&definition.name) {
                to_drop.push(definition.name.clone());
            }
        }

        for (idx, name) in to_drop.iter().enumerate() {
            if let Err(err) = self.emit(report, ctx.triggers.drop_trigger(name)).await {
                // No action may keep its old trigger.
                for rest in &to_drop[idx + 1..] {
                    let sql = ctx.triggers.drop_trigger(rest);
                    if let Err(cleanup) = self.db.execute(&sql).await {
                        warn!(
                            table = %table,
                            trigger = %rest,
                            error = %cleanup,
                            "Failed to drop remaining trigger"
                        );
                    }
                }
                return Err(err);
            }
        }

        let mut created: Vec<&str> = Vec::new();
        for definition in definitions {
            if let Err(err) = self.emit(report, definition.sql.clone()).await {
                for name in created {
                    let sql = ctx.triggers.drop_trigger(name);
                    if let Err(cleanup) = self.db.execute(&sql).await {
                        warn!(
                            table = %table,
                            trigger = %name,
                            error = %cleanup,
                            "Failed to drop partially created trigger"
                        );
                    }
                }
                return Err(err);
            }
            debug!(
                table = %table,
                trigger = %definition.name,
                action = %definition.action,
                "Trigger created"
            );
            created.push(&definition.name);
        }
        Ok(())
    }

    /// Executes a statement (unless in dry-run mode) and records it.
    async fn emit(&mut self, report: &mut TableReport, sql: String) -> Result<()> {
        debug!(sql = %sql, "Executing SQL");
        if !self.dry_run {
            self.db.execute(&sql).await?;
        }
        report.statements.push(sql);
        Ok(())
    }
}
