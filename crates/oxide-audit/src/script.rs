//! SQL script output.
//!
//! Renders the statements of a run as a file the `mysql` command-line client
//! can replay. Trigger bodies contain `;`, so they are wrapped in a
//! `DELIMITER $$` block.

use chrono::{DateTime, Utc};

use crate::config::AuditConfig;
use crate::report::{SyncReport, TableOutcome, TableReport};

const TRIGGER_DELIMITER: &str = "$$";

/// Renders one statement with its terminator.
fn render_statement(out: &mut String, sql: &str) {
    if sql.starts_with("CREATE TRIGGER") {
        out.push_str(&format!("DELIMITER {TRIGGER_DELIMITER}\n"));
        out.push_str(sql);
        out.push_str(TRIGGER_DELIMITER);
        out.push_str("\nDELIMITER ;\n");
    } else {
        out.push_str(sql);
        out.push_str(";\n");
    }
}

fn render_table(out: &mut String, table: &TableReport) {
    out.push_str(&format!("\n-- Table {}: {}\n", table.table, table.outcome));
    for name in &table.new_columns {
        out.push_str(&format!("--   new column: {name}\n"));
    }
    for name in &table.obsolete_columns {
        out.push_str(&format!("--   obsolete column (kept): {name}\n"));
    }
    for altered in &table.altered_columns {
        out.push_str(&format!(
            "--   altered column: {} ({} -> {})\n",
            altered.current.name, altered.previous.column_type, altered.current.column_type
        ));
    }

    for sql in &table.statements {
        render_statement(out, sql);
    }

    if !table.review_sql.is_empty() {
        out.push_str("-- Review before applying (not executed):\n");
        for sql in &table.review_sql {
            out.push_str(&format!("-- {sql};\n"));
        }
    }
}

/// Renders a report as a replayable SQL script.
///
/// Tables that were untracked or disabled are left out; conflicts and
/// failures appear as comments so the script documents what was skipped.
#[must_use]
pub fn render_script(
    report: &SyncReport,
    config: &AuditConfig,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    out.push_str("-- oxide-audit synchronization script\n");
    out.push_str(&format!(
        "-- data schema: {}, audit schema: {}\n",
        config.data_schema, config.audit_schema
    ));
    out.push_str(&format!(
        "-- generated at {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    for table in &report.tables {
        if matches!(
            table.outcome,
            TableOutcome::Untracked | TableOutcome::Disabled
        ) {
            continue;
        }
        render_table(&mut out, table);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report() -> SyncReport {
        let mut synced = TableReport::new("orders");
        synced.outcome = TableOutcome::Synced {
            created: false,
            clean: true,
        };
        synced.new_columns = vec!["note".to_string()];
        synced.statements = vec![
            "ALTER TABLE `shop_audit`.`orders` ADD COLUMN `note` text NULL AFTER `total`"
                .to_string(),
            "LOCK TABLES `shop`.`orders` WRITE".to_string(),
            "DROP TRIGGER IF EXISTS `shop`.`orders_audit_insert`".to_string(),
            "CREATE TRIGGER `shop`.`orders_audit_insert` AFTER INSERT ON `shop`.`orders`\n\
             FOR EACH ROW\n\
             BEGIN\n  \
             INSERT INTO `shop_audit`.`orders` (`id`) VALUES (NEW.`id`);\n\
             END"
            .to_string(),
            "UNLOCK TABLES".to_string(),
        ];

        let mut conflict = TableReport::with_outcome("customers", TableOutcome::Conflict);
        conflict.new_columns = vec!["full_name".to_string()];
        conflict.obsolete_columns = vec!["name".to_string()];

        SyncReport {
            tables: vec![
                synced,
                conflict,
                TableReport::with_outcome("sessions", TableOutcome::Untracked),
            ],
        }
    }

    #[test]
    fn test_render_script() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let script = render_script(&report(), &AuditConfig::new("shop", "shop_audit"), at);

        assert!(script.starts_with("-- oxide-audit synchronization script\n"));
        assert!(script.contains("-- generated at 2026-01-02 03:04:05 UTC\n"));
        assert!(script.contains("AFTER `total`;\nLOCK TABLES `shop`.`orders` WRITE;\n"));
        assert!(script.contains("DELIMITER $$\nCREATE TRIGGER"));
        assert!(script.contains("VALUES (NEW.`id`);\nEND$$\nDELIMITER ;\nUNLOCK TABLES;\n"));

        assert!(script.contains("-- Table customers: CONFLICT: skipped\n"));
        assert!(script.contains("--   new column: full_name\n--   obsolete column (kept): name\n"));
        assert!(!script.contains("sessions"));
    }
}
