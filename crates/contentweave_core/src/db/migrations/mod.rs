//! Container store schema steps.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly one.
//! - The highest applied step is mirrored to `PRAGMA user_version`.
//! - Pending steps run in one transaction; a failing step leaves the
//!   previous schema untouched.

use crate::db::{schema_version, DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "containers",
        sql: include_str!("0001_containers.sql"),
    },
    SchemaStep {
        version: 2,
        name: "identity_index",
        sql: include_str!("0002_identity_index.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Brings the container schema on `conn` up to `latest_version()`.
///
/// # Errors
/// - `SchemaTooNew` when the database was written by a newer build.
/// - `Sqlite` when a step fails; the transaction is rolled back.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::SchemaTooNew {
            found: from,
            supported: latest,
        });
    }

    let pending = pending_steps(from);
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=db_migrate module=db status=ok step={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;
    Ok(())
}

fn pending_steps(from: u32) -> &'static [SchemaStep] {
    let applied = SCHEMA_STEPS
        .iter()
        .take_while(|step| step.version <= from)
        .count();
    &SCHEMA_STEPS[applied..]
}
