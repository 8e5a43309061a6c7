use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{params, Connection};
use thiserror::Error;

use crate::db::models::{decode_origin, decode_validation};
use crate::db::{PortRunRecord, StoredLogEntry};
use crate::oracle::LogEntry;
use crate::report::Fidelity;

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Error type for project database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

/// Convenience result type for DB operations.
pub type DbResult<T> = Result<T, DbError>;

/// SQLite-backed project database.
///
/// This is a thin wrapper around `rusqlite::Connection` that is responsible for:
/// - Opening/creating the DB file.
/// - Applying schema migrations.
/// - Recording port runs and the translation log of each.
#[derive(Debug)]
pub struct ProjectDb {
    conn: Connection,
}

const RUN_COLUMNS: &str = "id, name, spec_hash, catalog_hash, mapper, toolchain, oracle, fidelity, \
     deterministic, oracle_accepted, fallback, image_sha256, started_at, finished_at";

fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, PortRunRecord)> {
    let fidelity: String = row.get(7)?;
    let fidelity = fidelity
        .parse::<Fidelity>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, e.into()))?;
    Ok((
        row.get(0)?,
        PortRunRecord {
            name: row.get(1)?,
            spec_hash: row.get(2)?,
            catalog_hash: row.get(3)?,
            mapper: row.get(4)?,
            toolchain: row.get(5)?,
            oracle: row.get(6)?,
            fidelity,
            deterministic: row.get::<_, i64>(8)? as usize,
            oracle_accepted: row.get::<_, i64>(9)? as usize,
            fallback: row.get::<_, i64>(10)? as usize,
            image_sha256: row.get(11)?,
            started_at: row.get(12)?,
            finished_at: row.get(13)?,
        },
    ))
}

impl ProjectDb {
    /// Open (or create) a project database at the given path and ensure the schema exists.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory database with the current schema.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Expose a reference to the underlying connection for advanced callers.
    /// For most code, prefer higher-level helpers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn schema_version(&self) -> DbResult<i32> {
        current_schema_version(&self.conn)
    }

    /// Insert a port run and return its row id.
    pub fn insert_port_run(&self, record: &PortRunRecord) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO port_runs (name, spec_hash, catalog_hash, mapper, toolchain, oracle, fidelity,
                                   deterministic, oracle_accepted, fallback, image_sha256, started_at, finished_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                record.name,
                record.spec_hash,
                record.catalog_hash,
                record.mapper,
                record.toolchain,
                record.oracle,
                record.fidelity.as_str(),
                record.deterministic as i64,
                record.oracle_accepted as i64,
                record.fallback as i64,
                record.image_sha256,
                record.started_at,
                record.finished_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List port runs (ordered by id), optionally filtered by run name.
    pub fn list_port_runs(&self, name: Option<&str>) -> DbResult<Vec<(i64, PortRunRecord)>> {
        let sql = match name {
            Some(_) => format!("SELECT {RUN_COLUMNS} FROM port_runs WHERE name = ?1 ORDER BY id"),
            None => format!("SELECT {RUN_COLUMNS} FROM port_runs ORDER BY id"),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match name {
            Some(name) => stmt.query_map(params![name], map_run)?,
            None => stmt.query_map([], map_run)?,
        };

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Most recent run id recorded under `name`.
    pub fn latest_run_id(&self, name: &str) -> DbResult<Option<i64>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id FROM port_runs
            WHERE name = ?1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )?;
        let mut rows = stmt.query(params![name])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    /// Persist the translation log of a run in one transaction.
    pub fn insert_translation_log(&self, run_id: i64, entries: &[LogEntry]) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO translation_log (run_id, function, bank, origin, validation, attempts, annotation)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for entry in entries {
                stmt.execute(params![
                    run_id,
                    entry.function,
                    entry.bank,
                    entry.origin.as_str(),
                    entry.validation.as_str(),
                    entry.attempts,
                    entry.annotation
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Log entries of a run ordered by (bank, function); optionally only the
    /// functions that fell back to the trap stub.
    pub fn load_translation_log(
        &self,
        run_id: i64,
        failures_only: bool,
    ) -> DbResult<Vec<StoredLogEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT function, bank, origin, validation, attempts, annotation
            FROM translation_log
            WHERE run_id = ?1
            ORDER BY bank, function
            "#,
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(LogEntry {
                function: row.get(0)?,
                bank: row.get(1)?,
                origin: decode_origin(&row.get::<_, String>(2)?),
                validation: decode_validation(&row.get::<_, String>(3)?),
                attempts: row.get(4)?,
                annotation: row.get(5)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            let entry = row?;
            if failures_only && !entry.is_failure() {
                continue;
            }
            out.push(StoredLogEntry { run_id, entry });
        }
        Ok(out)
    }
}

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: port_runs
/// - 2: translation_log
fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let current_version = current_schema_version(conn)?;

    // Reject DBs created with a newer schema than we support.
    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version < 1 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS port_runs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL,
                spec_hash       TEXT NOT NULL,
                catalog_hash    TEXT,
                mapper          INTEGER,
                toolchain       TEXT NOT NULL,
                oracle          TEXT,
                fidelity        TEXT NOT NULL,
                deterministic   INTEGER NOT NULL DEFAULT 0,
                oracle_accepted INTEGER NOT NULL DEFAULT 0,
                fallback        INTEGER NOT NULL DEFAULT 0,
                image_sha256    TEXT,
                started_at      TEXT NOT NULL,
                finished_at     TEXT NOT NULL
            );

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    if current_version < 2 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS translation_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id      INTEGER NOT NULL REFERENCES port_runs(id),
                function    TEXT NOT NULL,
                bank        INTEGER NOT NULL,
                origin      TEXT NOT NULL,
                validation  TEXT NOT NULL,
                attempts    INTEGER NOT NULL,
                annotation  TEXT
            );
            CREATE INDEX IF NOT EXISTS translation_log_run ON translation_log (run_id);

            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
