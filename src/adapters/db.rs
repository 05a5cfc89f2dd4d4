use rusqlite::{Connection, Row, params};
use thiserror::Error;

use crate::domain::models::{EnergyRecord, NewEnergyRecord};

pub const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS enphase (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id INTEGER NOT NULL UNIQUE,
    current_power INTEGER NOT NULL,
    energy_lifetime INTEGER NOT NULL,
    energy_today INTEGER NOT NULL,
    last_interval_end_at INTEGER NOT NULL,
    last_report_at INTEGER NOT NULL,
    modules INTEGER NOT NULL,
    operational_at INTEGER NOT NULL,
    size_w INTEGER NOT NULL,
    status TEXT NOT NULL,
    summary_date TEXT NOT NULL,
    events TEXT,
    alarms TEXT,
    create_date TEXT NOT NULL,
    update_date TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_enphase_system_id
ON enphase (system_id);
"#,
)];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
}

impl DbError {
    /// True when the failure is SQLite's unique-constraint violation, which
    /// on this schema can only be a duplicate `system_id`.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}

pub fn open_connection(path: &str) -> Result<Connection, DbError> {
    Connection::open(path).map_err(DbError::from)
}

pub fn run_migrations(connection: &mut Connection) -> Result<(), DbError> {
    let current_version = schema_version(connection)?;

    if current_version > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            current: current_version,
            latest: LATEST_SCHEMA_VERSION,
        });
    }

    let transaction = connection.transaction()?;

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            transaction.execute_batch(sql)?;
            transaction.pragma_update(None, "user_version", version)?;
        }
    }

    transaction.commit()?;

    Ok(())
}

pub fn schema_version(connection: &Connection) -> Result<u32, DbError> {
    let version = connection.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

const RECORD_COLUMNS: &str = "id, system_id, current_power, energy_lifetime, energy_today, \
     last_interval_end_at, last_report_at, modules, operational_at, size_w, \
     status, summary_date, events, alarms, create_date, update_date";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<EnergyRecord> {
    Ok(EnergyRecord {
        id: row.get(0)?,
        system_id: row.get(1)?,
        current_power: row.get(2)?,
        energy_lifetime: row.get(3)?,
        energy_today: row.get(4)?,
        last_interval_end_at: row.get(5)?,
        last_report_at: row.get(6)?,
        modules: row.get(7)?,
        operational_at: row.get(8)?,
        size_w: row.get(9)?,
        status: row.get(10)?,
        summary_date: row.get(11)?,
        events: row.get(12)?,
        alarms: row.get(13)?,
        create_date: row.get(14)?,
        update_date: row.get(15)?,
    })
}

pub fn insert_record(
    connection: &Connection,
    new_record: &NewEnergyRecord,
    create_date: &str,
    update_date: &str,
) -> Result<i64, DbError> {
    connection.execute(
        "INSERT INTO enphase (system_id, current_power, energy_lifetime, energy_today, \
         last_interval_end_at, last_report_at, modules, operational_at, size_w, \
         status, summary_date, events, alarms, create_date, update_date) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            new_record.system_id,
            new_record.current_power,
            new_record.energy_lifetime,
            new_record.energy_today,
            new_record.last_interval_end_at,
            new_record.last_report_at,
            new_record.modules,
            new_record.operational_at,
            new_record.size_w,
            new_record.status,
            new_record.summary_date,
            new_record.events,
            new_record.alarms,
            create_date,
            update_date,
        ],
    )?;

    Ok(connection.last_insert_rowid())
}

pub fn get_record(connection: &Connection, id: i64) -> Result<Option<EnergyRecord>, DbError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM enphase WHERE id = ?1"
    ))?;

    let mut rows = statement.query(params![id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(record_from_row(row)?));
    }

    Ok(None)
}

pub fn list_records(
    connection: &Connection,
    limit: u32,
    offset: u64,
) -> Result<Vec<EnergyRecord>, DbError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM enphase ORDER BY id LIMIT ?1 OFFSET ?2"
    ))?;

    let rows = statement.query_map(params![i64::from(limit), offset as i64], |row| {
        record_from_row(row)
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }

    Ok(records)
}

/// Writes every mutable column of `record` back to its row. `create_date`
/// is not in the SET list; it is immutable after insert.
pub fn update_record(connection: &Connection, record: &EnergyRecord) -> Result<usize, DbError> {
    let affected = connection.execute(
        "UPDATE enphase SET system_id = ?1, current_power = ?2, energy_lifetime = ?3, \
         energy_today = ?4, last_interval_end_at = ?5, last_report_at = ?6, modules = ?7, \
         operational_at = ?8, size_w = ?9, status = ?10, summary_date = ?11, events = ?12, \
         alarms = ?13, update_date = ?14 WHERE id = ?15",
        params![
            record.system_id,
            record.current_power,
            record.energy_lifetime,
            record.energy_today,
            record.last_interval_end_at,
            record.last_report_at,
            record.modules,
            record.operational_at,
            record.size_w,
            record.status,
            record.summary_date,
            record.events,
            record.alarms,
            record.update_date,
            record.id,
        ],
    )?;

    Ok(affected)
}

pub fn delete_record(connection: &Connection, id: i64) -> Result<usize, DbError> {
    let affected = connection.execute("DELETE FROM enphase WHERE id = ?1", params![id])?;
    Ok(affected)
}
