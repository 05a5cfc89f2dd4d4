use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::adapters::db;
use crate::adapters::db::DbError;
use crate::domain::models::{EnergyRecord, EnergyRecordPatch, NewEnergyRecord};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("enphase with id {id} not found")]
    NotFound { id: i64 },
    #[error("enphase with system_id {system_id} already exists")]
    Conflict { system_id: i64 },
    #[error("database lock poisoned")]
    DbLockPoisoned,
    #[error("database operation failed: {0}")]
    Database(#[from] DbError),
}

pub trait RecordQueryHandler {
    fn list_records(&self, page: u32, limit: u32) -> Result<Vec<EnergyRecord>, ServiceError>;
    fn get_record(&self, id: i64) -> Result<EnergyRecord, ServiceError>;
}

pub trait RecordCommandHandler {
    fn create_record(&self, input: &NewEnergyRecord) -> Result<EnergyRecord, ServiceError>;
    fn replace_record(
        &self,
        id: i64,
        input: &NewEnergyRecord,
    ) -> Result<EnergyRecord, ServiceError>;
    fn patch_record(
        &self,
        id: i64,
        patch: &EnergyRecordPatch,
    ) -> Result<EnergyRecord, ServiceError>;
    fn delete_record(&self, id: i64) -> Result<(), ServiceError>;
}

/// Record service backed by a shared SQLite connection. Each operation takes
/// the lock for the duration of one read or one read-modify-write
/// transaction and releases it on every exit path. Mutations run inside
/// `Connection::transaction`; dropping the transaction on an error path
/// rolls it back, so a failed mutation leaves storage untouched.
#[derive(Clone)]
pub struct SqliteRecordService {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRecordService {
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, DbError>,
    ) -> Result<T, ServiceError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| ServiceError::DbLockPoisoned)?;
        op(&connection).map_err(ServiceError::from)
    }

    fn with_transaction<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut connection = self
            .connection
            .lock()
            .map_err(|_| ServiceError::DbLockPoisoned)?;
        let transaction = connection.transaction().map_err(DbError::from)?;

        let value = op(&transaction)?;

        transaction.commit().map_err(DbError::from)?;
        Ok(value)
    }
}

fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn map_write_error(error: DbError, system_id: i64) -> ServiceError {
    if error.is_unique_violation() {
        ServiceError::Conflict { system_id }
    } else {
        ServiceError::Database(error)
    }
}

impl RecordQueryHandler for SqliteRecordService {
    fn list_records(&self, page: u32, limit: u32) -> Result<Vec<EnergyRecord>, ServiceError> {
        let offset = u64::from(page.saturating_sub(1)) * u64::from(limit);
        self.with_connection(|connection| db::list_records(connection, limit, offset))
    }

    fn get_record(&self, id: i64) -> Result<EnergyRecord, ServiceError> {
        self.with_connection(|connection| db::get_record(connection, id))?
            .ok_or(ServiceError::NotFound { id })
    }
}

impl RecordCommandHandler for SqliteRecordService {
    fn create_record(&self, input: &NewEnergyRecord) -> Result<EnergyRecord, ServiceError> {
        let stamped_at = now_utc();

        self.with_transaction(|connection| {
            let id = db::insert_record(connection, input, &stamped_at, &stamped_at)
                .map_err(|error| map_write_error(error, input.system_id))?;

            db::get_record(connection, id)?.ok_or(ServiceError::NotFound { id })
        })
    }

    fn replace_record(
        &self,
        id: i64,
        input: &NewEnergyRecord,
    ) -> Result<EnergyRecord, ServiceError> {
        self.with_transaction(|connection| {
            let existing =
                db::get_record(connection, id)?.ok_or(ServiceError::NotFound { id })?;

            let replaced = existing.replaced_with(input, now_utc());
            db::update_record(connection, &replaced)
                .map_err(|error| map_write_error(error, input.system_id))?;

            db::get_record(connection, id)?.ok_or(ServiceError::NotFound { id })
        })
    }

    fn patch_record(
        &self,
        id: i64,
        patch: &EnergyRecordPatch,
    ) -> Result<EnergyRecord, ServiceError> {
        self.with_transaction(|connection| {
            let mut record =
                db::get_record(connection, id)?.ok_or(ServiceError::NotFound { id })?;

            patch.apply(&mut record);
            record.update_date = now_utc();

            db::update_record(connection, &record)
                .map_err(|error| map_write_error(error, record.system_id))?;

            db::get_record(connection, id)?.ok_or(ServiceError::NotFound { id })
        })
    }

    fn delete_record(&self, id: i64) -> Result<(), ServiceError> {
        self.with_transaction(|connection| {
            let affected = db::delete_record(connection, id)?;
            if affected == 0 {
                return Err(ServiceError::NotFound { id });
            }
            Ok(())
        })
    }
}
