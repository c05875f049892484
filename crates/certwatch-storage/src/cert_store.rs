use certwatch_common::Observation;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StorageError};
use crate::ObservationStore;

pub const DB_FILE_NAME: &str = "certs.db";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CERTIFICATES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS certificates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL UNIQUE,
    expiry_date TEXT NOT NULL,
    days_left INTEGER NOT NULL,
    last_checked TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_certificates_days_left ON certificates(days_left);
";

/// SQLite-backed [`ObservationStore`].
///
/// All access goes through one mutex-guarded connection, so writes from
/// parallel probe tasks are serialized and readers never see a half-written
/// row.
pub struct CertStore {
    conn: Mutex<Connection>,
}

impl CertStore {
    /// Opens (creating if needed) `certs.db` under `data_dir`. Schema creation
    /// is idempotent.
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(CERTIFICATES_SCHEMA)?;

        tracing::info!(path = %db_path.display(), "Initialized cert store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CERTIFICATES_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn row_to_observation(row: &rusqlite::Row) -> Result<Observation> {
        let domain: String = row.get(0)?;
        let expiry_raw: String = row.get(1)?;
        let days_left: i64 = row.get(2)?;
        let checked_raw: String = row.get(3)?;

        let expiry_date = NaiveDate::parse_from_str(&expiry_raw, DATE_FORMAT).map_err(|_| {
            StorageError::InvalidColumn {
                column: "expiry_date",
                value: expiry_raw.clone(),
            }
        })?;
        let last_checked = NaiveDateTime::parse_from_str(&checked_raw, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|_| StorageError::InvalidColumn {
                column: "last_checked",
                value: checked_raw.clone(),
            })?;

        Ok(Observation {
            domain,
            expiry_date,
            days_left,
            last_checked,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

impl ObservationStore for CertStore {
    fn upsert(&self, observation: &Observation) -> Result<()> {
        let conn = self.lock();
        // Single statement: the row id survives, every other column is replaced.
        conn.execute(
            "INSERT INTO certificates (domain, expiry_date, days_left, last_checked)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(domain) DO UPDATE SET
                expiry_date = excluded.expiry_date,
                days_left = excluded.days_left,
                last_checked = excluded.last_checked",
            rusqlite::params![
                observation.domain,
                observation.expiry_date.format(DATE_FORMAT).to_string(),
                observation.days_left,
                format_timestamp(&observation.last_checked),
            ],
        )?;
        Ok(())
    }

    fn get(&self, domain: &str) -> Result<Option<Observation>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT domain, expiry_date, days_left, last_checked
             FROM certificates WHERE domain = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![domain], |row| {
            Ok(Self::row_to_observation(row))
        })?;
        match rows.next() {
            Some(Ok(Ok(obs))) => Ok(Some(obs)),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn list_by_urgency(&self) -> Result<Vec<Observation>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT domain, expiry_date, days_left, last_checked
             FROM certificates ORDER BY days_left ASC, domain ASC",
        )?;
        let rows = stmt.query_map([], |row| Ok(Self::row_to_observation(row)))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row??);
        }
        Ok(results)
    }

    fn count(&self) -> Result<u64> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM certificates", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
