//! Per-operation connection handling with bounded retry

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};
use rusqlite::{Connection, Transaction};

use super::StoreError;

const SCHEMA: &str = include_str!("schema.sql");

/// Connection retry settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Attempts per operation, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub retry_delay: Duration,
    /// SQLite busy_timeout applied to each connection
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(100),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle to the lending database file.
///
/// Holds no open connection: every operation opens one, runs inside a
/// transaction, commits and closes it.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    config: StoreConfig,
}

impl Database {
    /// Open (or create) the database at `path` and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_config(path, StoreConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StoreError> {
        let db = Self {
            path: path.as_ref().to_path_buf(),
            config,
        };
        db.transaction(|tx| {
            tx.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        debug!("Opened lending database at {}", db.path.display());
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.config.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Run `op` inside a transaction on a fresh connection and commit.
    ///
    /// Transient failures (busy, locked, cannot open) are retried up to
    /// `max_attempts` times with a doubling delay. `op` may run more than once.
    pub fn transaction<T, F>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut(&Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut delay = self.config.retry_delay;
        let mut attempt = 1;

        loop {
            match self.run_once(&mut op) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    warn!(
                        "Database attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, self.config.max_attempts, e, delay
                    );
                    thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        error!("Database unavailable after {} attempts: {}", attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    fn run_once<T, F>(&self, op: &mut F) -> Result<T, StoreError>
    where
        F: FnMut(&Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
