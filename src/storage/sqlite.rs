//! SQLite implementation of [`InvoiceStore`].

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{InvoiceStore, StorageError};
use crate::types::invoice::{ExtractedPayload, StoredInvoice};

/// SQLite invoice store.
pub struct SqliteInvoiceStore {
    conn: Mutex<Connection>,
}

impl SqliteInvoiceStore {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;

        // AUTOINCREMENT keeps ids strictly increasing and never reused.
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS invoices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                extracted_data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    }

    fn decode(
        (id, filename, extracted_data, created_at): (i64, String, String, String),
    ) -> Result<StoredInvoice, StorageError> {
        let extracted_data: ExtractedPayload = serde_json::from_str(&extracted_data)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StorageError::Corrupt {
                id,
                message: format!("bad created_at: {e}"),
            })?;

        Ok(StoredInvoice {
            id,
            filename,
            extracted_data,
            created_at,
        })
    }
}

impl InvoiceStore for SqliteInvoiceStore {
    fn insert(&self, filename: &str, payload: &ExtractedPayload) -> Result<StoredInvoice, StorageError> {
        let extracted_data = serde_json::to_string(payload)?;
        let created_at = Utc::now();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO invoices (filename, extracted_data, created_at) VALUES (?1, ?2, ?3)",
            params![filename, extracted_data, created_at.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(invoice_id = id, filename = %filename, "Saved invoice");

        Ok(StoredInvoice {
            id,
            filename: filename.to_string(),
            extracted_data: payload.clone(),
            created_at,
        })
    }

    fn get(&self, id: i64) -> Result<Option<StoredInvoice>, StorageError> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT id, filename, extracted_data, created_at FROM invoices WHERE id = ?1",
                params![id],
                Self::read_row,
            )
            .optional()?;

        row.map(Self::decode).transpose()
    }

    fn list(&self) -> Result<Vec<StoredInvoice>, StorageError> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT id, filename, extracted_data, created_at FROM invoices ORDER BY id")?;
        let rows = stmt
            .query_map([], Self::read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(Self::decode).collect()
    }
}
