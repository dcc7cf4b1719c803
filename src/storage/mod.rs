//! Invoice persistence.
//!
//! The store assigns identifiers; invoices are written once and never
//! updated or deleted.

mod sqlite;

pub use sqlite::SqliteInvoiceStore;

use crate::types::invoice::{ExtractedPayload, StoredInvoice};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record {id}: {message}")]
    Corrupt { id: i64, message: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Trait for invoice persistence.
pub trait InvoiceStore: Send + Sync {
    /// Persist a new invoice and return it with its assigned identifier.
    ///
    /// Identifiers increase monotonically and are never reused.
    fn insert(&self, filename: &str, payload: &ExtractedPayload) -> Result<StoredInvoice, StorageError>;

    /// Load an invoice by identifier; `None` if it does not exist.
    fn get(&self, id: i64) -> Result<Option<StoredInvoice>, StorageError>;

    /// Load all invoices, oldest first.
    fn list(&self) -> Result<Vec<StoredInvoice>, StorageError>;
}
