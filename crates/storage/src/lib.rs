//! Storage Layer
//!
//! Provides the single PostgreSQL connection used by the logger, the rows it
//! writes, and the scoped-transaction contract every writer goes through.

mod connection;
mod memory;
mod records;
mod retry;

pub use connection::{Database, DatabaseConfig};
pub use memory::MemoryStore;
pub use records::{Device, DeviceEvent, Row, SensorReading};
pub use retry::retry_forever;

use async_trait::async_trait;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The connection itself is unusable and has to be replaced
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    /// A statement or commit failed on a healthy connection
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl StorageError {
    /// Whether the error means the connection must be re-established
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, StorageError::ConnectionLost(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StorageError::ConnectionLost(err.to_string()),
            other => StorageError::DatabaseError(other.to_string()),
        }
    }
}

/// The only write path into storage.
///
/// `within_transaction` runs every row of the batch inside one transaction.
/// It commits when all inserts succeed and rolls back otherwise, so callers
/// observe either all rows or none of them.
#[async_trait]
pub trait Store: Send {
    /// Insert all rows atomically. An empty batch does nothing.
    async fn within_transaction(&mut self, rows: &[Row]) -> Result<(), StorageError>;
}
