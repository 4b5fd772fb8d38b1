//! PostgreSQL Connection Manager

use crate::records::Row;
use crate::retry::retry_forever;
use crate::{StorageError, Store};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for the destination database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    /// Database name
    pub name: String,
    pub user: String,
    pub password: String,
    /// Pause between failed connection attempts
    pub retry_delay: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "iot_final_project".to_string(),
            user: "postgres".to_string(),
            password: "1".to_string(),
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl DatabaseConfig {
    /// Build driver connect options
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
    }
}

/// Owner of the process's single database connection.
///
/// No pooling: every write goes through the one connection, which is only
/// lent out for the duration of a transaction. A connection that fails at
/// the transport level is dropped and replaced on the next write.
pub struct Database {
    options: PgConnectOptions,
    retry_delay: Duration,
    conn: Option<PgConnection>,
}

impl Database {
    /// Create a manager without connecting yet
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            options: config.connect_options(),
            retry_delay: config.retry_delay,
            conn: None,
        }
    }

    /// Connect, retrying forever at the configured fixed delay
    pub async fn connect(config: &DatabaseConfig) -> Self {
        let mut db = Self::new(config);
        db.acquire().await;
        db
    }

    /// Return the live connection, re-establishing it first if needed
    pub async fn acquire(&mut self) -> &mut PgConnection {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let options = &self.options;
                retry_forever(self.retry_delay, "PostgreSQL", || {
                    PgConnection::connect_with(options)
                })
                .await
            }
        };
        self.conn.insert(conn)
    }

    /// Whether a connection is currently held
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Close the connection gracefully
    pub async fn close(mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.close().await {
                Ok(()) => info!("Database connection closed"),
                Err(e) => warn!("Error while closing database connection: {}", e),
            }
        }
    }
}

#[async_trait]
impl Store for Database {
    async fn within_transaction(&mut self, rows: &[Row]) -> Result<(), StorageError> {
        if rows.is_empty() {
            return Ok(());
        }

        let conn = self.acquire().await;
        let result = write_rows(conn, rows).await;
        settle(&mut self.conn, result)
    }
}

/// Drop the held connection when `result` shows it is no longer usable, so
/// the next `acquire` reconnects. The result is passed through unchanged.
fn settle<C>(slot: &mut Option<C>, result: Result<(), StorageError>) -> Result<(), StorageError> {
    if let Err(e) = &result {
        if e.is_connection_lost() && slot.take().is_some() {
            warn!("Discarding database connection: {}", e);
        }
    }
    result
}

/// Run `rows` in one transaction. The transaction is always finished here,
/// either by commit or by an explicit rollback.
async fn write_rows(conn: &mut PgConnection, rows: &[Row]) -> Result<(), StorageError> {
    let mut tx = conn.begin().await?;

    match insert_rows(&mut tx, rows).await {
        Ok(()) => {
            tx.commit().await?;
            debug!("Committed {} row(s)", rows.len());
            Ok(())
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed: {}", rollback_err);
            }
            Err(e.into())
        }
    }
}

async fn insert_rows(conn: &mut PgConnection, rows: &[Row]) -> Result<(), sqlx::Error> {
    for row in rows {
        let query = sqlx::query(row.insert_sql());
        let query = match row {
            Row::Sensor(reading) => query.bind(reading.temperature).bind(reading.humidity),
            Row::Device(event) => query.bind(event.device.as_str()).bind(event.event.as_str()),
        };
        query.execute(&mut *conn).await?;
        debug!("Inserted row into {}", row.table());
    }
    Ok(())
}
