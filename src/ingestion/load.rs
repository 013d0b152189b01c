//! Load functions - upsert the staged CSV into MySQL in a single transaction

use crate::config::DatabaseConfig;
use crate::ingestion::error::LoadError;
use crate::ingestion::retry::RetryPolicy;
use crate::ingestion::types::{LoadReport, RateRow, RATE_COLUMNS};
use crate::ingestion::utils::is_valid_identifier;
use chrono::Utc;
use sqlx::mysql::{MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions};
use sqlx::{MySql, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const INSERT_TEMPLATE: &str = include_str!("../../sql/insert_rates.sql");

/// Upsert conflict key; matches the unique key in `sql/create_rates_table.sql`
pub const KEY_COLUMNS: [&str; 3] = ["base_code", "target_code", "time_last_update_unix"];

/// Opens sessions against the target database.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Session: RateSession;

    async fn connect(&self) -> Result<Self::Session, sqlx::Error>;
}

/// One exclusively owned connection with explicit transaction control.
#[allow(async_fn_in_trait)]
pub trait RateSession {
    async fn begin(&mut self) -> Result<(), sqlx::Error>;

    /// Execute `statement` for a single row and return rows affected.
    async fn upsert(&mut self, statement: &str, row: &RateRow) -> Result<u64, sqlx::Error>;

    async fn commit(&mut self) -> Result<(), sqlx::Error>;

    async fn rollback(&mut self) -> Result<(), sqlx::Error>;

    /// Release the connection. Any open transaction is discarded.
    async fn close(self);
}

/// MySQL connector built from the database section of the config
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    options: MySqlConnectOptions,
    label: String,
}

impl MySqlConnector {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        Self {
            options,
            label: format!(
                "{}@{}:{}/{}",
                config.user, config.host, config.port, config.database
            ),
        }
    }
}

impl Connector for MySqlConnector {
    type Session = MySqlSession;

    async fn connect(&self) -> Result<MySqlSession, sqlx::Error> {
        info!("Connecting to MySQL {}", self.label);

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(self.options.clone())
            .await?;

        Ok(MySqlSession { pool, tx: None })
    }
}

/// Single-connection pool plus the open transaction, if any
pub struct MySqlSession {
    pool: MySqlPool,
    tx: Option<Transaction<'static, MySql>>,
}

impl RateSession for MySqlSession {
    async fn begin(&mut self) -> Result<(), sqlx::Error> {
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn upsert(&mut self, statement: &str, row: &RateRow) -> Result<u64, sqlx::Error> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| sqlx::Error::Protocol("upsert outside of a transaction".into()))?;

        // Bind order follows RATE_COLUMNS
        let result = sqlx::query(statement)
            .bind(&row.base_code)
            .bind(&row.target_code)
            .bind(row.rate)
            .bind(row.time_last_update_utc.with_timezone(&Utc))
            .bind(row.time_next_update_utc.with_timezone(&Utc))
            .bind(row.time_next_update_unix)
            .bind(row.time_last_update_unix)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        match self.tx.take() {
            Some(tx) => tx.commit().await,
            None => Ok(()),
        }
    }

    async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await,
            None => Ok(()),
        }
    }

    async fn close(mut self) {
        if let Some(tx) = self.tx.take() {
            if let Err(e) = tx.rollback().await {
                warn!("Rollback on close failed: {}", e);
            }
        }
        self.pool.close().await;
    }
}

/// Classify connection failures worth another attempt
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => {
            let number = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(MySqlDatabaseError::number);
            is_transient_server_error(db.code().as_deref(), number)
        }
        _ => false,
    }
}

/// SQLSTATE class 08 (connection exception), or MySQL 1040/1203 (too many
/// connections) which the server may report as 42000
fn is_transient_server_error(sqlstate: Option<&str>, number: Option<u16>) -> bool {
    const TOO_MANY_CONNECTIONS: [u16; 2] = [1040, 1203];

    sqlstate.is_some_and(|code| code.starts_with("08"))
        || number.is_some_and(|n| TOO_MANY_CONNECTIONS.contains(&n))
}

/// Render the upsert statement for `table` from the SQL template
pub fn build_upsert_sql(table: &str) -> Result<String, LoadError> {
    if !is_valid_identifier(table) {
        return Err(LoadError::InvalidTable(table.to_string()));
    }

    let columns = RATE_COLUMNS
        .iter()
        .map(|c| format!("`{c}`"))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; RATE_COLUMNS.len()].join(", ");
    let update_assignments = RATE_COLUMNS
        .iter()
        .filter(|c| !KEY_COLUMNS.contains(c))
        .map(|c| format!("`{c}` = VALUES(`{c}`)"))
        .collect::<Vec<_>>()
        .join(",\n    ");

    Ok(INSERT_TEMPLATE
        .replace("{table}", table)
        .replace("{columns}", &columns)
        .replace("{placeholders}", &placeholders)
        .replace("{update_assignments}", &update_assignments))
}

/// Read the staged CSV back into typed rows.
///
/// A zero-byte file reads as no rows; otherwise the header must match
/// [`RATE_COLUMNS`] exactly.
pub fn read_rows(csv_path: &Path) -> Result<Vec<RateRow>, LoadError> {
    if !csv_path.is_file() {
        return Err(LoadError::SourceNotFound(csv_path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(csv_path)?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    if headers.iter().ne(RATE_COLUMNS.iter().copied()) {
        return Err(LoadError::InvalidSource {
            path: csv_path.to_path_buf(),
            reason: format!(
                "expected header {:?}, found {:?}",
                RATE_COLUMNS.join(","),
                headers.iter().collect::<Vec<_>>().join(",")
            ),
        });
    }

    let rows = reader
        .deserialize::<RateRow>()
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Upsert every row of the staged CSV into `table`, all or nothing.
///
/// An empty file is a no-op and never opens a connection. Connection
/// attempts follow `retry`; statement failures roll back and are not retried.
/// The session is closed on every path once it has been opened.
pub async fn load_csv_to_table<C: Connector>(
    csv_path: &Path,
    table: &str,
    connector: &C,
    retry: &RetryPolicy,
) -> Result<LoadReport, LoadError> {
    let rows = read_rows(csv_path)?;
    if rows.is_empty() {
        warn!("No rows to load from {}", csv_path.display());
        return Ok(LoadReport::default());
    }

    let statement = build_upsert_sql(table)?;
    debug!("Upsert statement: {}", statement);

    let mut session = retry
        .run("database connect", move || connector.connect(), is_transient)
        .await
        .map_err(|failure| LoadError::Connection {
            attempts: failure.attempts,
            source: failure.error,
        })?;

    let result = upsert_all(&mut session, &statement, table, &rows).await;

    session.close().await;
    debug!("Database connection closed");

    let rows_affected = result?;
    info!(
        "Successfully loaded {} rows into `{}` ({} affected)",
        rows.len(),
        table,
        rows_affected
    );

    Ok(LoadReport {
        rows_loaded: rows.len(),
        rows_affected,
    })
}

async fn upsert_all<S: RateSession>(
    session: &mut S,
    statement: &str,
    table: &str,
    rows: &[RateRow],
) -> Result<u64, LoadError> {
    if let Err(source) = session.begin().await {
        error!(table, rows = rows.len(), error = %source, "Could not start transaction");
        return Err(LoadError::Execution {
            table: table.to_string(),
            row: None,
            source,
        });
    }

    info!("Inserting {} rows into `{}`", rows.len(), table);

    let mut rows_affected = 0u64;
    for (idx, row) in rows.iter().enumerate() {
        match session.upsert(statement, row).await {
            Ok(affected) => rows_affected += affected,
            Err(source) => {
                error!(
                    table,
                    row = idx + 1,
                    rows = rows.len(),
                    target_code = %row.target_code,
                    error = %source,
                    "Error loading data, rolling back"
                );
                rollback(session, table).await;
                return Err(LoadError::Execution {
                    table: table.to_string(),
                    row: Some(idx + 1),
                    source,
                });
            }
        }
    }

    if let Err(source) = session.commit().await {
        error!(table, rows = rows.len(), error = %source, "Commit failed, rolling back");
        rollback(session, table).await;
        return Err(LoadError::Execution {
            table: table.to_string(),
            row: None,
            source,
        });
    }

    Ok(rows_affected)
}

async fn rollback<S: RateSession>(session: &mut S, table: &str) {
    if let Err(e) = session.rollback().await {
        error!(table, error = %e, "Rollback failed");
    }
}
