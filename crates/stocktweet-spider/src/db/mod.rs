//! Relational store access: scoped connections, the idempotent upsert, and table setup.
//!
//! Every [`Upsert::upsert`] call against Postgres opens its own connection and drops it
//! before returning; nothing on the write path is pooled.

mod memory;
pub mod schema;
mod upsert;

pub use memory::MemoryStore;
pub use upsert::UpsertRequest;

use crate::config::DbParams;
use crate::http::PgClient;
use crate::{Error, Result};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;
use tracing::{debug, error, trace};

/// Merges a batch of records into a table, skipping rows whose key already exists.
///
/// Submitting the same request twice leaves the table as submitting it once. Returns the
/// number of rows actually inserted.
#[async_trait]
pub trait Upsert: Send + Sync {
    async fn upsert(&self, request: UpsertRequest) -> Result<u64>;
}

#[async_trait]
impl<U: Upsert + ?Sized> Upsert for std::sync::Arc<U> {
    async fn upsert(&self, request: UpsertRequest) -> Result<u64> {
        (**self).upsert(request).await
    }
}

/// Postgres-backed store.
#[derive(Clone, Debug)]
pub struct PgStore {
    config: tokio_postgres::Config,
    label: String,
}

impl PgStore {
    pub fn new(params: &DbParams) -> Self {
        Self {
            config: params.pg_config(),
            label: format!("{}:{}/{}", params.host, params.port, params.db),
        }
    }

    /// From a `postgres://` URL or a `key=value` connection string.
    pub fn from_url(url: &str) -> Result<Self> {
        let config: tokio_postgres::Config = url
            .parse()
            .map_err(|err| Error::Config(format!("invalid connection string, error({err})")))?;
        let host = match config.get_hosts().first() {
            Some(tokio_postgres::config::Host::Tcp(host)) => host.as_str(),
            _ => "localhost",
        };
        let label = format!("{host}/{}", config.get_dbname().unwrap_or("postgres"));
        Ok(Self { config, label })
    }

    /// Opens a connection; the returned handle drives it until the client is dropped.
    pub async fn connect(&self) -> Result<Connection> {
        trace!("connecting to {} ...", self.label);
        let (client, conn) = self.config.connect(NoTls).await.map_err(|err| {
            error!("{} connection error: {err}", self.label);
            Error::from(err)
        })?;

        let label = self.label.clone();
        let driver = tokio::spawn(async move {
            if let Err(err) = conn.await {
                error!("{label} connection error: {err}");
            }
        });
        debug!("{} connection established", self.label);

        Ok(Connection { client, driver })
    }

    /// Runs a batch of plain statements (no parameters) on a scoped connection.
    pub async fn batch_execute(&self, sql: &str) -> Result<()> {
        let conn = self.connect().await?;
        let result = conn.client.batch_execute(sql).await.map_err(Error::from);
        conn.close().await;
        result
    }
}

/// A client plus the task driving its socket. Dropping the client closes the socket, which
/// ends the task.
pub struct Connection {
    pub client: PgClient,
    driver: JoinHandle<()>,
}

impl Connection {
    /// Closes the connection and waits for the driver task to finish.
    pub async fn close(self) {
        let Connection { client, driver } = self;
        drop(client);
        let _ = driver.await;
    }
}

#[async_trait]
impl Upsert for PgStore {
    async fn upsert(&self, request: UpsertRequest) -> Result<u64> {
        let time = std::time::Instant::now();
        let statements = request.statements()?;

        let mut conn = self.connect().await?;
        let result = async {
            let transaction = conn.client.transaction().await?;
            let mut inserted = 0;
            for statement in &statements {
                let params: Vec<&(dyn ToSql + Sync)> = statement
                    .params
                    .iter()
                    .map(|value| *value as &(dyn ToSql + Sync))
                    .collect();
                inserted += transaction.execute(statement.sql.as_str(), &params).await?;
            }
            transaction.commit().await?;
            Ok::<u64, tokio_postgres::Error>(inserted)
        }
        .await
        .map_err(|err| {
            error!(
                "failed to upsert {} records into {}, error({err})",
                request.records().len(),
                request.table()
            );
            Error::from(err)
        });
        conn.close().await;

        let inserted = result?;
        debug!(
            "{inserted}/{} records merged into {}. {}",
            request.records().len(),
            request.table(),
            crate::time_elapsed(time)
        );
        Ok(inserted)
    }
}
