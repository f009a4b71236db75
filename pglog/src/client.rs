use std::future::Future;

use config::shared::WriterConfig;
use postgres::escape::escape_identifier;
use postgres::types::TextParam;
use tokio_postgres::config::Host;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Connection, NoTls, Socket, Statement};
use tracing::{Instrument, debug, error, info};

use crate::conversions::EncodedParam;
use crate::error::PgLogResult;

/// Opens database connections for log streams.
pub trait PgConnector: Send + Sync {
    /// Connection handed out by this connector.
    type Connection: PgConnection;

    /// Opens a new connection described by `config`.
    fn connect(
        &self,
        config: &WriterConfig,
    ) -> impl Future<Output = PgLogResult<Self::Connection>> + Send;
}

/// A connection exclusively owned by one log stream.
///
/// The connection is released when the value is dropped.
pub trait PgConnection: Send + Sync {
    /// Server side handle of a prepared statement.
    type Statement: Send + Sync;

    /// Escapes an identifier for embedding in statement text.
    fn escape_identifier(&self, identifier: &str) -> PgLogResult<String> {
        Ok(escape_identifier(identifier)?)
    }

    /// Executes one or more statements that take no parameters.
    fn batch_execute(&self, query: &str) -> impl Future<Output = PgLogResult<()>> + Send;

    /// Prepares `query` on the server.
    fn prepare(&self, query: &str) -> impl Future<Output = PgLogResult<Self::Statement>> + Send;

    /// Executes a prepared statement with text format parameters, returning the affected rows.
    fn execute(
        &self,
        statement: &Self::Statement,
        params: &[EncodedParam],
    ) -> impl Future<Output = PgLogResult<u64>> + Send;
}

/// Spawns the task driving `connection` in the background.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        match connection.await {
            Err(err) => error!(%err, "postgres connection failed"),
            Ok(()) => debug!("postgres connection closed"),
        }
    }
    .instrument(span);

    // The task ends by itself once the owning `Client` is dropped.
    tokio::spawn(task);
}

/// Connector backed by `tokio-postgres`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPgConnector;

impl PgConnector for TokioPgConnector {
    type Connection = TokioPgConnection;

    async fn connect(&self, config: &WriterConfig) -> PgLogResult<TokioPgConnection> {
        let options = config.connect_options()?;

        let hosts = options
            .get_hosts()
            .iter()
            .map(|host| match host {
                Host::Tcp(name) => name.clone(),
                #[cfg(unix)]
                Host::Unix(path) => path.display().to_string(),
            })
            .chain(options.get_hostaddrs().iter().map(ToString::to_string))
            .collect::<Vec<_>>()
            .join(",");
        let dbname = options.get_dbname().unwrap_or_default().to_string();

        let (client, connection) = options.connect(NoTls).await?;
        spawn_postgres_connection::<NoTls>(connection);

        info!(%hosts, %dbname, "connected to postgres");

        Ok(TokioPgConnection { client })
    }
}

/// A `tokio-postgres` client owned by one stream.
#[derive(Debug)]
pub struct TokioPgConnection {
    client: Client,
}

impl PgConnection for TokioPgConnection {
    type Statement = Statement;

    async fn batch_execute(&self, query: &str) -> PgLogResult<()> {
        self.client.batch_execute(query).await?;
        Ok(())
    }

    async fn prepare(&self, query: &str) -> PgLogResult<Statement> {
        Ok(self.client.prepare(query).await?)
    }

    async fn execute(&self, statement: &Statement, params: &[EncodedParam]) -> PgLogResult<u64> {
        let params = params
            .iter()
            .map(EncodedParam::as_text_param)
            .collect::<Vec<TextParam<'_>>>();
        let refs = params
            .iter()
            .map(|param| param as &(dyn ToSql + Sync))
            .collect::<Vec<_>>();

        Ok(self.client.execute(statement, &refs).await?)
    }
}
