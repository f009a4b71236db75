use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use config::shared::WriterConfig;
use postgres::escape::escape_identifier;

use crate::client::{PgConnection, PgConnector};
use crate::conversions::EncodedParam;
use crate::error::{ErrorKind, PgLogResult};
use crate::{bail, pglog_error};

/// One execution of a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub statement: String,
    pub params: Vec<EncodedParam>,
}

impl Execution {
    /// Returns the parameters as strings, `None` for `NULL`.
    pub fn text_params(&self) -> Vec<Option<String>> {
        self.params
            .iter()
            .map(|param| {
                param
                    .as_bytes()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct Failures {
    connect: Option<String>,
    escape: Option<String>,
    batch: Option<String>,
    prepare: Option<String>,
    execute: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    failures: Failures,
    connections: usize,
    released: usize,
    batches: Vec<String>,
    prepared: Vec<String>,
    executions: Vec<Execution>,
}

/// In-memory connector for testing writers without a database.
///
/// [`MockConnector`] records every statement its connections receive and can be told to fail
/// specific operations. Clones share the same state, so a test keeps one clone for inspection
/// and hands the other to the writer.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<Inner>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next connection attempts fail with `message`.
    pub fn fail_connect(&self, message: &str) {
        self.lock().failures.connect = Some(message.to_string());
    }

    /// Makes escaping `identifier` fail.
    pub fn fail_escape(&self, identifier: &str) {
        self.lock().failures.escape = Some(identifier.to_string());
    }

    /// Makes batches containing `fragment` fail.
    pub fn fail_batch_containing(&self, fragment: &str) {
        self.lock().failures.batch = Some(fragment.to_string());
    }

    /// Makes preparing statements fail with `message`.
    pub fn fail_prepare(&self, message: &str) {
        self.lock().failures.prepare = Some(message.to_string());
    }

    /// Makes executions fail with `message` until [`MockConnector::succeed_executions`].
    pub fn fail_executions(&self, message: &str) {
        self.lock().failures.execute = Some(message.to_string());
    }

    pub fn succeed_executions(&self) {
        self.lock().failures.execute = None;
    }

    /// Returns the number of connections opened so far.
    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    /// Returns the number of connections released so far.
    pub fn released(&self) -> usize {
        self.lock().released
    }

    /// Returns every batch executed, in order.
    pub fn batches(&self) -> Vec<String> {
        self.lock().batches.clone()
    }

    /// Returns every statement prepared, in order.
    pub fn prepared(&self) -> Vec<String> {
        self.lock().prepared.clone()
    }

    /// Returns every successful execution, in order.
    pub fn executions(&self) -> Vec<Execution> {
        self.lock().executions.clone()
    }
}

impl PgConnector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, config: &WriterConfig) -> PgLogResult<MockConnection> {
        config.connect_options()?;

        let mut inner = self.lock();
        if let Some(message) = &inner.failures.connect {
            bail!(
                ErrorKind::DestinationConnectionFailed,
                "PostgreSQL connection failed",
                message
            );
        }
        inner.connections += 1;

        Ok(MockConnection {
            inner: self.inner.clone(),
        })
    }
}

/// Statement prepared by a [`MockConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockStatement {
    pub query: String,
    pub params: usize,
}

/// Connection handed out by [`MockConnector`]. Dropping it counts as a release.
#[derive(Debug)]
pub struct MockConnection {
    inner: Arc<Mutex<Inner>>,
}

impl MockConnection {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PgConnection for MockConnection {
    type Statement = MockStatement;

    fn escape_identifier(&self, identifier: &str) -> PgLogResult<String> {
        if self.lock().failures.escape.as_deref() == Some(identifier) {
            bail!(
                ErrorKind::InvalidIdentifier,
                "Failed to escape identifier",
                identifier
            );
        }

        Ok(escape_identifier(identifier)?)
    }

    async fn batch_execute(&self, query: &str) -> PgLogResult<()> {
        let mut inner = self.lock();
        if let Some(fragment) = &inner.failures.batch
            && query.contains(fragment.as_str())
        {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "PostgreSQL rejected the statement",
                format!("permission denied for {fragment}")
            );
        }

        inner.batches.push(query.to_string());
        Ok(())
    }

    async fn prepare(&self, query: &str) -> PgLogResult<MockStatement> {
        let mut inner = self.lock();
        if let Some(message) = &inner.failures.prepare {
            bail!(
                ErrorKind::DestinationSchemaError,
                "PostgreSQL schema object error",
                message
            );
        }

        inner.prepared.push(query.to_string());
        Ok(MockStatement {
            query: query.to_string(),
            params: placeholder_count(query),
        })
    }

    async fn execute(
        &self,
        statement: &MockStatement,
        params: &[EncodedParam],
    ) -> PgLogResult<u64> {
        let mut inner = self.lock();
        if let Some(message) = &inner.failures.execute {
            bail!(
                ErrorKind::ConversionError,
                "PostgreSQL data conversion failed",
                message
            );
        }

        if params.len() != statement.params {
            return Err(pglog_error!(
                ErrorKind::DestinationError,
                "PostgreSQL error",
                format!(
                    "expected {} parameters but got {}",
                    statement.params,
                    params.len()
                )
            ));
        }

        inner.executions.push(Execution {
            statement: statement.query.clone(),
            params: params.to_vec(),
        });
        Ok(1)
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.lock().released += 1;
    }
}

/// Returns the highest `$n` placeholder in `query`.
fn placeholder_count(query: &str) -> usize {
    query
        .split('$')
        .skip(1)
        .filter_map(|rest| {
            let digits = rest
                .chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>();
            digits.parse::<usize>().ok()
        })
        .max()
        .unwrap_or(0)
}
