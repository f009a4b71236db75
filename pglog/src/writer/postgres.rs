use config::shared::WriterConfig;
use tracing::{debug, error, info};

use crate::bail;
use crate::client::{PgConnection, PgConnector, TokioPgConnector};
use crate::conversions::{EncodedParam, encode_value};
use crate::error::{ErrorKind, PgLogError, PgLogResult};
use crate::statement::{InsertShape, StreamStatements, build_statements};
use crate::types::{Field, Value};
use crate::writer::{WriterBackend, WriterInfo};

/// State of an initialized stream.
struct StreamState<P: PgConnection> {
    connection: P,
    insert: P::Statement,
    statements: StreamStatements,
    field_count: usize,
    continue_on_errors: bool,
}

/// Writer storing every record of a log stream as one row of a Postgres table.
///
/// On [`WriterBackend::init`] the writer connects, creates the schema and table if needed and
/// prepares the insert. Every [`WriterBackend::write`] then costs exactly one round trip.
///
/// The connection is owned by the writer and released when the writer is dropped, or right
/// away when initialization fails.
pub struct PostgresWriter<C: PgConnector = TokioPgConnector> {
    connector: C,
    state: Option<StreamState<C::Connection>>,
}

impl PostgresWriter<TokioPgConnector> {
    /// Creates a writer connecting through `tokio-postgres`.
    pub fn new() -> Self {
        Self::with_connector(TokioPgConnector)
    }
}

impl Default for PostgresWriter<TokioPgConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PgConnector> PostgresWriter<C> {
    /// Creates a writer opening its connection through `connector`.
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            state: None,
        }
    }

    /// Returns the statements of the stream, `None` before a successful initialization.
    pub fn statements(&self) -> Option<&StreamStatements> {
        self.state.as_ref().map(|state| &state.statements)
    }

    /// Returns whether the stream was initialized.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    async fn open_stream(
        &self,
        info: &WriterInfo,
        fields: &[Field],
    ) -> PgLogResult<StreamState<C::Connection>> {
        let config = WriterConfig::from_options(info.options())?;
        let connection = self.connector.connect(&config).await?;

        let statements = build_statements(&info.path, fields, &config, |identifier| {
            connection.escape_identifier(identifier)
        })?;

        if let Some(create_schema) = &statements.create_schema {
            connection
                .batch_execute(create_schema)
                .await
                .inspect_err(|err| {
                    error!(schema = ?config.schema, error = detail(err), "could not create schema")
                })?;
        }

        connection
            .batch_execute(&statements.create_table)
            .await
            .inspect_err(|err| {
                error!(
                    table = %statements.table_name,
                    error = detail(err),
                    "could not create table"
                )
            })?;

        let insert = connection
            .prepare(&statements.insert)
            .await
            .inspect_err(|err| {
                error!(
                    table = %statements.table_name,
                    error = detail(err),
                    "could not prepare insert statement"
                )
            })?;

        Ok(StreamState {
            connection,
            insert,
            statements,
            field_count: fields.len(),
            continue_on_errors: config.continue_on_errors,
        })
    }
}

impl<C: PgConnector> WriterBackend for PostgresWriter<C> {
    fn name() -> &'static str {
        "postgres"
    }

    async fn init(&mut self, info: &WriterInfo, fields: &[Field]) -> PgLogResult<()> {
        if self.state.is_some() {
            bail!(
                ErrorKind::InvalidState,
                "Writer is already initialized",
                &info.path
            );
        }

        // A connection opened by a failed attempt is dropped together with the error.
        let state = self.open_stream(info, fields).await.inspect_err(|err| {
            error!(path = %info.path, error = %err, "could not initialize postgres writer")
        })?;

        info!(
            table = %state.statements.table_name,
            fields = fields.len(),
            "postgres writer initialized"
        );
        self.state = Some(state);

        Ok(())
    }

    async fn write(&mut self, fields: &[Field], values: &[Value]) -> PgLogResult<()> {
        let Some(state) = &self.state else {
            bail!(ErrorKind::InvalidState, "Writer is not initialized");
        };

        if fields.len() != state.field_count || values.len() != state.field_count {
            bail!(
                ErrorKind::InvalidState,
                "Record does not match the stream schema",
                format!(
                    "stream has {} fields, record has {} fields and {} values",
                    state.field_count,
                    fields.len(),
                    values.len()
                )
            );
        }

        let params = match encode_params(state.statements.shape, fields, values) {
            Ok(params) => params,
            Err(err) => {
                error!(
                    table = %state.statements.table_name,
                    error = detail(&err),
                    "could not encode record"
                );
                return skip_or_fail(state.continue_on_errors, err);
            }
        };

        match state.connection.execute(&state.insert, &params).await {
            Ok(_) => Ok(()),
            Err(err) => {
                error!(
                    table = %state.statements.table_name,
                    error = detail(&err),
                    "could not insert record"
                );
                skip_or_fail(state.continue_on_errors, err)
            }
        }
    }

    async fn rotate(
        &mut self,
        rotated_path: &str,
        _open: f64,
        _close: f64,
        terminating: bool,
    ) -> PgLogResult<()> {
        debug!(rotated_path, terminating, "rotation requested, table is kept");
        Ok(())
    }

    async fn finish(&mut self, _network_time: f64) -> PgLogResult<()> {
        if let Some(state) = &self.state {
            debug!(table = %state.statements.table_name, "stream finished");
        }

        Ok(())
    }
}

impl<C: PgConnector> Drop for PostgresWriter<C> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            debug!(table = %state.statements.table_name, "releasing postgres connection");
        }
    }
}

/// Turns a record into the parameters of the stream's insert.
fn encode_params(
    shape: InsertShape,
    fields: &[Field],
    values: &[Value],
) -> PgLogResult<Vec<EncodedParam>> {
    let params = match shape {
        InsertShape::Positional { .. } => values
            .iter()
            .map(encode_value)
            .collect::<PgLogResult<Vec<_>>>()?,
        InsertShape::Record(formatter) => {
            vec![EncodedParam::Text(formatter.format(fields, values)?)]
        }
    };

    if params.len() != shape.param_count() {
        bail!(
            ErrorKind::InvalidState,
            "Parameter count does not match the insert statement",
            format!("expected {}, got {}", shape.param_count(), params.len())
        );
    }

    Ok(params)
}

fn skip_or_fail(continue_on_errors: bool, err: PgLogError) -> PgLogResult<()> {
    if continue_on_errors {
        Ok(())
    } else {
        Err(err)
    }
}

/// Returns the most specific text of `err`, which is the server message for database errors.
fn detail(err: &PgLogError) -> &str {
    err.detail().unwrap_or(err.description())
}
