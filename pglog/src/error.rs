//! The log writer's error type.
//!
//! Every failure has an [`ErrorKind`] and a fixed description of the step that failed. Failures
//! reported by the database also keep the server message as detail. That message is what gets
//! logged, so it is stored unchanged.

use std::backtrace::Backtrace;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use tokio_postgres::error::SqlState;

/// Result alias used throughout the writer.
pub type PgLogResult<T> = Result<T, PgLogError>;

/// Classification of writer failures.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    DestinationConnectionFailed,
    AuthenticationError,
    DestinationQueryFailed,
    DestinationSchemaError,
    DestinationOperationCanceled,
    DestinationIoError,
    DestinationError,
    InvalidIdentifier,
    UnsupportedType,
    ConversionError,
    InvalidData,
    ValidationError,
    ConfigError,
    SerializationError,
    InvalidState,
}

/// Error raised while opening a stream or writing a record.
///
/// Cloning is cheap: the source and the backtrace are shared.
#[derive(Debug, Clone)]
pub struct PgLogError {
    inner: Box<Inner>,
}

#[derive(Debug, Clone)]
struct Inner {
    kind: ErrorKind,
    description: &'static str,
    detail: Option<String>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

impl PgLogError {
    /// Creates an error without detail, recording the caller's location.
    #[track_caller]
    pub fn new(kind: ErrorKind, description: &'static str) -> Self {
        Self {
            inner: Box::new(Inner {
                kind,
                description,
                detail: None,
                source: None,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    /// Sets the dynamic part of the message.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.inner.detail = Some(detail.into());
        self
    }

    /// Sets the error this one was caused by.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.inner.source = Some(Arc::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    /// Fixed description of the failed step, e.g. `"Failed to create table"`.
    pub fn description(&self) -> &str {
        self.inner.description
    }

    /// Server message or other runtime context, if any.
    pub fn detail(&self) -> Option<&str> {
        self.inner.detail.as_deref()
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.inner.location
    }

    /// Backtrace captured at construction. Empty unless `RUST_BACKTRACE` is set.
    pub fn backtrace(&self) -> &Backtrace {
        &self.inner.backtrace
    }

    #[track_caller]
    fn caused_by<E>(kind: ErrorKind, description: &'static str, detail: String, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        Self::new(kind, description)
            .with_detail(detail)
            .with_source(err)
    }
}

impl fmt::Display for PgLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = &self.inner;
        write!(f, "{} ({:?})", inner.description, inner.kind)?;
        if let Some(detail) = &inner.detail {
            write!(f, ": {detail}")?;
        }

        write!(f, " at {}:{}", inner.location.file(), inner.location.line())
    }
}

impl error::Error for PgLogError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.inner
            .source
            .as_deref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

impl From<serde_json::Error> for PgLogError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        let detail = err.to_string();
        Self::caused_by(
            ErrorKind::SerializationError,
            "Failed to serialize record as JSON",
            detail,
            err,
        )
    }
}

impl From<config::shared::ValidationError> for PgLogError {
    #[track_caller]
    fn from(err: config::shared::ValidationError) -> Self {
        let detail = err.to_string();
        Self::caused_by(
            ErrorKind::ConfigError,
            "Invalid writer configuration",
            detail,
            err,
        )
    }
}

impl From<postgres::escape::EscapeError> for PgLogError {
    #[track_caller]
    fn from(err: postgres::escape::EscapeError) -> Self {
        let detail = err.to_string();
        Self::caused_by(
            ErrorKind::InvalidIdentifier,
            "Failed to escape identifier",
            detail,
            err,
        )
    }
}

impl From<tokio_postgres::Error> for PgLogError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> Self {
        let (kind, description) = classify(err.code());
        let detail = match err.as_db_error() {
            Some(db_error) => db_error.message().to_string(),
            None => err.to_string(),
        };

        Self::caused_by(kind, description, detail, err)
    }
}

/// Missing or renamed schema objects inside class 42, which otherwise holds syntax and
/// privilege errors.
const SCHEMA_OBJECT_STATES: &[SqlState] = &[
    SqlState::UNDEFINED_TABLE,
    SqlState::UNDEFINED_COLUMN,
    SqlState::UNDEFINED_OBJECT,
    SqlState::DUPLICATE_COLUMN,
    SqlState::DUPLICATE_SCHEMA,
    SqlState::DATATYPE_MISMATCH,
];

/// Maps a SQLSTATE to a kind, mostly by its two character class.
///
/// Errors without a SQLSTATE never reached the server.
fn classify(state: Option<&SqlState>) -> (ErrorKind, &'static str) {
    let Some(state) = state else {
        return (
            ErrorKind::DestinationConnectionFailed,
            "PostgreSQL connection failed",
        );
    };

    if *state == SqlState::DISK_FULL || *state == SqlState::IO_ERROR {
        return (ErrorKind::DestinationIoError, "PostgreSQL I/O error");
    }
    if SCHEMA_OBJECT_STATES.contains(state) {
        return (
            ErrorKind::DestinationSchemaError,
            "PostgreSQL schema object error",
        );
    }

    match state.code().get(..2).unwrap_or_default() {
        "08" | "53" => (
            ErrorKind::DestinationConnectionFailed,
            "PostgreSQL connection failed",
        ),
        "28" => (
            ErrorKind::AuthenticationError,
            "PostgreSQL authentication failed",
        ),
        "22" => (
            ErrorKind::ConversionError,
            "PostgreSQL data conversion failed",
        ),
        "23" => (
            ErrorKind::ValidationError,
            "PostgreSQL constraint violation",
        ),
        "3F" => (
            ErrorKind::DestinationSchemaError,
            "PostgreSQL schema object error",
        ),
        "42" => (
            ErrorKind::DestinationQueryFailed,
            "PostgreSQL rejected the statement",
        ),
        "57" => (
            ErrorKind::DestinationOperationCanceled,
            "PostgreSQL operation canceled",
        ),
        _ => (ErrorKind::DestinationError, "PostgreSQL error"),
    }
}
