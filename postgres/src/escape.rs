use std::fmt;

use pg_escape::quote_identifier;
use thiserror::Error;

/// Errors raised when a name cannot be turned into a safe Postgres identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EscapeError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier {0:?} contains a nul character")]
    NulCharacter(String),
}

/// Escapes `identifier` so it can be embedded in DDL or DML text.
///
/// Postgres cannot store a nul byte inside an identifier and an empty quoted
/// identifier (`""`) is rejected by the parser, so both are reported as errors
/// instead of producing text that would fail later on the server.
pub fn escape_identifier(identifier: &str) -> Result<String, EscapeError> {
    if identifier.is_empty() {
        return Err(EscapeError::Empty);
    }

    if identifier.contains('\0') {
        return Err(EscapeError::NulCharacter(identifier.to_owned()));
    }

    Ok(quote_identifier(identifier).into_owned())
}

/// Destination table of a log stream, optionally qualified with a schema.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableName {
    /// Schema containing the table, `None` means the connection's search path.
    pub schema: Option<String>,
    /// Unqualified table name, usually the stream path.
    pub name: String,
}

impl TableName {
    /// Creates a new [`TableName`].
    pub fn new(schema: Option<String>, name: String) -> TableName {
        Self { schema, name }
    }

    /// Returns the table name as an escaped, optionally schema-qualified identifier.
    pub fn as_quoted_identifier(&self) -> Result<String, EscapeError> {
        self.quote_with(escape_identifier)
    }

    /// Like [`TableName::as_quoted_identifier`] but escapes each part with `escape`.
    ///
    /// The name is escaped before the schema.
    pub fn quote_with<F, E>(&self, escape: F) -> Result<String, E>
    where
        F: Fn(&str) -> Result<String, E>,
    {
        let quoted_name = escape(&self.name)?;

        match &self.schema {
            Some(schema) => {
                let quoted_schema = escape(schema)?;
                Ok(format!("{quoted_schema}.{quoted_name}"))
            }
            None => Ok(quoted_name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
