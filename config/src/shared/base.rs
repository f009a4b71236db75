use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required option is absent or empty.
    #[error("`{0}` must be set")]
    MissingOption(&'static str),
    /// The options map could not be deserialized.
    #[error("Invalid writer options: {0}")]
    MalformedOptions(String),
    /// The connection string could not be parsed.
    #[error("Invalid `conninfo`: {0}")]
    InvalidConnInfo(String),
    /// An option has a value that violates a constraint.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
