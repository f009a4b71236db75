use std::fmt;
use std::str::FromStr;

use secrecy::Secret;
use serde::Deserialize;
use serde::de::value::{Error as ValueError, MapDeserializer};

use crate::shared::ValidationError;

/// Option holding the libpq-style connection string.
pub const CONNINFO_OPTION: &str = "conninfo";
/// Option that keeps the stream alive when a record cannot be written.
pub const CONTINUE_ON_ERRORS_OPTION: &str = "continue_on_errors";

/// Value of [`CONTINUE_ON_ERRORS_OPTION`] that enables the behavior.
const TRUTHY_VALUE: &str = "T";

/// Connection string kept out of debug output.
pub type ConnInfo = Secret<String>;

/// Serialization of a whole record into the single parameter of a literal insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordFormat {
    /// One JSON object keyed by field name.
    #[default]
    Json,
    /// One tab separated line.
    Ascii,
}

impl RecordFormat {
    /// Returns the option value naming this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordFormat::Json => "json",
            RecordFormat::Ascii => "ascii",
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(RecordFormat::Json),
            "ascii" => Ok(RecordFormat::Ascii),
            other => Err(ValidationError::InvalidFieldValue {
                field: "format".to_string(),
                constraint: format!("`{other}` is not a supported format, use `json` or `ascii`"),
            }),
        }
    }
}

/// Shape of a literal table when the whole record is stored as one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralLayout {
    /// Table body and insert shape are supplied verbatim.
    Statements {
        /// Body of `CREATE TABLE (...)`.
        columns: String,
        /// Column list of the insert.
        indexes: String,
        /// Value expressions of the insert, referencing `$1`.
        values: String,
    },
    /// A single column receives the formatted record.
    DataColumn {
        /// Unescaped name of the column.
        name: String,
    },
}

/// How the destination table and its insert statement are built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableLayout {
    /// One column and one positional parameter per field descriptor.
    Derived,
    /// Configuration supplied text, executed with the formatted record as the only parameter.
    Literal(LiteralLayout),
}

/// Options exactly as the host passes them.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct RawWriterOptions {
    conninfo: String,
    continue_on_errors: String,
    schema: String,
    columns: String,
    indexes: String,
    values: String,
    datacolumn: String,
    format: String,
}

/// Validated configuration of one log stream.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Connection string. Sensitive and redacted in debug output.
    pub conninfo: ConnInfo,
    /// Whether failed records are logged and skipped instead of failing the stream.
    pub continue_on_errors: bool,
    /// Schema the destination table is created in.
    pub schema: Option<String>,
    /// Table and insert construction strategy.
    pub layout: TableLayout,
    /// Record serialization used by [`TableLayout::Literal`].
    pub format: RecordFormat,
}

impl WriterConfig {
    /// Builds a [`WriterConfig`] from the host's string options.
    ///
    /// Unknown keys are ignored since the host may pass options meant for other writers.
    pub fn from_options<'a, I>(options: I) -> Result<WriterConfig, ValidationError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let deserializer = MapDeserializer::<_, ValueError>::new(options.into_iter());
        let raw = RawWriterOptions::deserialize(deserializer)
            .map_err(|err| ValidationError::MalformedOptions(err.to_string()))?;

        validate(raw)
    }
}

fn validate(raw: RawWriterOptions) -> Result<WriterConfig, ValidationError> {
    if raw.conninfo.trim().is_empty() {
        return Err(ValidationError::MissingOption(CONNINFO_OPTION));
    }

    let format = match non_empty(raw.format) {
        Some(format) => format.parse()?,
        None => RecordFormat::default(),
    };

    let layout = build_layout(
        non_empty(raw.columns),
        non_empty(raw.indexes),
        non_empty(raw.values),
        non_empty(raw.datacolumn),
    )?;

    Ok(WriterConfig {
        conninfo: Secret::new(raw.conninfo),
        continue_on_errors: raw.continue_on_errors == TRUTHY_VALUE,
        schema: non_empty(raw.schema),
        layout,
        format,
    })
}

fn build_layout(
    columns: Option<String>,
    indexes: Option<String>,
    values: Option<String>,
    datacolumn: Option<String>,
) -> Result<TableLayout, ValidationError> {
    match (columns, datacolumn) {
        (Some(_), Some(_)) => Err(invalid(
            "datacolumn",
            "cannot be combined with `columns`",
        )),
        (Some(columns), None) => {
            let indexes =
                indexes.ok_or_else(|| invalid("indexes", "required when `columns` is set"))?;
            let values =
                values.ok_or_else(|| invalid("values", "required when `columns` is set"))?;

            Ok(TableLayout::Literal(LiteralLayout::Statements {
                columns,
                indexes,
                values,
            }))
        }
        (None, Some(name)) => {
            if indexes.is_some() || values.is_some() {
                return Err(invalid(
                    "datacolumn",
                    "`indexes` and `values` are only used together with `columns`",
                ));
            }

            Ok(TableLayout::Literal(LiteralLayout::DataColumn { name }))
        }
        (None, None) => {
            if indexes.is_some() || values.is_some() {
                return Err(invalid("columns", "required when `indexes` or `values` is set"));
            }

            Ok(TableLayout::Derived)
        }
    }
}

fn invalid(field: &str, constraint: &str) -> ValidationError {
    ValidationError::InvalidFieldValue {
        field: field.to_string(),
        constraint: constraint.to_string(),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
