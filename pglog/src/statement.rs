//! Construction of the DDL and insert statement of a log stream.
//!
//! Everything is built up front from the stream path, the field descriptors and the
//! configured layout, so a stream either gets a complete set of statements or none at all.

use config::shared::{LiteralLayout, TableLayout, WriterConfig};
use postgres::escape::TableName;

use crate::conversions::column_type;
use crate::error::PgLogResult;
use crate::formatter::RecordFormatter;
use crate::types::Field;

/// Auto-increment column leading every table the writer derives itself.
const ID_COLUMN: &str = "id";
const ID_COLUMN_DEFINITION: &str = "id SERIAL UNIQUE NOT NULL";

/// How records are turned into insert parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertShape {
    /// One text parameter per field, in field order.
    Positional { params: usize },
    /// A single parameter holding the whole formatted record.
    Record(RecordFormatter),
}

impl InsertShape {
    /// Returns the number of parameters every execution of the insert binds.
    pub fn param_count(&self) -> usize {
        match self {
            InsertShape::Positional { params } => *params,
            InsertShape::Record(_) => 1,
        }
    }
}

/// Statements of one log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStatements {
    /// Destination table, unescaped.
    pub table_name: TableName,
    /// Escaped and optionally schema-qualified destination table.
    pub table: String,
    /// `CREATE SCHEMA` statement, when a schema is configured.
    pub create_schema: Option<String>,
    /// `CREATE TABLE` statement.
    pub create_table: String,
    /// Insert executed once per record.
    pub insert: String,
    /// Parameters bound by [`StreamStatements::insert`].
    pub shape: InsertShape,
}

/// Builds the statements of the stream writing to `path`.
///
/// Identifiers go through `escape`. The stream path is escaped first, so an unusable path is
/// reported before anything else is looked at.
pub fn build_statements<F>(
    path: &str,
    fields: &[Field],
    config: &WriterConfig,
    escape: F,
) -> PgLogResult<StreamStatements>
where
    F: Fn(&str) -> PgLogResult<String>,
{
    let table_name = TableName::new(config.schema.clone(), path.to_string());
    let table = table_name.quote_with(&escape)?;

    let create_schema = match &config.schema {
        Some(schema) => Some(format!("CREATE SCHEMA IF NOT EXISTS {}", escape(schema)?)),
        None => None,
    };

    let (body, insert, shape) = match &config.layout {
        TableLayout::Derived => derived_layout(&table, fields, &escape)?,
        TableLayout::Literal(LiteralLayout::Statements {
            columns,
            indexes,
            values,
        }) => (
            columns.clone(),
            format!("INSERT INTO {table} ({indexes}) VALUES ({values})"),
            InsertShape::Record(RecordFormatter::new(config.format)),
        ),
        TableLayout::Literal(LiteralLayout::DataColumn { name }) => {
            let formatter = RecordFormatter::new(config.format);
            let column = escape(name)?;
            let definition = format!("{column} {}", formatter.column_type());

            (
                if name == ID_COLUMN {
                    definition
                } else {
                    format!("{ID_COLUMN_DEFINITION}, {definition}")
                },
                format!("INSERT INTO {table} ({column}) VALUES ($1)"),
                InsertShape::Record(formatter),
            )
        }
    };

    Ok(StreamStatements {
        table_name,
        create_table: format!("CREATE TABLE IF NOT EXISTS {table} ({body})"),
        table,
        create_schema,
        insert,
        shape,
    })
}

/// Builds the table body and positional insert of a table derived from the fields.
fn derived_layout<F>(
    table: &str,
    fields: &[Field],
    escape: &F,
) -> PgLogResult<(String, String, InsertShape)>
where
    F: Fn(&str) -> PgLogResult<String>,
{
    let mut definitions = Vec::with_capacity(fields.len() + 1);
    if !fields.iter().any(|field| field.name == ID_COLUMN) {
        definitions.push(ID_COLUMN_DEFINITION.to_string());
    }

    let mut columns = Vec::with_capacity(fields.len());
    for field in fields {
        let column = escape(&field.name)?;
        let column_type = column_type(field.type_tag, field.subtype)?;

        definitions.push(format!("{column} {column_type}"));
        columns.push(column);
    }

    let insert = if columns.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES")
    } else {
        let placeholders = (1..=columns.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        )
    };

    Ok((
        definitions.join(", "),
        insert,
        InsertShape::Positional {
            params: fields.len(),
        },
    ))
}
