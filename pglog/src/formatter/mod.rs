//! Serialization of a whole record into one parameter for literal table layouts.

mod ascii;
mod json;

use config::shared::RecordFormat;

use crate::bail;
use crate::error::{ErrorKind, PgLogResult};
use crate::types::{Field, Value};

pub use ascii::format_ascii;
pub use json::{format_json, record_to_json};

/// Formatter selected for a stream at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormatter {
    Json,
    Ascii,
}

impl RecordFormatter {
    /// Returns the formatter matching the configured format.
    pub fn new(format: RecordFormat) -> RecordFormatter {
        match format {
            RecordFormat::Json => RecordFormatter::Json,
            RecordFormat::Ascii => RecordFormatter::Ascii,
        }
    }

    /// Returns the column type able to hold the output of this formatter.
    pub fn column_type(&self) -> &'static str {
        match self {
            RecordFormatter::Json => "jsonb",
            RecordFormatter::Ascii => "text",
        }
    }

    /// Serializes one record.
    ///
    /// `fields` and `values` must have the same length and order.
    pub fn format(&self, fields: &[Field], values: &[Value]) -> PgLogResult<Vec<u8>> {
        if fields.len() != values.len() {
            bail!(
                ErrorKind::InvalidState,
                "Record does not match the stream schema",
                format!("{} fields but {} values", fields.len(), values.len())
            );
        }

        match self {
            RecordFormatter::Json => format_json(fields, values),
            RecordFormatter::Ascii => format_ascii(values),
        }
    }
}

/// Appends `bytes` to `out`, writing every byte rejected by `needs_escape` and every byte that
/// is not part of valid UTF-8 as `\xNN`.
pub(crate) fn push_escaped(bytes: &[u8], out: &mut String, needs_escape: impl Fn(char) -> bool) {
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            if needs_escape(c) {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    push_hex(byte, out);
                }
            } else {
                out.push(c);
            }
        }

        for &byte in chunk.invalid() {
            push_hex(byte, out);
        }
    }
}

fn push_hex(byte: u8, out: &mut String) {
    out.push_str(&format!("\\x{byte:02x}"));
}
