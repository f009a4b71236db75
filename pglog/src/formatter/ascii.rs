use crate::conversions::format_double;
use crate::error::{ErrorKind, PgLogResult};
use crate::formatter::push_escaped;
use crate::pglog_error;
use crate::types::{Payload, TypeTag, Value};

const SEPARATOR: char = '\t';
const SET_SEPARATOR: char = ',';
const UNSET_FIELD: &str = "-";
const EMPTY_FIELD: &str = "(empty)";

/// Serializes a record into one tab separated line without a trailing newline.
///
/// Unset values are written as `-`, empty strings and containers as `(empty)` and container
/// elements are separated by `,`. Separators, control characters and backslashes inside
/// strings are written as `\xNN`.
pub fn format_ascii(values: &[Value]) -> PgLogResult<Vec<u8>> {
    let mut line = String::new();
    for (i, value) in values.iter().enumerate() {
        if i != 0 {
            line.push(SEPARATOR);
        }

        write_value(value, false, &mut line)?;
    }

    Ok(line.into_bytes())
}

fn write_value(value: &Value, in_container: bool, out: &mut String) -> PgLogResult<()> {
    if !value.present {
        out.push_str(UNSET_FIELD);
        return Ok(());
    }

    match (value.type_tag, &value.payload) {
        (TypeTag::Bool, Payload::Bool(b)) => out.push(if *b { 'T' } else { 'F' }),
        (TypeTag::Int, Payload::Int(i)) => out.push_str(&i.to_string()),
        (TypeTag::Count | TypeTag::Counter, Payload::Count(c)) => out.push_str(&c.to_string()),
        (TypeTag::Port, Payload::Port(port)) => out.push_str(&port.number.to_string()),
        (TypeTag::Time | TypeTag::Interval | TypeTag::Double, Payload::Double(d)) => {
            out.push_str(&format_double(*d))
        }
        (TypeTag::Addr, Payload::Addr(addr)) => out.push_str(&addr.to_string()),
        (TypeTag::Subnet, Payload::Subnet(subnet)) => out.push_str(&subnet.to_string()),
        (
            TypeTag::Enum | TypeTag::String | TypeTag::File | TypeTag::Func,
            Payload::String(bytes),
        ) => write_string(bytes, in_container, out),
        (TypeTag::Table | TypeTag::Vector, Payload::Sequence(elements)) => {
            if elements.is_empty() {
                out.push_str(EMPTY_FIELD);
                return Ok(());
            }

            for (i, element) in elements.iter().enumerate() {
                if i != 0 {
                    out.push(SET_SEPARATOR);
                }

                write_value(element, true, out)?;
            }
        }
        (type_tag, payload) => {
            return Err(pglog_error!(
                ErrorKind::ConversionError,
                "Value cannot be formatted as ASCII",
                format!("{type_tag} value carries {payload:?}")
            ));
        }
    }

    Ok(())
}

fn write_string(bytes: &[u8], in_container: bool, out: &mut String) {
    if bytes.is_empty() {
        out.push_str(EMPTY_FIELD);
        return;
    }

    // A literal "-" would read back as an unset field.
    if bytes == UNSET_FIELD.as_bytes() {
        out.push_str("\\x2d");
        return;
    }

    push_escaped(bytes, out, |c| {
        c == SEPARATOR || c == '\\' || c.is_control() || (in_container && c == SET_SEPARATOR)
    });
}
