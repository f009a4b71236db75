use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{ErrorKind, PgLogResult};
use crate::formatter::push_escaped;
use crate::pglog_error;
use crate::types::{Field, Payload, TypeTag, Value};

/// Serializes a record into a JSON object keyed by field name, in field order.
///
/// Absent fields are left out of the object.
pub fn record_to_json(fields: &[Field], values: &[Value]) -> PgLogResult<JsonValue> {
    let mut map = Map::with_capacity(fields.len());
    for (field, value) in fields.iter().zip(values.iter()) {
        if !value.present {
            continue;
        }

        map.insert(field.name.clone(), value_to_json(value)?);
    }

    Ok(JsonValue::Object(map))
}

/// Serializes a record into the bytes of a JSON object, see [`record_to_json`].
pub fn format_json(fields: &[Field], values: &[Value]) -> PgLogResult<Vec<u8>> {
    let object = record_to_json(fields, values)?;
    Ok(serde_json::to_vec(&object)?)
}

/// Converts a [`Value`] to its JSON representation.
///
/// Special cases:
/// - absent values (container elements only) → `null`
/// - non-finite doubles → string (`"NaN"`, `"Infinity"`, `"-Infinity"`)
/// - bytes that are not valid UTF-8 → `\xNN` inside the string
fn value_to_json(value: &Value) -> PgLogResult<JsonValue> {
    if !value.present {
        return Ok(JsonValue::Null);
    }

    let json = match (value.type_tag, &value.payload) {
        (TypeTag::Bool, Payload::Bool(b)) => JsonValue::Bool(*b),
        (TypeTag::Int, Payload::Int(i)) => JsonValue::Number((*i).into()),
        (TypeTag::Count | TypeTag::Counter, Payload::Count(c)) => JsonValue::Number((*c).into()),
        (TypeTag::Port, Payload::Port(port)) => JsonValue::Number(port.number.into()),
        (TypeTag::Time | TypeTag::Interval | TypeTag::Double, Payload::Double(d)) => {
            f64_to_json(*d)
        }
        (TypeTag::Addr, Payload::Addr(addr)) => JsonValue::String(addr.to_string()),
        (TypeTag::Subnet, Payload::Subnet(subnet)) => JsonValue::String(subnet.to_string()),
        (
            TypeTag::Enum | TypeTag::String | TypeTag::File | TypeTag::Func,
            Payload::String(bytes),
        ) => {
            let mut text = String::with_capacity(bytes.len());
            push_escaped(bytes, &mut text, |_| false);
            JsonValue::String(text)
        }
        (TypeTag::Table | TypeTag::Vector, Payload::Sequence(elements)) => JsonValue::Array(
            elements
                .iter()
                .map(value_to_json)
                .collect::<PgLogResult<Vec<_>>>()?,
        ),
        (type_tag, payload) => {
            return Err(pglog_error!(
                ErrorKind::ConversionError,
                "Value cannot be formatted as JSON",
                format!("{type_tag} value carries {payload:?}")
            ));
        }
    };

    Ok(json)
}

fn f64_to_json(v: f64) -> JsonValue {
    if v.is_nan() {
        JsonValue::String("NaN".into())
    } else if v == f64::INFINITY {
        JsonValue::String("Infinity".into())
    } else if v == f64::NEG_INFINITY {
        JsonValue::String("-Infinity".into())
    } else {
        Number::from_f64(v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use serde_json::json;

    use super::*;
    use crate::types::TransportProto;

    fn conn_fields() -> Vec<Field> {
        vec![
            Field::new("ts", TypeTag::Time),
            Field::new("uid", TypeTag::String),
            Field::new("id.orig_h", TypeTag::Addr),
            Field::new("id.orig_p", TypeTag::Port),
            Field::new("local_orig", TypeTag::Bool),
            Field::container("tunnel_parents", TypeTag::Table, TypeTag::String),
        ]
    }

    #[test]
    fn record_serializes_in_field_order() {
        let values = vec![
            Value::time(1.5),
            Value::string("CHhAvVGS1DHFjwGM9"),
            Value::addr(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            Value::port(80, TransportProto::Tcp),
            Value::bool(false),
            Value::set(vec![Value::string("a")]),
        ];

        let bytes = format_json(&conn_fields(), &values).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"ts":1.5,"uid":"CHhAvVGS1DHFjwGM9","id.orig_h":"10.0.0.1","id.orig_p":80,"local_orig":false,"tunnel_parents":["a"]}"#
        );
    }

    #[test]
    fn absent_fields_are_omitted() {
        let values = vec![
            Value::time(2.0),
            Value::absent(TypeTag::String),
            Value::absent(TypeTag::Addr),
            Value::absent(TypeTag::Port),
            Value::absent(TypeTag::Bool),
            Value::set(vec![]),
        ];

        let json = record_to_json(&conn_fields(), &values).unwrap();
        assert_eq!(json, json!({"ts": 2.0, "tunnel_parents": []}));
    }

    #[test]
    fn special_values() {
        let fields = vec![
            Field::new("nan", TypeTag::Double),
            Field::new("inf", TypeTag::Interval),
            Field::new("raw", TypeTag::String),
            Field::container("counts", TypeTag::Vector, TypeTag::Count),
        ];
        let values = vec![
            Value::double(f64::NAN),
            Value::interval(f64::NEG_INFINITY),
            Value::string(b"\xffok".to_vec()),
            Value::vector(vec![Value::count(1), Value::absent(TypeTag::Count)]),
        ];

        let json = record_to_json(&fields, &values).unwrap();
        assert_eq!(
            json,
            json!({"nan": "NaN", "inf": "-Infinity", "raw": "\\xffok", "counts": [1, null]})
        );
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        let fields = vec![Field::new("n", TypeTag::Count)];
        let values = vec![Value::new(TypeTag::Count, Payload::Int(-1))];

        let err = format_json(&fields, &values).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }
}
