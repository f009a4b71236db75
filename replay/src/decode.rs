use std::net::IpAddr;

use anyhow::{Context, anyhow, bail};
use pglog::types::{Field, TransportProto, TypeTag, Value};
use serde_json::Value as JsonValue;

/// Decodes one record, a JSON array holding one element per field.
///
/// `null` elements become absent values.
pub fn decode_record(fields: &[Field], line: &str) -> anyhow::Result<Vec<Value>> {
    let json: JsonValue = serde_json::from_str(line).context("record is not valid JSON")?;
    let JsonValue::Array(elements) = json else {
        bail!("record must be a JSON array");
    };

    if elements.len() != fields.len() {
        bail!(
            "record has {} values but the schema has {} fields",
            elements.len(),
            fields.len()
        );
    }

    fields
        .iter()
        .zip(elements.iter())
        .map(|(field, element)| {
            decode_value(field.type_tag, field.subtype, element)
                .with_context(|| format!("invalid value for field `{}`", field.name))
        })
        .collect()
}

fn decode_value(
    type_tag: TypeTag,
    subtype: Option<TypeTag>,
    json: &JsonValue,
) -> anyhow::Result<Value> {
    if json.is_null() {
        return Ok(Value::absent(type_tag));
    }

    let value = match type_tag {
        TypeTag::Bool => Value::bool(json.as_bool().ok_or_else(|| expected("a boolean"))?),
        TypeTag::Int => Value::int(json.as_i64().ok_or_else(|| expected("an integer"))?),
        TypeTag::Count | TypeTag::Counter => {
            let count = json
                .as_u64()
                .ok_or_else(|| expected("an unsigned integer"))?;
            Value {
                type_tag,
                ..Value::count(count)
            }
        }
        TypeTag::Port => decode_port(json)?,
        TypeTag::Time | TypeTag::Interval | TypeTag::Double => {
            let number = json.as_f64().ok_or_else(|| expected("a number"))?;
            Value {
                type_tag,
                ..Value::double(number)
            }
        }
        TypeTag::Addr => Value::addr(as_str(json)?.parse::<IpAddr>()?),
        TypeTag::Subnet => {
            let text = as_str(json)?;
            let (prefix, width) = text
                .split_once('/')
                .ok_or_else(|| anyhow!("subnet `{text}` has no prefix length"))?;
            Value::subnet(prefix.parse()?, width.parse()?)
        }
        TypeTag::String | TypeTag::Enum | TypeTag::File | TypeTag::Func => Value {
            type_tag,
            ..Value::string(as_str(json)?)
        },
        TypeTag::Table | TypeTag::Vector => {
            let subtype = subtype.ok_or_else(|| anyhow!("{type_tag} field has no subtype"))?;
            let elements = json
                .as_array()
                .ok_or_else(|| expected("an array"))?
                .iter()
                .map(|element| decode_value(subtype, None, element))
                .collect::<anyhow::Result<Vec<_>>>()?;

            Value {
                type_tag,
                ..Value::set(elements)
            }
        }
        other => bail!("fields of type {other} cannot be replayed"),
    };

    Ok(value)
}

/// Decodes a port given as a number or as `number/proto`.
fn decode_port(json: &JsonValue) -> anyhow::Result<Value> {
    if let Some(number) = json.as_u64() {
        return Ok(Value::port(u32::try_from(number)?, TransportProto::Unknown));
    }

    let text = as_str(json)?;
    let (number, proto) = text.split_once('/').unwrap_or((text, "unknown"));
    let proto = match proto {
        "tcp" => TransportProto::Tcp,
        "udp" => TransportProto::Udp,
        "icmp" => TransportProto::Icmp,
        "unknown" => TransportProto::Unknown,
        other => bail!("unknown transport protocol `{other}`"),
    };

    Ok(Value::port(number.parse()?, proto))
}

fn as_str(json: &JsonValue) -> anyhow::Result<&str> {
    json.as_str().ok_or_else(|| expected("a string"))
}

fn expected(what: &str) -> anyhow::Error {
    anyhow!("expected {what}")
}
