use postgres::types::TextParam;

use crate::bail;
use crate::error::{ErrorKind, PgLogError, PgLogResult};
use crate::pglog_error;
use crate::types::{Payload, TypeTag, Value};

/// Text form of one statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedParam {
    /// Bound as SQL `NULL`.
    Null,
    /// Bound as text. The length sent to the server is the length of the buffer.
    Text(Vec<u8>),
}

impl EncodedParam {
    /// Returns `true` if the parameter binds `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, EncodedParam::Null)
    }

    /// Returns the encoded bytes, `None` for `NULL`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            EncodedParam::Null => None,
            EncodedParam::Text(bytes) => Some(bytes),
        }
    }

    /// Returns the number of bytes sent for this parameter.
    pub fn len(&self) -> usize {
        self.as_bytes().map_or(0, <[u8]>::len)
    }

    /// Returns `true` if no bytes are sent, which includes `NULL`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the parameter for binding.
    pub fn as_text_param(&self) -> TextParam<'_> {
        TextParam::from(self.as_bytes())
    }
}

/// Encodes a value into the text form Postgres parses for its column type.
///
/// Absent values and empty sets or vectors both encode as [`EncodedParam::Null`].
pub fn encode_value(value: &Value) -> PgLogResult<EncodedParam> {
    if !value.present {
        return Ok(EncodedParam::Null);
    }

    let text = match (value.type_tag, &value.payload) {
        (TypeTag::Bool, Payload::Bool(b)) => {
            if *b {
                b"T".to_vec()
            } else {
                b"F".to_vec()
            }
        }
        (TypeTag::Int, Payload::Int(i)) => i.to_string().into_bytes(),
        (TypeTag::Count | TypeTag::Counter, Payload::Count(c)) => c.to_string().into_bytes(),
        (TypeTag::Port, Payload::Port(port)) => port.number.to_string().into_bytes(),
        (TypeTag::Time | TypeTag::Interval | TypeTag::Double, Payload::Double(d)) => {
            format_double(*d).into_bytes()
        }
        (TypeTag::Addr, Payload::Addr(addr)) => addr.to_string().into_bytes(),
        (TypeTag::Subnet, Payload::Subnet(subnet)) => subnet.to_string().into_bytes(),
        (
            TypeTag::Enum | TypeTag::String | TypeTag::File | TypeTag::Func,
            Payload::String(bytes),
        ) => bytes.clone(),
        (TypeTag::Table | TypeTag::Vector, Payload::Sequence(elements)) => {
            if elements.is_empty() {
                return Ok(EncodedParam::Null);
            }

            encode_array(elements)?
        }
        (
            TypeTag::Bool
            | TypeTag::Int
            | TypeTag::Count
            | TypeTag::Counter
            | TypeTag::Port
            | TypeTag::Time
            | TypeTag::Interval
            | TypeTag::Double
            | TypeTag::Addr
            | TypeTag::Subnet
            | TypeTag::Enum
            | TypeTag::String
            | TypeTag::File
            | TypeTag::Func
            | TypeTag::Table
            | TypeTag::Vector,
            payload,
        ) => return Err(payload_mismatch(value.type_tag, payload)),
        (other, _) => bail!(ErrorKind::UnsupportedType, "Unsupported field format", other),
    };

    Ok(EncodedParam::Text(text))
}

/// Formats a floating point value with six decimals, the way the host prints times.
pub(crate) fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        format!("{value:.6}")
    }
}

/// Renders the elements as a Postgres array literal, for example `{"a", "b"}`.
fn encode_array(elements: &[Value]) -> PgLogResult<Vec<u8>> {
    let mut out = Vec::with_capacity(2 + elements.len() * 8);
    out.push(b'{');

    for (i, element) in elements.iter().enumerate() {
        if i != 0 {
            out.extend_from_slice(b", ");
        }

        match encode_value(element)? {
            EncodedParam::Null => out.extend_from_slice(b"NULL"),
            EncodedParam::Text(text) if element.type_tag.is_numeric() => {
                out.extend_from_slice(&text)
            }
            EncodedParam::Text(text) => {
                out.push(b'"');
                escape_array_element(&text, &mut out);
                out.push(b'"');
            }
        }
    }

    out.push(b'}');

    Ok(out)
}

/// Backslash-escapes `\` and `"` so the element survives inside double quotes.
fn escape_array_element(text: &[u8], out: &mut Vec<u8>) {
    for &byte in text {
        if byte == b'\\' || byte == b'"' {
            out.push(b'\\');
        }
        out.push(byte);
    }
}

fn payload_mismatch(type_tag: TypeTag, payload: &Payload) -> PgLogError {
    pglog_error!(
        ErrorKind::ConversionError,
        "Value payload does not match its type",
        format!("{type_tag} value carries {payload:?}")
    )
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use super::*;
    use crate::types::TransportProto;

    fn text(value: &Value) -> String {
        match encode_value(value).unwrap() {
            EncodedParam::Text(bytes) => String::from_utf8(bytes).unwrap(),
            EncodedParam::Null => panic!("expected text, got null"),
        }
    }

    #[test]
    fn scalars_encode_to_text() {
        assert_eq!(text(&Value::bool(true)), "T");
        assert_eq!(text(&Value::bool(false)), "F");
        assert_eq!(text(&Value::int(-42)), "-42");
        assert_eq!(text(&Value::count(u64::MAX)), "18446744073709551615");
        assert_eq!(text(&Value::port(443, TransportProto::Tcp)), "443");
        assert_eq!(text(&Value::time(1_700_000_000.25)), "1700000000.250000");
        assert_eq!(text(&Value::interval(0.5)), "0.500000");
        assert_eq!(text(&Value::double(2.0)), "2.000000");
        assert_eq!(
            text(&Value::addr(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1)))),
            "192.168.0.1"
        );
        assert_eq!(
            text(&Value::addr(IpAddr::V6(Ipv6Addr::LOCALHOST))),
            "::1"
        );
        assert_eq!(
            text(&Value::subnet(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0)), 8)),
            "10.0.0.0/8"
        );
        assert_eq!(text(&Value::enumeration("Conn::LOG")), "Conn::LOG");
    }

    #[test]
    fn special_doubles() {
        assert_eq!(text(&Value::double(f64::NAN)), "NaN");
        assert_eq!(text(&Value::double(f64::INFINITY)), "Infinity");
        assert_eq!(text(&Value::double(f64::NEG_INFINITY)), "-Infinity");
    }

    #[test]
    fn strings_are_binary_safe() {
        let value = Value::string(b"a\0b\xffc".to_vec());
        let encoded = encode_value(&value).unwrap();

        assert_eq!(encoded.as_bytes(), Some(&b"a\0b\xffc"[..]));
        assert_eq!(encoded.len(), 5);
    }

    #[test]
    fn absent_values_encode_as_null_whatever_the_payload() {
        let values = [
            Value::int(5).into_absent(),
            Value::string("garbage").into_absent(),
            Value::new(TypeTag::Bool, Payload::String(b"wrong".to_vec())).into_absent(),
            Value::absent(TypeTag::Pattern),
            Value::set(vec![Value::string("a")]).into_absent(),
        ];

        for value in values {
            let encoded = encode_value(&value).unwrap();
            assert!(encoded.is_null());
            assert!(encoded.is_empty());
        }
    }

    #[test]
    fn string_set_encodes_as_quoted_array() {
        let value = Value::set(vec![Value::string("a"), Value::string("b")]);
        let encoded = encode_value(&value).unwrap();

        assert_eq!(encoded.as_bytes(), Some(&br#"{"a", "b"}"#[..]));
        assert_eq!(encoded.len(), r#"{"a", "b"}"#.len());
    }

    #[test]
    fn empty_containers_encode_like_absent_values() {
        let empty_set = encode_value(&Value::set(vec![])).unwrap();
        let empty_vector = encode_value(&Value::vector(vec![])).unwrap();
        let absent = encode_value(&Value::absent(TypeTag::Table)).unwrap();

        assert_eq!(empty_set, absent);
        assert_eq!(empty_vector, absent);
    }

    #[test]
    fn numeric_elements_are_inlined() {
        let value = Value::vector(vec![
            Value::count(1),
            Value::count(22),
            Value::absent(TypeTag::Count),
            Value::bool(true),
            Value::interval(1.5),
        ]);

        assert_eq!(text(&value), "{1, 22, NULL, T, 1.500000}");
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        let value = Value::vector(vec![
            Value::string(r#"say "hi""#),
            Value::string(r"C:\temp"),
            Value::addr(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4))),
        ]);

        let expected = r#"{"say \"hi\"", "C:\\temp", "1.2.3.4"}"#;
        let encoded = encode_value(&value).unwrap();

        assert_eq!(encoded.as_bytes(), Some(expected.as_bytes()));
        assert_eq!(encoded.len(), expected.len());
    }

    #[test]
    fn container_length_matches_emitted_bytes() {
        let values = [
            Value::set(vec![Value::string("x")]),
            Value::vector(vec![Value::string("a\"b\\c"), Value::absent(TypeTag::String)]),
            Value::vector(vec![Value::string(b"nul\0inside".to_vec()), Value::int(-1)]),
            Value::vector(vec![Value::set(vec![Value::string("nested")])]),
        ];

        for value in values {
            let encoded = encode_value(&value).unwrap();
            let bytes = encoded.as_bytes().unwrap();
            assert_eq!(encoded.len(), bytes.len());
            assert_eq!(bytes.first(), Some(&b'{'));
            assert_eq!(bytes.last(), Some(&b'}'));
        }
    }

    #[test]
    fn nested_containers_are_quoted() {
        let value = Value::vector(vec![Value::set(vec![Value::string("a")])]);
        assert_eq!(text(&value), r#"{"{\"a\"}"}"#);
    }

    #[test]
    fn unsupported_type_is_rejected() {
        let value = Value::new(TypeTag::Pattern, Payload::String(b"/a+/".to_vec()));
        let err = encode_value(&value).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
        assert_eq!(err.detail(), Some("pattern"));
    }

    #[test]
    fn unsupported_element_type_is_rejected() {
        let value = Value::vector(vec![Value::new(TypeTag::Record, Payload::Unset)]);
        assert_eq!(
            encode_value(&value).unwrap_err().kind(),
            ErrorKind::UnsupportedType
        );
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        let value = Value::new(TypeTag::Int, Payload::String(b"42".to_vec()));
        assert_eq!(
            encode_value(&value).unwrap_err().kind(),
            ErrorKind::ConversionError
        );
    }

    #[test]
    fn text_param_borrows_the_encoding() {
        let encoded = encode_value(&Value::int(42)).unwrap();
        assert_eq!(encoded.as_text_param().as_bytes(), Some(&b"42"[..]));
        assert_eq!(EncodedParam::Null.as_text_param().as_bytes(), None);
    }
}
