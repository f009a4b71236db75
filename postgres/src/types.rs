use std::error;

use bytes::BytesMut;
use tokio_postgres::types::{Format, IsNull, ToSql, Type, to_sql_checked};

/// A statement parameter sent to the server in text format.
///
/// The bytes are forwarded untouched together with their explicit length, so
/// embedded nul bytes and other special characters survive. `None` binds SQL `NULL`.
/// The server parses the text according to the parameter type it inferred when
/// the statement was prepared, which is why every type is accepted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextParam<'a>(Option<&'a [u8]>);

impl<'a> TextParam<'a> {
    /// Returns the bytes of the parameter, `None` for `NULL`.
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        self.0
    }
}

impl<'a> From<Option<&'a [u8]>> for TextParam<'a> {
    fn from(value: Option<&'a [u8]>) -> Self {
        Self(value)
    }
}

impl ToSql for TextParam<'_> {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn error::Error + Sync + Send>> {
        match self.0 {
            Some(bytes) => {
                out.extend_from_slice(bytes);
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}
