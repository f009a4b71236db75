use crate::bail;
use crate::error::{ErrorKind, PgLogResult};
use crate::types::TypeTag;

/// Returns the Postgres scalar column type for a field type.
fn scalar_column_type(type_tag: TypeTag) -> Option<&'static str> {
    let column_type = match type_tag {
        TypeTag::Bool => "boolean",
        TypeTag::Int | TypeTag::Count | TypeTag::Counter | TypeTag::Port => "bigint",
        TypeTag::Addr | TypeTag::Subnet => "inet",
        TypeTag::Time | TypeTag::Interval | TypeTag::Double => "double precision",
        TypeTag::Enum | TypeTag::String | TypeTag::File | TypeTag::Func => "TEXT",
        _ => return None,
    };

    Some(column_type)
}

/// Returns the Postgres column type for a field of `type_tag`.
///
/// Sets and vectors become arrays of their element type. The element type is mapped with no
/// subtype of its own, so nested containers are rejected like any other unsupported type.
pub fn column_type(type_tag: TypeTag, subtype: Option<TypeTag>) -> PgLogResult<String> {
    if type_tag.is_container() {
        let Some(subtype) = subtype else {
            bail!(
                ErrorKind::UnsupportedType,
                "Unsupported field format",
                format!("{type_tag} without an element type")
            );
        };

        let element_type = column_type(subtype, None)?;
        return Ok(format!("{element_type}[]"));
    }

    match scalar_column_type(type_tag) {
        Some(column_type) => Ok(column_type.to_string()),
        None => bail!(ErrorKind::UnsupportedType, "Unsupported field format", type_tag),
    }
}
