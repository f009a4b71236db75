use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bail;
use crate::error::{ErrorKind, PgLogError};

/// Semantic type of a log field as declared by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Void,
    Bool,
    Int,
    Count,
    Counter,
    Double,
    Time,
    Interval,
    String,
    Pattern,
    Enum,
    Timer,
    Port,
    Addr,
    Subnet,
    Any,
    /// A set. Sets are tables without a yield type on the host side.
    #[serde(alias = "set")]
    Table,
    Union,
    Record,
    List,
    Func,
    File,
    Vector,
    Opaque,
    Type,
    Error,
}

impl TypeTag {
    /// Every tag, in declaration order.
    pub const ALL: [TypeTag; 26] = [
        TypeTag::Void,
        TypeTag::Bool,
        TypeTag::Int,
        TypeTag::Count,
        TypeTag::Counter,
        TypeTag::Double,
        TypeTag::Time,
        TypeTag::Interval,
        TypeTag::String,
        TypeTag::Pattern,
        TypeTag::Enum,
        TypeTag::Timer,
        TypeTag::Port,
        TypeTag::Addr,
        TypeTag::Subnet,
        TypeTag::Any,
        TypeTag::Table,
        TypeTag::Union,
        TypeTag::Record,
        TypeTag::List,
        TypeTag::Func,
        TypeTag::File,
        TypeTag::Vector,
        TypeTag::Opaque,
        TypeTag::Type,
        TypeTag::Error,
    ];

    /// Returns the lowercase name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Void => "void",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Count => "count",
            TypeTag::Counter => "counter",
            TypeTag::Double => "double",
            TypeTag::Time => "time",
            TypeTag::Interval => "interval",
            TypeTag::String => "string",
            TypeTag::Pattern => "pattern",
            TypeTag::Enum => "enum",
            TypeTag::Timer => "timer",
            TypeTag::Port => "port",
            TypeTag::Addr => "addr",
            TypeTag::Subnet => "subnet",
            TypeTag::Any => "any",
            TypeTag::Table => "table",
            TypeTag::Union => "union",
            TypeTag::Record => "record",
            TypeTag::List => "list",
            TypeTag::Func => "func",
            TypeTag::File => "file",
            TypeTag::Vector => "vector",
            TypeTag::Opaque => "opaque",
            TypeTag::Type => "type",
            TypeTag::Error => "error",
        }
    }

    /// Returns `true` for the ordered-sequence types (sets and vectors).
    pub fn is_container(&self) -> bool {
        matches!(self, TypeTag::Table | TypeTag::Vector)
    }

    /// Returns `true` for types whose text form never needs quoting inside an array literal.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeTag::Bool
                | TypeTag::Int
                | TypeTag::Count
                | TypeTag::Counter
                | TypeTag::Port
                | TypeTag::Time
                | TypeTag::Interval
                | TypeTag::Double
        )
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = PgLogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        if s == "set" {
            return Ok(TypeTag::Table);
        }

        match TypeTag::ALL.iter().find(|tag| tag.as_str() == s) {
            Some(tag) => Ok(*tag),
            None => bail!(ErrorKind::InvalidData, "Unknown type tag", s),
        }
    }
}

/// Describes one column of a log stream.
///
/// The ordered list of descriptors given at initialization is the stream's schema; every
/// record written afterwards carries values in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Name of the field, for example `id.orig_h`.
    pub name: String,
    /// Type of the field.
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    /// Element type, only meaningful for sets and vectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<TypeTag>,
}

impl Field {
    /// Creates a scalar field.
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Field {
        Self {
            name: name.into(),
            type_tag,
            subtype: None,
        }
    }

    /// Creates a set or vector field holding elements of `subtype`.
    pub fn container(name: impl Into<String>, type_tag: TypeTag, subtype: TypeTag) -> Field {
        Self {
            name: name.into(),
            type_tag,
            subtype: Some(subtype),
        }
    }
}
