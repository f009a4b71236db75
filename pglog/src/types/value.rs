use std::fmt;
use std::net::IpAddr;

use crate::types::TypeTag;

/// Transport protocol of a port value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TransportProto {
    #[default]
    Unknown,
    Tcp,
    Udp,
    Icmp,
}

/// A port number together with its transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port {
    pub number: u32,
    pub proto: TransportProto,
}

/// An address prefix with its length in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    pub prefix: IpAddr,
    pub width: u8,
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.width)
    }
}

/// Data carried by a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No data, used by absent values.
    Unset,
    Bool(bool),
    Int(i64),
    Count(u64),
    Port(Port),
    Double(f64),
    Addr(IpAddr),
    Subnet(Subnet),
    /// Raw bytes of strings, enums, files and functions. Not necessarily UTF-8.
    String(Vec<u8>),
    /// Elements of a set or vector, in order.
    Sequence(Vec<Value>),
}

/// One typed value of a log record.
///
/// A value that is not `present` is written as SQL `NULL` whatever its payload holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub type_tag: TypeTag,
    pub present: bool,
    pub payload: Payload,
}

impl Value {
    /// Creates a present value.
    pub fn new(type_tag: TypeTag, payload: Payload) -> Value {
        Self {
            type_tag,
            present: true,
            payload,
        }
    }

    /// Creates an absent value of the given type.
    pub fn absent(type_tag: TypeTag) -> Value {
        Self {
            type_tag,
            present: false,
            payload: Payload::Unset,
        }
    }

    pub fn bool(value: bool) -> Value {
        Value::new(TypeTag::Bool, Payload::Bool(value))
    }

    pub fn int(value: i64) -> Value {
        Value::new(TypeTag::Int, Payload::Int(value))
    }

    pub fn count(value: u64) -> Value {
        Value::new(TypeTag::Count, Payload::Count(value))
    }

    pub fn port(number: u32, proto: TransportProto) -> Value {
        Value::new(TypeTag::Port, Payload::Port(Port { number, proto }))
    }

    pub fn double(value: f64) -> Value {
        Value::new(TypeTag::Double, Payload::Double(value))
    }

    /// Creates a time value from seconds since the epoch.
    pub fn time(seconds: f64) -> Value {
        Value::new(TypeTag::Time, Payload::Double(seconds))
    }

    /// Creates an interval value from a duration in seconds.
    pub fn interval(seconds: f64) -> Value {
        Value::new(TypeTag::Interval, Payload::Double(seconds))
    }

    pub fn addr(addr: IpAddr) -> Value {
        Value::new(TypeTag::Addr, Payload::Addr(addr))
    }

    pub fn subnet(prefix: IpAddr, width: u8) -> Value {
        Value::new(TypeTag::Subnet, Payload::Subnet(Subnet { prefix, width }))
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Value {
        Value::new(TypeTag::String, Payload::String(bytes.into()))
    }

    pub fn enumeration(name: impl Into<Vec<u8>>) -> Value {
        Value::new(TypeTag::Enum, Payload::String(name.into()))
    }

    pub fn set(elements: Vec<Value>) -> Value {
        Value::new(TypeTag::Table, Payload::Sequence(elements))
    }

    pub fn vector(elements: Vec<Value>) -> Value {
        Value::new(TypeTag::Vector, Payload::Sequence(elements))
    }

    /// Returns a copy of this value marked absent, keeping the payload.
    pub fn into_absent(self) -> Value {
        Self {
            present: false,
            ..self
        }
    }
}
