//! Postgres primitives shared by the log writer: identifier escaping and the
//! text-format parameter type used for binary-safe inserts.

pub mod escape;
pub mod types;
