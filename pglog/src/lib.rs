//! Log writer backend storing structured log records in Postgres.
//!
//! A [`writer::postgres::PostgresWriter`] owns one stream: it creates the destination table from
//! the stream's field descriptors (or from configuration supplied text), prepares a single
//! insert and executes it once per record with text format parameters.

pub mod client;
pub mod conversions;
pub mod error;
pub mod formatter;
mod macros;
pub mod statement;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod writer;
