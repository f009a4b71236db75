//! Configuration of the Postgres log writer.
//!
//! The host hands every stream a flat map of string options. This crate turns
//! that map into a validated [`shared::WriterConfig`] and derives the connection
//! options used to reach the database.

pub mod shared;
