//! Test doubles for exercising writers without a running database.

pub mod connection;
pub mod logs;
