mod base;
mod connection;
mod writer;

pub use base::*;
pub use connection::*;
pub use writer::*;
