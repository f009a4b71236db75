//! Field descriptors and typed values exchanged with the host.

mod field;
mod value;

pub use field::*;
pub use value::*;
