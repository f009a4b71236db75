mod column;
mod text;

pub use column::*;
pub use text::*;
