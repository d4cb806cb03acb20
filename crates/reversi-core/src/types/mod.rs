//! 基本型

mod square;
mod value;

pub use square::Square;
pub use value::*;
