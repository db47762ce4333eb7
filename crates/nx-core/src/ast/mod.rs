//! AST are trees, so Box<T> is fine

mod expr;
pub mod json;
mod pretty;
mod value;

pub use expr::*;
pub use json::*;
pub use value::*;
