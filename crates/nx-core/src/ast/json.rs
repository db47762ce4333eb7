//! Helpers for serializing/deserializing expression trees.
//!
//! Trees produced by an external parser arrive as JSON. Files are read
//! through the virtual filesystem by [`crate::frontend::JsonFrontend`].

use crate::ast::Expr;
use crate::Result;

pub fn load_expr_from_str(contents: &str) -> Result<Expr> {
    Ok(serde_json::from_str(contents)?)
}

/// Render an `Expr` as pretty-printed JSON.
pub fn expr_to_json(expr: &Expr) -> Result<String> {
    Ok(serde_json::to_string_pretty(expr)?)
}
