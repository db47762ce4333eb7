use crate::ast::Expr;
use crate::common_enum;

common_enum! {
    /// Atomic constants of the language.
    pub enum Constant {
        Int(i64),
        Float(f64),
        Bool(bool),
        Null,
        /// Bare URI literal such as `https://example.org`
        Uri(String),
    }
}

impl Constant {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

common_enum! {
    /// One segment of a string literal.
    pub enum StrPart {
        Literal(String),
        /// `${expr}`
        Antiquoted(Expr),
    }
}

impl StrPart {
    pub fn is_literal(&self) -> bool {
        matches!(self, StrPart::Literal(_))
    }
}
