use crate::ast::Expr;
use crate::{common_enum, common_struct};

common_enum! {
    /// Parameters of a function
    pub enum Params {
        /// `x: body`
        Ident(String),
        /// `{ a, b ? 1, ... }@args: body`
        Pattern(ParamPattern),
    }
}

common_struct! {
    pub struct ParamPattern {
        pub fields: Vec<ParamField>,
        #[serde(default)]
        pub variadic: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub alias: Option<String>,
    }
}

common_struct! {
    pub struct ParamField {
        pub name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub default: Option<Expr>,
    }
}

impl ParamField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default: Expr) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
        }
    }
}

impl Params {
    pub fn pattern(fields: Vec<ParamField>, variadic: bool) -> Self {
        Params::Pattern(ParamPattern {
            fields,
            variadic,
            alias: None,
        })
    }

    /// Every name the parameters bind in the body.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Params::Ident(name) => vec![name.as_str()],
            Params::Pattern(pattern) => pattern
                .fields
                .iter()
                .map(|field| field.name.as_str())
                .chain(pattern.alias.as_deref())
                .collect(),
        }
    }
}
