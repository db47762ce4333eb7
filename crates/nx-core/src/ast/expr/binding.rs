use crate::ast::{BExpr, Expr};
use crate::span::Span;
use crate::{common_enum, common_struct};

common_enum! {
    /// One attribute name in a key path.
    pub enum KeyName {
        Static(String),
        /// `${expr}` or an interpolated string used as a key
        Dynamic(Expr),
    }
}

impl KeyName {
    pub fn as_static(&self) -> Option<&str> {
        match self {
            KeyName::Static(name) => Some(name.as_str()),
            KeyName::Dynamic(_) => None,
        }
    }
}

/// `a.b.c` in `a.b.c = value;` or `set.a.b`
pub type AttrPath = Vec<KeyName>;

pub fn attr_path<I, S>(names: I) -> AttrPath
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names
        .into_iter()
        .map(|name| KeyName::Static(name.into()))
        .collect()
}

common_enum! {
    pub enum Binding {
        /// `path = value;`
        Named(BindingNamed),
        /// `inherit a b;` or `inherit (from) a b;`
        Inherit(BindingInherit),
    }
}

common_struct! {
    pub struct BindingNamed {
        pub path: AttrPath,
        pub value: Expr,
        #[serde(default, skip_serializing_if = "Span::is_null")]
        pub span: Span,
    }
}

common_struct! {
    pub struct BindingInherit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub from: Option<BExpr>,
        pub names: Vec<String>,
        #[serde(default, skip_serializing_if = "Span::is_null")]
        pub span: Span,
    }
}

impl Binding {
    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        Self::named_path(vec![KeyName::Static(name.into())], value)
    }

    pub fn named_path(path: AttrPath, value: Expr) -> Self {
        Binding::Named(BindingNamed {
            path,
            value,
            span: Span::null(),
        })
    }

    pub fn inherit<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Binding::Inherit(BindingInherit {
            from: None,
            names: names.into_iter().map(Into::into).collect(),
            span: Span::null(),
        })
    }

    pub fn inherit_from<I, S>(from: Expr, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Binding::Inherit(BindingInherit {
            from: Some(from.into()),
            names: names.into_iter().map(Into::into).collect(),
            span: Span::null(),
        })
    }

    pub fn span(&self) -> Span {
        match self {
            Binding::Named(named) => named.span,
            Binding::Inherit(inherit) => inherit.span,
        }
    }

    /// The bound name when the key path is a single static key.
    pub fn simple_name(&self) -> Option<&str> {
        match self {
            Binding::Named(named) => match named.path.as_slice() {
                [key] => key.as_static(),
                _ => None,
            },
            Binding::Inherit(_) => None,
        }
    }

    /// Names this binding introduces into the enclosing scope.
    pub fn introduced_names(&self) -> Vec<&str> {
        match self {
            Binding::Named(named) => named
                .path
                .first()
                .and_then(KeyName::as_static)
                .into_iter()
                .collect(),
            Binding::Inherit(inherit) => inherit.names.iter().map(String::as_str).collect(),
        }
    }
}
