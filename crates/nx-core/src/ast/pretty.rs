//! Concrete-syntax rendering of expression trees.
//!
//! Output is single-line and parenthesizes every compound operand, so it is
//! unambiguous rather than minimal. Spans are not rendered.

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::ast::{BinaryOp, Binding, Constant, Expr, ExprKind, KeyName, Params, StrPart, UnaryOp};

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Symbol(symbol) => write!(f, "{}", symbol.name),
            ExprKind::Constant(constant) => write!(f, "{}", constant),
            ExprKind::Str(string) => {
                write!(f, "\"")?;
                for part in &string.parts {
                    match part {
                        StrPart::Literal(text) => write!(f, "{}", escape_str(text))?,
                        StrPart::Antiquoted(expr) => write!(f, "${{{}}}", expr)?,
                    }
                }
                write!(f, "\"")
            }
            ExprKind::LiteralPath(path) => write!(f, "{}", path.path.display()),
            ExprKind::EnvPath(path) => write!(f, "<{}>", path.name),
            ExprKind::Unary(unary) => {
                let op = match unary.op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                write!(f, "{}{}", op, Atom(&unary.operand))
            }
            ExprKind::Binary(binary) => match binary.op {
                BinaryOp::App => {
                    // application is left associative
                    let function = match binary.lhs.kind {
                        ExprKind::Binary(ref inner) if inner.op == BinaryOp::App => {
                            binary.lhs.to_string()
                        }
                        _ => Atom(&binary.lhs).to_string(),
                    };
                    write!(f, "{} {}", function, Atom(&binary.rhs))
                }
                op => write!(
                    f,
                    "{} {} {}",
                    Atom(&binary.lhs),
                    op.as_str(),
                    Atom(&binary.rhs)
                ),
            },
            ExprKind::List(list) => {
                if list.items.is_empty() {
                    return write!(f, "[ ]");
                }
                write!(f, "[ {} ]", list.items.iter().map(Atom).join(" "))
            }
            ExprKind::AttrSet(set) => {
                if set.recursive {
                    write!(f, "rec ")?;
                }
                write!(f, "{}", Bindings(&set.bindings))
            }
            ExprKind::Select(select) => {
                write!(f, "{}.{}", Atom(&select.expr), KeyPath(&select.path))?;
                if let Some(default) = &select.default {
                    write!(f, " or {}", Atom(default))?;
                }
                Ok(())
            }
            ExprKind::HasAttr(has) => write!(f, "{} ? {}", Atom(&has.expr), KeyPath(&has.path)),
            ExprKind::Abs(abs) => write!(f, "{}: {}", abs.params, abs.body),
            ExprKind::Let(expr_let) => {
                write!(f, "let ")?;
                for binding in &expr_let.bindings {
                    write!(f, "{} ", binding)?;
                }
                write!(f, "in {}", expr_let.body)
            }
            ExprKind::If(expr_if) => write!(
                f,
                "if {} then {} else {}",
                expr_if.cond, expr_if.then, expr_if.elze
            ),
            ExprKind::With(with) => write!(f, "with {}; {}", with.scope, with.body),
            ExprKind::Assert(assert) => write!(f, "assert {}; {}", assert.cond, assert.body),
        }
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(value) => write!(f, "{}", value),
            Constant::Float(value) => write!(f, "{:?}", value),
            Constant::Bool(value) => write!(f, "{}", value),
            Constant::Null => write!(f, "null"),
            Constant::Uri(uri) => write!(f, "{}", uri),
        }
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Named(named) => write!(f, "{} = {};", KeyPath(&named.path), named.value),
            Binding::Inherit(inherit) => {
                write!(f, "inherit")?;
                if let Some(from) = &inherit.from {
                    write!(f, " ({})", from)?;
                }
                for name in &inherit.names {
                    write!(f, " {}", name)?;
                }
                write!(f, ";")
            }
        }
    }
}

impl Display for Params {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Params::Ident(name) => write!(f, "{}", name),
            Params::Pattern(pattern) => {
                let mut fields = pattern
                    .fields
                    .iter()
                    .map(|field| match &field.default {
                        Some(default) => format!("{} ? {}", field.name, default),
                        None => field.name.clone(),
                    })
                    .collect::<Vec<_>>();
                if pattern.variadic {
                    fields.push("...".to_string());
                }
                if fields.is_empty() {
                    write!(f, "{{ }}")?;
                } else {
                    write!(f, "{{ {} }}", fields.join(", "))?;
                }
                if let Some(alias) = &pattern.alias {
                    write!(f, "@{}", alias)?;
                }
                Ok(())
            }
        }
    }
}

/// Renders an operand, parenthesized unless it is atomic.
struct Atom<'a>(&'a Expr);

impl Display for Atom<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let atomic = match &self.0.kind {
            ExprKind::Symbol(_)
            | ExprKind::Str(_)
            | ExprKind::LiteralPath(_)
            | ExprKind::EnvPath(_)
            | ExprKind::List(_)
            | ExprKind::AttrSet(_)
            | ExprKind::Select(_) => true,
            ExprKind::Constant(constant) => !matches!(constant, Constant::Int(v) if *v < 0)
                && !matches!(constant, Constant::Float(v) if *v < 0.0),
            _ => false,
        };
        if atomic {
            write!(f, "{}", self.0)
        } else {
            write!(f, "({})", self.0)
        }
    }
}

struct Bindings<'a>(&'a [Binding]);

impl Display for Bindings<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "{{ }}");
        }
        write!(f, "{{ {} }}", self.0.iter().join(" "))
    }
}

struct KeyPath<'a>(&'a [KeyName]);

impl Display for KeyPath<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let keys = self.0.iter().map(|key| match key {
            KeyName::Static(name) => name.clone(),
            KeyName::Dynamic(expr) => format!("${{{}}}", expr),
        });
        write!(f, "{}", keys.format("."))
    }
}

fn escape_str(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("${", "\\${")
        .replace('\n', "\\n")
}
