use crate::ast::{Constant, StrPart};
use crate::span::Span;
use crate::{common_enum, common_struct};
use std::path::{Path, PathBuf};

mod binding;
mod params;

pub use binding::*;
pub use params::*;

pub type BExpr = Box<Expr>;

common_enum! {
    /// Expr is an expression of the configuration language
    #[derive(derive_more::From)]
    pub enum ExprKind {
        Symbol(ExprSymbol),
        Constant(Constant),
        Str(ExprStr),
        /// path literal as written, e.g. `./lib/default.nix`
        LiteralPath(ExprLiteralPath),
        /// search path such as `<nixpkgs>`
        EnvPath(ExprEnvPath),
        Unary(ExprUnary),
        /// binary operators, application included
        Binary(ExprBinary),
        List(ExprList),
        AttrSet(ExprAttrSet),
        Select(ExprSelect),
        HasAttr(ExprHasAttr),
        Abs(ExprAbs),
        Let(ExprLet),
        If(ExprIf),
        With(ExprWith),
        Assert(ExprAssert),
    }
}

common_struct! {
    pub struct Expr {
        #[serde(default, skip_serializing_if = "Span::is_null")]
        pub span: Span,
        #[serde(flatten)]
        pub kind: ExprKind,
    }
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        Expr::new(kind)
    }
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            span: Span::null(),
            kind,
        }
    }

    pub fn with_span(kind: ExprKind, span: Span) -> Self {
        Self { span, kind }
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn into_parts(self) -> (Span, ExprKind) {
        (self.span, self.kind)
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn sym(name: impl Into<String>) -> Expr {
        ExprKind::Symbol(ExprSymbol::new(name)).into()
    }
    pub fn constant(constant: Constant) -> Expr {
        ExprKind::Constant(constant).into()
    }
    pub fn int(value: i64) -> Expr {
        Self::constant(Constant::Int(value))
    }
    pub fn float(value: f64) -> Expr {
        Self::constant(Constant::Float(value))
    }
    pub fn bool(value: bool) -> Expr {
        Self::constant(Constant::Bool(value))
    }
    pub fn null() -> Expr {
        Self::constant(Constant::Null)
    }
    pub fn string(value: impl Into<String>) -> Expr {
        ExprKind::Str(ExprStr {
            parts: vec![StrPart::Literal(value.into())],
        })
        .into()
    }
    pub fn interpolated(parts: Vec<StrPart>) -> Expr {
        ExprKind::Str(ExprStr { parts }).into()
    }
    pub fn path(path: impl Into<PathBuf>) -> Expr {
        ExprKind::LiteralPath(ExprLiteralPath { path: path.into() }).into()
    }
    pub fn env_path(name: impl Into<String>) -> Expr {
        ExprKind::EnvPath(ExprEnvPath { name: name.into() }).into()
    }
    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        ExprKind::Unary(ExprUnary {
            op,
            operand: operand.into(),
        })
        .into()
    }
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        ExprKind::Binary(ExprBinary {
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        })
        .into()
    }
    pub fn app(function: Expr, argument: Expr) -> Expr {
        Self::binary(BinaryOp::App, function, argument)
    }
    pub fn list(items: Vec<Expr>) -> Expr {
        ExprKind::List(ExprList { items }).into()
    }
    pub fn attr_set(bindings: Vec<Binding>) -> Expr {
        ExprKind::AttrSet(ExprAttrSet {
            recursive: false,
            bindings,
        })
        .into()
    }
    pub fn rec_attr_set(bindings: Vec<Binding>) -> Expr {
        ExprKind::AttrSet(ExprAttrSet {
            recursive: true,
            bindings,
        })
        .into()
    }
    pub fn select(expr: Expr, path: AttrPath, default: Option<Expr>) -> Expr {
        ExprKind::Select(ExprSelect {
            expr: expr.into(),
            path,
            default: default.map(Box::new),
        })
        .into()
    }
    pub fn has_attr(expr: Expr, path: AttrPath) -> Expr {
        ExprKind::HasAttr(ExprHasAttr {
            expr: expr.into(),
            path,
        })
        .into()
    }
    pub fn abs(params: Params, body: Expr) -> Expr {
        ExprKind::Abs(ExprAbs {
            params,
            body: body.into(),
        })
        .into()
    }
    pub fn lambda(param: impl Into<String>, body: Expr) -> Expr {
        Self::abs(Params::Ident(param.into()), body)
    }
    pub fn let_in(bindings: Vec<Binding>, body: Expr) -> Expr {
        ExprKind::Let(ExprLet {
            bindings,
            body: body.into(),
        })
        .into()
    }
    pub fn if_then_else(cond: Expr, then: Expr, elze: Expr) -> Expr {
        ExprKind::If(ExprIf {
            cond: cond.into(),
            then: then.into(),
            elze: elze.into(),
        })
        .into()
    }
    pub fn with(scope: Expr, body: Expr) -> Expr {
        ExprKind::With(ExprWith {
            scope: scope.into(),
            body: body.into(),
        })
        .into()
    }
    pub fn assert(cond: Expr, body: Expr) -> Expr {
        ExprKind::Assert(ExprAssert {
            cond: cond.into(),
            body: body.into(),
        })
        .into()
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Symbol(symbol) => Some(symbol.name.as_str()),
            _ => None,
        }
    }
    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            ExprKind::Constant(constant) => Some(constant),
            _ => None,
        }
    }
    pub fn as_int(&self) -> Option<i64> {
        self.as_constant().and_then(Constant::as_int)
    }
    pub fn as_bool(&self) -> Option<bool> {
        self.as_constant().and_then(Constant::as_bool)
    }
    pub fn as_literal_path(&self) -> Option<&Path> {
        match &self.kind {
            ExprKind::LiteralPath(path) => Some(path.path.as_path()),
            _ => None,
        }
    }
    pub fn as_abs(&self) -> Option<&ExprAbs> {
        match &self.kind {
            ExprKind::Abs(abs) => Some(abs),
            _ => None,
        }
    }
}

common_struct! {
    pub struct ExprSymbol {
        pub name: String,
    }
}
impl ExprSymbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

common_struct! {
    pub struct ExprStr {
        pub parts: Vec<StrPart>,
    }
}
impl ExprStr {
    /// A string without antiquotations is a plain value.
    pub fn is_plain(&self) -> bool {
        self.parts.iter().all(StrPart::is_literal)
    }
}

common_struct! {
    pub struct ExprLiteralPath {
        pub path: PathBuf,
    }
}

common_struct! {
    pub struct ExprEnvPath {
        pub name: String,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    /// function application, `f x`
    App,
    Eq,
    NEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Impl,
    /// attribute set update, `//`
    Update,
    Plus,
    Minus,
    Mult,
    Div,
    /// list concatenation, `++`
    Concat,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::App => " ",
            BinaryOp::Eq => "==",
            BinaryOp::NEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Impl => "->",
            BinaryOp::Update => "//",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mult => "*",
            BinaryOp::Div => "/",
            BinaryOp::Concat => "++",
        }
    }
}

common_struct! {
    pub struct ExprUnary {
        pub op: UnaryOp,
        pub operand: BExpr,
    }
}

common_struct! {
    pub struct ExprBinary {
        pub op: BinaryOp,
        pub lhs: BExpr,
        pub rhs: BExpr,
    }
}

common_struct! {
    pub struct ExprList {
        pub items: Vec<Expr>,
    }
}

common_struct! {
    pub struct ExprAttrSet {
        /// `rec { ... }`
        #[serde(default)]
        pub recursive: bool,
        pub bindings: Vec<Binding>,
    }
}
impl ExprAttrSet {
    pub fn has_inherit(&self) -> bool {
        self.bindings
            .iter()
            .any(|binding| matches!(binding, Binding::Inherit(_)))
    }
}

common_struct! {
    /// `expr.a.b or default`
    pub struct ExprSelect {
        pub expr: BExpr,
        pub path: AttrPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub default: Option<BExpr>,
    }
}

common_struct! {
    /// `expr ? a.b`
    pub struct ExprHasAttr {
        pub expr: BExpr,
        pub path: AttrPath,
    }
}

common_struct! {
    pub struct ExprAbs {
        pub params: Params,
        pub body: BExpr,
    }
}
impl ExprAbs {
    /// Parameter name when the function takes a single plain parameter.
    pub fn single_param(&self) -> Option<&str> {
        match &self.params {
            Params::Ident(name) => Some(name.as_str()),
            Params::Pattern(_) => None,
        }
    }
}

common_struct! {
    pub struct ExprLet {
        pub bindings: Vec<Binding>,
        pub body: BExpr,
    }
}

common_struct! {
    pub struct ExprIf {
        pub cond: BExpr,
        pub then: BExpr,
        #[serde(rename = "else")]
        pub elze: BExpr,
    }
}

common_struct! {
    pub struct ExprWith {
        pub scope: BExpr,
        pub body: BExpr,
    }
}

common_struct! {
    pub struct ExprAssert {
        pub cond: BExpr,
        pub body: BExpr,
    }
}
