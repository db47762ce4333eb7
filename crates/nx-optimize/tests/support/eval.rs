//! Small lazy evaluator used as the reference semantics in tests.
//!
//! Bindings are thunks, `let` and `rec` scopes are recursive, lexical names
//! win over `with` scopes and relative path literals resolve against the
//! `__cur_file` binding in scope, falling back to the root file.

use nx_core::ast::*;
use nx_core::frontend::{parse_file, JsonFrontend};
use nx_core::vfs::{normalize_path, VirtualFileSystem};
use nx_optimize::{resolve_import_path, wrap_with_current_file, ReduceOptions};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

pub type EvalResult<T> = Result<T, String>;

/// Fully forced result of an evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Str(String),
    Path(PathBuf),
    List(Vec<Value>),
    Set(BTreeMap<String, Value>),
    Lambda,
}

#[derive(Clone)]
enum Lazy {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Str(String),
    Path(PathBuf),
    List(Vec<Thunk>),
    Set(BTreeMap<String, Thunk>),
    Lambda(Rc<Closure>),
    Import,
}

impl Lazy {
    fn type_name(&self) -> &'static str {
        match self {
            Lazy::Int(_) => "int",
            Lazy::Float(_) => "float",
            Lazy::Bool(_) => "bool",
            Lazy::Null => "null",
            Lazy::Str(_) => "string",
            Lazy::Path(_) => "path",
            Lazy::List(_) => "list",
            Lazy::Set(_) => "set",
            Lazy::Lambda(_) | Lazy::Import => "lambda",
        }
    }
}

struct Closure {
    params: Params,
    body: Expr,
    env: Env,
}

#[derive(Clone)]
struct Thunk(Rc<RefCell<ThunkState>>);

enum ThunkState {
    Pending(Expr, Env),
    Forcing,
    Ready(Lazy),
}

impl Thunk {
    fn pending(expr: Expr, env: Env) -> Self {
        Thunk(Rc::new(RefCell::new(ThunkState::Pending(expr, env))))
    }

    fn ready(value: Lazy) -> Self {
        Thunk(Rc::new(RefCell::new(ThunkState::Ready(value))))
    }
}

type Vars = Rc<RefCell<HashMap<String, Thunk>>>;
type Env = Rc<EnvNode>;

enum EnvNode {
    Root,
    Vars { vars: Vars, parent: Env },
    With { scope: Thunk, parent: Env },
}

pub struct Evaluator {
    fs: Arc<dyn VirtualFileSystem>,
    frontend: JsonFrontend,
    options: ReduceOptions,
    root_file: Option<PathBuf>,
    imports: RefCell<HashMap<PathBuf, Thunk>>,
}

impl Evaluator {
    pub fn new(fs: Arc<dyn VirtualFileSystem>) -> Self {
        Self {
            fs,
            frontend: JsonFrontend::new(),
            options: ReduceOptions::default(),
            root_file: None,
            imports: RefCell::new(HashMap::new()),
        }
    }

    pub fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.root_file = Some(file.into());
        self
    }

    pub fn eval_value(&self, expr: &Expr) -> EvalResult<Value> {
        let value = self.eval(expr, &Rc::new(EnvNode::Root))?;
        self.deep(value)
    }

    fn deep(&self, value: Lazy) -> EvalResult<Value> {
        Ok(match value {
            Lazy::Int(i) => Value::Int(i),
            Lazy::Float(f) => Value::Float(f),
            Lazy::Bool(b) => Value::Bool(b),
            Lazy::Null => Value::Null,
            Lazy::Str(s) => Value::Str(s),
            Lazy::Path(p) => Value::Path(p),
            Lazy::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.force(item).and_then(|v| self.deep(v)))
                    .collect::<EvalResult<_>>()?,
            ),
            Lazy::Set(attrs) => Value::Set(
                attrs
                    .iter()
                    .map(|(k, v)| -> EvalResult<(String, Value)> {
                        Ok((k.clone(), self.deep(self.force(v)?)?))
                    })
                    .collect::<EvalResult<_>>()?,
            ),
            Lazy::Lambda(_) | Lazy::Import => Value::Lambda,
        })
    }

    fn force(&self, thunk: &Thunk) -> EvalResult<Lazy> {
        let state = std::mem::replace(&mut *thunk.0.borrow_mut(), ThunkState::Forcing);
        match state {
            ThunkState::Ready(value) => {
                *thunk.0.borrow_mut() = ThunkState::Ready(value.clone());
                Ok(value)
            }
            ThunkState::Forcing => Err("infinite recursion encountered".to_string()),
            ThunkState::Pending(expr, env) => match self.eval(&expr, &env) {
                Ok(value) => {
                    *thunk.0.borrow_mut() = ThunkState::Ready(value.clone());
                    Ok(value)
                }
                Err(err) => {
                    *thunk.0.borrow_mut() = ThunkState::Pending(expr, env);
                    Err(err)
                }
            },
        }
    }

    fn lookup_lexical(&self, env: &Env, name: &str) -> Option<Thunk> {
        let mut node = env;
        loop {
            match &**node {
                EnvNode::Root => return None,
                EnvNode::Vars { vars, parent } => {
                    if let Some(thunk) = vars.borrow().get(name) {
                        return Some(thunk.clone());
                    }
                    node = parent;
                }
                EnvNode::With { parent, .. } => node = parent,
            }
        }
    }

    fn lookup(&self, env: &Env, name: &str) -> EvalResult<Thunk> {
        if let Some(thunk) = self.lookup_lexical(env, name) {
            return Ok(thunk);
        }
        if name == self.options.import_symbol {
            return Ok(Thunk::ready(Lazy::Import));
        }
        let mut node = env;
        loop {
            match &**node {
                EnvNode::Root => return Err(format!("undefined variable '{name}'")),
                EnvNode::Vars { parent, .. } => node = parent,
                EnvNode::With { scope, parent } => {
                    match self.force(scope)? {
                        Lazy::Set(attrs) => {
                            if let Some(thunk) = attrs.get(name) {
                                return Ok(thunk.clone());
                            }
                        }
                        other => return Err(format!("with on a {}", other.type_name())),
                    }
                    node = parent;
                }
            }
        }
    }

    fn eval(&self, expr: &Expr, env: &Env) -> EvalResult<Lazy> {
        match expr.kind() {
            ExprKind::Symbol(symbol) => {
                let thunk = self.lookup(env, &symbol.name)?;
                self.force(&thunk)
            }
            ExprKind::Constant(constant) => Ok(match constant {
                Constant::Int(i) => Lazy::Int(*i),
                Constant::Float(f) => Lazy::Float(*f),
                Constant::Bool(b) => Lazy::Bool(*b),
                Constant::Null => Lazy::Null,
                Constant::Uri(uri) => Lazy::Str(uri.clone()),
            }),
            ExprKind::Str(string) => {
                let mut out = String::new();
                for part in &string.parts {
                    match part {
                        StrPart::Literal(text) => out.push_str(text),
                        StrPart::Antiquoted(expr) => match self.eval(expr, env)? {
                            Lazy::Str(text) => out.push_str(&text),
                            Lazy::Path(path) => out.push_str(&path.display().to_string()),
                            other => {
                                return Err(format!("cannot coerce a {} to a string", other.type_name()))
                            }
                        },
                    }
                }
                Ok(Lazy::Str(out))
            }
            ExprKind::LiteralPath(path) => Ok(Lazy::Path(self.resolve_literal(&path.path, env)?)),
            ExprKind::EnvPath(path) => Ok(Lazy::Path(PathBuf::from(format!("<{}>", path.name)))),
            ExprKind::Unary(unary) => match (unary.op, self.eval(&unary.operand, env)?) {
                (UnaryOp::Neg, Lazy::Int(i)) => {
                    i.checked_neg().map(Lazy::Int).ok_or_else(overflow)
                }
                (UnaryOp::Neg, Lazy::Float(f)) => Ok(Lazy::Float(-f)),
                (UnaryOp::Not, Lazy::Bool(b)) => Ok(Lazy::Bool(!b)),
                (op, other) => Err(format!("cannot apply {:?} to a {}", op, other.type_name())),
            },
            ExprKind::Binary(binary) => self.eval_binary(binary, env),
            ExprKind::List(list) => Ok(Lazy::List(
                list.items
                    .iter()
                    .map(|item| Thunk::pending(item.clone(), env.clone()))
                    .collect(),
            )),
            ExprKind::AttrSet(set) if set.recursive => {
                let (_, attrs) = self.bind_recursive(&set.bindings, env)?;
                Ok(Lazy::Set(attrs.into_iter().collect()))
            }
            ExprKind::AttrSet(set) => {
                let attrs = self.collect_bindings(&set.bindings, env, env)?;
                Ok(Lazy::Set(attrs.into_iter().collect()))
            }
            ExprKind::Select(select) => {
                let mut current = self.eval(&select.expr, env)?;
                for key in &select.path {
                    let name = self.key_name(key, env)?;
                    let next = match &current {
                        Lazy::Set(attrs) => attrs.get(&name).cloned(),
                        _ => None,
                    };
                    match next {
                        Some(thunk) => current = self.force(&thunk)?,
                        None => {
                            return match &select.default {
                                Some(default) => self.eval(default, env),
                                None => Err(format!("attribute '{name}' missing")),
                            }
                        }
                    }
                }
                Ok(current)
            }
            ExprKind::HasAttr(has) => {
                let mut current = self.eval(&has.expr, env)?;
                for key in &has.path {
                    let name = self.key_name(key, env)?;
                    let next = match &current {
                        Lazy::Set(attrs) => attrs.get(&name).cloned(),
                        _ => None,
                    };
                    match next {
                        Some(thunk) => current = self.force(&thunk)?,
                        None => return Ok(Lazy::Bool(false)),
                    }
                }
                Ok(Lazy::Bool(true))
            }
            ExprKind::Abs(abs) => Ok(Lazy::Lambda(Rc::new(Closure {
                params: abs.params.clone(),
                body: (*abs.body).clone(),
                env: env.clone(),
            }))),
            ExprKind::Let(expr_let) => {
                let (scope, _) = self.bind_recursive(&expr_let.bindings, env)?;
                self.eval(&expr_let.body, &scope)
            }
            ExprKind::If(expr_if) => match self.eval(&expr_if.cond, env)? {
                Lazy::Bool(true) => self.eval(&expr_if.then, env),
                Lazy::Bool(false) => self.eval(&expr_if.elze, env),
                other => Err(format!("if on a {}", other.type_name())),
            },
            ExprKind::With(with) => {
                let scope = Rc::new(EnvNode::With {
                    scope: Thunk::pending((*with.scope).clone(), env.clone()),
                    parent: env.clone(),
                });
                self.eval(&with.body, &scope)
            }
            ExprKind::Assert(assert) => match self.eval(&assert.cond, env)? {
                Lazy::Bool(true) => self.eval(&assert.body, env),
                Lazy::Bool(false) => Err("assertion failed".to_string()),
                other => Err(format!("assert on a {}", other.type_name())),
            },
        }
    }

    fn eval_binary(&self, binary: &ExprBinary, env: &Env) -> EvalResult<Lazy> {
        let as_bool = |expr: &Expr| -> EvalResult<bool> {
            match self.eval(expr, env)? {
                Lazy::Bool(b) => Ok(b),
                other => Err(format!("expected a bool, got a {}", other.type_name())),
            }
        };
        match binary.op {
            BinaryOp::App => {
                let function = self.eval(&binary.lhs, env)?;
                let argument = Thunk::pending((*binary.rhs).clone(), env.clone());
                self.apply(function, argument)
            }
            BinaryOp::And => Ok(Lazy::Bool(as_bool(&binary.lhs)? && as_bool(&binary.rhs)?)),
            BinaryOp::Or => Ok(Lazy::Bool(as_bool(&binary.lhs)? || as_bool(&binary.rhs)?)),
            BinaryOp::Impl => Ok(Lazy::Bool(!as_bool(&binary.lhs)? || as_bool(&binary.rhs)?)),
            op => {
                let lhs = self.eval(&binary.lhs, env)?;
                let rhs = self.eval(&binary.rhs, env)?;
                self.arith(op, lhs, rhs)
            }
        }
    }

    fn arith(&self, op: BinaryOp, lhs: Lazy, rhs: Lazy) -> EvalResult<Lazy> {
        use Lazy::*;
        if matches!(op, BinaryOp::Eq | BinaryOp::NEq) {
            let same = self.deep(lhs)? == self.deep(rhs)?;
            return Ok(Bool(same == (op == BinaryOp::Eq)));
        }
        let mismatch = |lhs: &Lazy, rhs: &Lazy| -> EvalResult<Lazy> {
            Err(format!(
                "cannot apply {} to a {} and a {}",
                op.as_str(),
                lhs.type_name(),
                rhs.type_name()
            ))
        };
        match (op, &lhs, &rhs) {
            (BinaryOp::Plus, Int(a), Int(b)) => a.checked_add(*b).map(Int).ok_or_else(overflow),
            (BinaryOp::Minus, Int(a), Int(b)) => a.checked_sub(*b).map(Int).ok_or_else(overflow),
            (BinaryOp::Mult, Int(a), Int(b)) => a.checked_mul(*b).map(Int).ok_or_else(overflow),
            (BinaryOp::Div, Int(_), Int(0)) => Err("division by zero".to_string()),
            (BinaryOp::Div, Int(a), Int(b)) => a.checked_div(*b).map(Int).ok_or_else(overflow),
            (BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Mult | BinaryOp::Div, _, _) => {
                match (as_float(&lhs), as_float(&rhs), &lhs, &rhs) {
                    (Some(a), Some(b), _, _) => Ok(Float(match op {
                        BinaryOp::Plus => a + b,
                        BinaryOp::Minus => a - b,
                        BinaryOp::Mult => a * b,
                        _ => a / b,
                    })),
                    (_, _, Str(a), Str(b)) if op == BinaryOp::Plus => Ok(Str(format!("{a}{b}"))),
                    (_, _, Path(a), Str(b)) if op == BinaryOp::Plus => {
                        Ok(Path(PathBuf::from(format!("{}{b}", a.display()))))
                    }
                    (_, _, Str(a), Path(b)) if op == BinaryOp::Plus => {
                        Ok(Str(format!("{a}{}", b.display())))
                    }
                    _ => mismatch(&lhs, &rhs),
                }
            }
            (BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte, _, _) => {
                let ordering = match (&lhs, &rhs) {
                    (Str(a), Str(b)) => a.partial_cmp(b),
                    _ => match (as_float(&lhs), as_float(&rhs)) {
                        (Some(a), Some(b)) => a.partial_cmp(&b),
                        _ => return mismatch(&lhs, &rhs),
                    },
                };
                let ordering = ordering.ok_or_else(|| "incomparable values".to_string())?;
                Ok(Bool(match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Lte => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            (BinaryOp::Update, Set(a), Set(b)) => {
                let mut merged = a.clone();
                merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(Set(merged))
            }
            (BinaryOp::Concat, List(a), List(b)) => {
                Ok(List(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => mismatch(&lhs, &rhs),
        }
    }

    fn apply(&self, function: Lazy, argument: Thunk) -> EvalResult<Lazy> {
        match function {
            Lazy::Lambda(closure) => {
                let vars: Vars = Rc::new(RefCell::new(HashMap::new()));
                let scope: Env = Rc::new(EnvNode::Vars {
                    vars: vars.clone(),
                    parent: closure.env.clone(),
                });
                match &closure.params {
                    Params::Ident(name) => {
                        vars.borrow_mut().insert(name.clone(), argument);
                    }
                    Params::Pattern(pattern) => {
                        let attrs = match self.force(&argument)? {
                            Lazy::Set(attrs) => attrs,
                            other => {
                                return Err(format!("expected a set argument, got a {}", other.type_name()))
                            }
                        };
                        if !pattern.variadic {
                            if let Some(extra) = attrs
                                .keys()
                                .find(|key| pattern.fields.iter().all(|f| &f.name != *key))
                            {
                                return Err(format!("unexpected argument '{extra}'"));
                            }
                        }
                        let mut bound = HashMap::new();
                        for field in &pattern.fields {
                            let thunk = match (attrs.get(&field.name), &field.default) {
                                (Some(thunk), _) => thunk.clone(),
                                (None, Some(default)) => Thunk::pending(default.clone(), scope.clone()),
                                (None, None) => {
                                    return Err(format!("missing argument '{}'", field.name))
                                }
                            };
                            bound.insert(field.name.clone(), thunk);
                        }
                        if let Some(alias) = &pattern.alias {
                            bound.insert(alias.clone(), argument);
                        }
                        *vars.borrow_mut() = bound;
                    }
                }
                self.eval(&closure.body, &scope)
            }
            Lazy::Import => match self.force(&argument)? {
                Lazy::Path(path) => self.import(&path),
                other => Err(format!("cannot import a {}", other.type_name())),
            },
            other => Err(format!("attempt to call a {}", other.type_name())),
        }
    }

    fn import(&self, path: &Path) -> EvalResult<Lazy> {
        let resolved = resolve_import_path(self.fs.as_ref(), &self.options, None, path)
            .map_err(|err| err.to_string())?;
        let cached = self.imports.borrow().get(&resolved).cloned();
        if let Some(thunk) = cached {
            return self.force(&thunk);
        }
        let parsed = parse_file(&self.frontend, self.fs.as_ref(), &resolved)
            .map_err(|err| err.to_string())?;
        let wrapped = wrap_with_current_file(&self.options, &resolved, parsed);
        let thunk = Thunk::pending(wrapped, Rc::new(EnvNode::Root));
        self.imports.borrow_mut().insert(resolved, thunk.clone());
        self.force(&thunk)
    }

    fn resolve_literal(&self, path: &Path, env: &Env) -> EvalResult<PathBuf> {
        if path.is_absolute() {
            return Ok(normalize_path(path));
        }
        let current = match self.lookup_lexical(env, &self.options.current_file_binding) {
            Some(thunk) => match self.force(&thunk)? {
                Lazy::Path(file) => Some(file),
                _ => None,
            },
            None => self.root_file.clone(),
        };
        let base = current
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        Ok(normalize_path(&base.join(path)))
    }

    fn key_name(&self, key: &KeyName, env: &Env) -> EvalResult<String> {
        match key {
            KeyName::Static(name) => Ok(name.clone()),
            KeyName::Dynamic(expr) => match self.eval(expr, env)? {
                Lazy::Str(name) => Ok(name),
                other => Err(format!("attribute name is a {}", other.type_name())),
            },
        }
    }

    /// Scope where every binding sees every other one.
    fn bind_recursive(
        &self,
        bindings: &[Binding],
        env: &Env,
    ) -> EvalResult<(Env, HashMap<String, Thunk>)> {
        let vars: Vars = Rc::new(RefCell::new(HashMap::new()));
        let scope: Env = Rc::new(EnvNode::Vars {
            vars: vars.clone(),
            parent: env.clone(),
        });
        let attrs = self.collect_bindings(bindings, &scope, env)?;
        *vars.borrow_mut() = attrs.clone();
        Ok((scope, attrs))
    }

    /// Values are evaluated in `value_env`, plain `inherit` looks names up
    /// in `outer`.
    fn collect_bindings(
        &self,
        bindings: &[Binding],
        value_env: &Env,
        outer: &Env,
    ) -> EvalResult<HashMap<String, Thunk>> {
        let mut attrs = HashMap::new();
        for binding in bindings {
            match binding {
                Binding::Named(named) => {
                    let value = Thunk::pending(named.value.clone(), value_env.clone());
                    self.insert_path(&mut attrs, &named.path, value, outer)?;
                }
                Binding::Inherit(inherit) => {
                    for name in &inherit.names {
                        let thunk = match &inherit.from {
                            Some(from) => Thunk::pending(
                                Expr::select((**from).clone(), attr_path([name.clone()]), None),
                                value_env.clone(),
                            ),
                            None => Thunk::pending(Expr::sym(name.clone()), outer.clone()),
                        };
                        if attrs.insert(name.clone(), thunk).is_some() {
                            return Err(format!("attribute '{name}' already defined"));
                        }
                    }
                }
            }
        }
        Ok(attrs)
    }

    fn insert_path(
        &self,
        attrs: &mut HashMap<String, Thunk>,
        path: &[KeyName],
        value: Thunk,
        key_env: &Env,
    ) -> EvalResult<()> {
        let (first, rest) = path
            .split_first()
            .ok_or_else(|| "empty attribute path".to_string())?;
        let name = self.key_name(first, key_env)?;
        if rest.is_empty() {
            if attrs.insert(name.clone(), value).is_some() {
                return Err(format!("attribute '{name}' already defined"));
            }
            return Ok(());
        }
        let mut inner: HashMap<String, Thunk> = match attrs.get(&name) {
            Some(existing) => match self.force(existing)? {
                Lazy::Set(existing) => existing.into_iter().collect(),
                other => return Err(format!("attribute '{name}' is a {}", other.type_name())),
            },
            None => HashMap::new(),
        };
        self.insert_path(&mut inner, rest, value, key_env)?;
        attrs.insert(name, Thunk::ready(Lazy::Set(inner.into_iter().collect())));
        Ok(())
    }
}

fn as_float(value: &Lazy) -> Option<f64> {
    match value {
        Lazy::Int(i) => Some(*i as f64),
        Lazy::Float(f) => Some(*f),
        _ => None,
    }
}

fn overflow() -> String {
    "integer overflow".to_string()
}
