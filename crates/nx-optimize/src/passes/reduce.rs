use crate::config::ReduceOptions;
use crate::queries::{is_static_value, may_reference};
use crate::utils::ImportCache;
use nx_core::ast::*;
use nx_core::context::{ReduceContext, ScopeFrame};
use nx_core::error::{Error, Result};
use nx_core::frontend::{parse_file, LanguageFrontend};
use nx_core::span::Span;
use nx_core::vfs::VirtualFileSystem;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Static reducer: inlines known bindings, folds constant operations,
/// beta-reduces applications of single-parameter functions and splices
/// statically imported files into the tree.
///
/// Every rewrite preserves the meaning of the program. When a rule's
/// preconditions are not met the node is rebuilt from its reduced children.
pub struct Reducer {
    pub(crate) frontend: Arc<dyn LanguageFrontend>,
    pub(crate) fs: Arc<dyn VirtualFileSystem>,
    pub(crate) options: ReduceOptions,
    /// Receives the `Importing file` lines.
    pub(crate) announcements: Mutex<Box<dyn Write + Send>>,
}

impl Reducer {
    pub fn new(frontend: Arc<dyn LanguageFrontend>, fs: Arc<dyn VirtualFileSystem>) -> Self {
        Self {
            frontend,
            fs,
            options: ReduceOptions::default(),
            announcements: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    /// Replace the options, rejecting names that cannot work.
    pub fn with_options(mut self, options: ReduceOptions) -> Result<Self> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    /// Send import announcements to `sink` instead of stdout.
    pub fn with_announcements(mut self, sink: impl Write + Send + 'static) -> Self {
        self.announcements = Mutex::new(Box::new(sink));
        self
    }

    pub fn options(&self) -> &ReduceOptions {
        &self.options
    }

    /// Reduce `expr`, which was read from `file` if given, with a fresh
    /// import cache.
    pub fn reduce(&self, expr: Expr, file: Option<&Path>) -> Result<Expr> {
        let mut cache = ImportCache::new();
        self.reduce_with_cache(expr, file, &mut cache)
    }

    /// Reduce `expr` sharing `cache` with earlier runs, so files imported
    /// by several roots are parsed once.
    pub fn reduce_with_cache(
        &self,
        expr: Expr,
        file: Option<&Path>,
        cache: &mut ImportCache,
    ) -> Result<Expr> {
        let ctx = ReduceContext::new(file.map(Path::to_path_buf));
        self.reduce_expr(expr, &ctx, cache)
    }

    /// Parse the file at `path` and reduce it with the file as origin.
    pub fn reduce_file(&self, path: &Path) -> Result<Expr> {
        let path = self
            .fs
            .canonicalize(path)
            .map_err(|err| Error::fs(path, err))?;
        let expr = parse_file(self.frontend.as_ref(), self.fs.as_ref(), &path)?;
        self.reduce(expr, Some(&path))
    }

    pub fn reduce_expr(
        &self,
        expr: Expr,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<Expr> {
        let (span, kind) = expr.into_parts();
        match kind {
            ExprKind::Symbol(symbol) => match ctx.lookup(&symbol.name) {
                Some(bound) => {
                    trace!("inlining {} = {}", symbol.name, bound);
                    Ok(bound)
                }
                None => Ok(Expr::with_span(symbol.into(), span)),
            },
            kind @ (ExprKind::Constant(_) | ExprKind::LiteralPath(_) | ExprKind::EnvPath(_)) => {
                Ok(Expr::with_span(kind, span))
            }
            ExprKind::Str(string) => {
                let parts = string
                    .parts
                    .into_iter()
                    .map(|part| match part {
                        StrPart::Antiquoted(expr) => {
                            Ok(StrPart::Antiquoted(self.reduce_expr(expr, ctx, cache)?))
                        }
                        literal => Ok(literal),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::with_span(ExprStr { parts }.into(), span))
            }
            ExprKind::Unary(unary) => self.reduce_unary(unary, span, ctx, cache),
            ExprKind::Binary(binary) if binary.op == BinaryOp::App => {
                self.reduce_app(binary, span, ctx, cache)
            }
            ExprKind::Binary(binary) => self.reduce_binary(binary, span, ctx, cache),
            ExprKind::List(list) => {
                let items = list
                    .items
                    .into_iter()
                    .map(|item| self.reduce_expr(item, ctx, cache))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::with_span(ExprList { items }.into(), span))
            }
            ExprKind::AttrSet(set) => self.reduce_attr_set(set, span, ctx, cache),
            ExprKind::Select(select) => {
                let expr = self.reduce_expr(*select.expr, ctx, cache)?;
                let path = self.reduce_attr_path(select.path, ctx, cache)?;
                let default = match select.default {
                    Some(default) => Some(self.reduce_expr(*default, ctx, cache)?.into()),
                    None => None,
                };
                let select = ExprSelect {
                    expr: expr.into(),
                    path,
                    default,
                };
                Ok(Expr::with_span(select.into(), span))
            }
            ExprKind::HasAttr(has) => {
                let expr = self.reduce_expr(*has.expr, ctx, cache)?;
                let path = self.reduce_attr_path(has.path, ctx, cache)?;
                let has = ExprHasAttr {
                    expr: expr.into(),
                    path,
                };
                Ok(Expr::with_span(has.into(), span))
            }
            ExprKind::Abs(abs) => self.reduce_abs(abs, span, ctx, cache),
            ExprKind::Let(expr_let) => self.reduce_let(expr_let, span, ctx, cache),
            ExprKind::If(expr_if) => self.reduce_if(expr_if, span, ctx, cache),
            ExprKind::With(with) => {
                debug!("clearing scope for with at {}", span);
                ctx.with_cleared(|ctx| {
                    let scope = self.reduce_expr(*with.scope, ctx, cache)?;
                    let body = self.reduce_expr(*with.body, ctx, cache)?;
                    let with = ExprWith {
                        scope: scope.into(),
                        body: body.into(),
                    };
                    Ok(Expr::with_span(with.into(), span))
                })
            }
            ExprKind::Assert(assert) => {
                let cond = self.reduce_expr(*assert.cond, ctx, cache)?;
                let body = self.reduce_expr(*assert.body, ctx, cache)?;
                // a false assertion is left for the evaluator to report
                if cond.as_bool() == Some(true) {
                    debug!("eliding assert at {}", span);
                    return Ok(body);
                }
                let assert = ExprAssert {
                    cond: cond.into(),
                    body: body.into(),
                };
                Ok(Expr::with_span(assert.into(), span))
            }
        }
    }

    fn reduce_unary(
        &self,
        unary: ExprUnary,
        span: Span,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<Expr> {
        let operand = self.reduce_expr(*unary.operand, ctx, cache)?;
        let folded = match (unary.op, operand.as_constant()) {
            (UnaryOp::Neg, Some(Constant::Int(value))) => value.checked_neg().map(Constant::Int),
            (UnaryOp::Not, Some(Constant::Bool(value))) => Some(Constant::Bool(!value)),
            _ => None,
        };
        if let Some(constant) = folded {
            debug!("folded {:?} {} to {}", unary.op, operand, constant);
            return Ok(Expr::constant(constant).at(span));
        }
        let unary = ExprUnary {
            op: unary.op,
            operand: operand.into(),
        };
        Ok(Expr::with_span(unary.into(), span))
    }

    fn reduce_binary(
        &self,
        binary: ExprBinary,
        span: Span,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<Expr> {
        let lhs = self.reduce_expr(*binary.lhs, ctx, cache)?;
        let rhs = self.reduce_expr(*binary.rhs, ctx, cache)?;
        if binary.op == BinaryOp::Plus {
            if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
                // overflow is the evaluator's to report
                if let Some(sum) = a.checked_add(b) {
                    debug!("folded {} + {} to {}", a, b, sum);
                    return Ok(Expr::int(sum).at(span));
                }
            }
        }
        let binary = ExprBinary {
            op: binary.op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        };
        Ok(Expr::with_span(binary.into(), span))
    }

    fn reduce_app(
        &self,
        app: ExprBinary,
        span: Span,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<Expr> {
        let syntactic_lambda = match app.lhs.kind() {
            ExprKind::Abs(abs) if abs.single_param().is_some() => Some(abs.clone()),
            _ => None,
        };
        let function = self.reduce_expr(*app.lhs, ctx, cache)?;
        let argument = self.reduce_expr(*app.rhs, ctx, cache)?;

        if self.is_import(&function, ctx) {
            if let Some(path) = argument.as_literal_path() {
                let path = path.to_path_buf();
                return self.resolve_import(&path, ctx, cache);
            }
            debug!("import of non-literal {} left in place", argument);
        } else if let Some(reduced) =
            self.beta_reduce(syntactic_lambda, &function, &argument, span, ctx, cache)?
        {
            return Ok(reduced);
        }
        Ok(rebuild_app(function, argument, span))
    }

    /// Substitute a static argument into a single-parameter function.
    ///
    /// `None` leaves the application in place: the function is not a known
    /// lambda, the argument is not static, or the parameter is still
    /// referenced after reduction (inside `with` or a recursive set, where
    /// the stack was cleared).
    fn beta_reduce(
        &self,
        syntactic_lambda: Option<ExprAbs>,
        function: &Expr,
        argument: &Expr,
        span: Span,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<Option<Expr>> {
        let Some(abs) = function.as_abs() else {
            return Ok(None);
        };
        let Some(param) = abs.single_param() else {
            return Ok(None);
        };
        if !is_static_value(argument) {
            return Ok(None);
        }
        // The unreduced body is preferred: trees spliced in by imports are
        // never re-entered under the new frame.
        let body = match syntactic_lambda {
            Some(original) => *original.body,
            None if is_static_value(function) => (*abs.body).clone(),
            None => return Ok(None),
        };
        let mut frame = ScopeFrame::new();
        frame.insert_known(param, argument.clone());
        let reduced = ctx.with_pushed(frame, |ctx| self.reduce_expr(body, ctx, cache))?;
        if may_reference(&reduced, param) {
            debug!("{} still refers to {}, keeping application at {}", reduced, param, span);
            return Ok(None);
        }
        debug!("beta-reduced {} with {} = {}", span, param, argument);
        Ok(Some(reduced))
    }

    /// `import` that was not rebound by an enclosing function or `let`,
    /// including bindings hidden by a cleared scope.
    fn is_import(&self, function: &Expr, ctx: &ReduceContext) -> bool {
        let name = self.options.import_symbol.as_str();
        function.as_symbol() == Some(name) && !ctx.scope().is_bound(name)
    }

    fn reduce_attr_set(
        &self,
        set: ExprAttrSet,
        span: Span,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<Expr> {
        let recursive = set.recursive;
        let bindings = if recursive || set.has_inherit() {
            debug!("clearing scope for attribute set at {}", span);
            ctx.with_cleared(|ctx| self.reduce_bindings(set.bindings, ctx, cache))?
        } else {
            self.reduce_bindings(set.bindings, ctx, cache)?
        };
        let set = ExprAttrSet {
            recursive,
            bindings,
        };
        Ok(Expr::with_span(set.into(), span))
    }

    fn reduce_let(
        &self,
        expr_let: ExprLet,
        span: Span,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<Expr> {
        // let is recursive: its own names shadow outer bindings everywhere inside it
        let shadow = ScopeFrame::opaque(
            expr_let
                .bindings
                .iter()
                .flat_map(|binding| binding.introduced_names()),
        );
        ctx.with_pushed(shadow, |ctx| {
            let bindings = self.reduce_bindings(expr_let.bindings, ctx, cache)?;
            let mut statics = ScopeFrame::new();
            for binding in &bindings {
                if let (Some(name), Binding::Named(named)) = (binding.simple_name(), binding) {
                    if is_static_value(&named.value) {
                        statics.insert_known(name, named.value.clone());
                    }
                }
            }
            // relative imports in the body belong to the file the wrapper names
            let body_ctx = match bindings.iter().find_map(|b| self.current_file_of(b)) {
                Some(file) => {
                    trace!("reducing let body at {} as {}", span, file.display());
                    ctx.in_file(file)
                }
                None => ctx.clone(),
            };
            let body = body_ctx
                .with_pushed(statics, |ctx| self.reduce_expr(*expr_let.body, ctx, cache))?;
            let expr_let = ExprLet {
                bindings,
                body: body.into(),
            };
            Ok(Expr::with_span(expr_let.into(), span))
        })
    }

    /// The absolute path a binding of the current-file name holds.
    fn current_file_of(&self, binding: &Binding) -> Option<PathBuf> {
        let Binding::Named(named) = binding else {
            return None;
        };
        if binding.simple_name() != Some(self.options.current_file_binding.as_str()) {
            return None;
        }
        named
            .value
            .as_literal_path()
            .filter(|path| path.is_absolute())
            .map(Path::to_path_buf)
    }

    fn reduce_if(
        &self,
        expr_if: ExprIf,
        span: Span,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<Expr> {
        let cond = self.reduce_expr(*expr_if.cond, ctx, cache)?;
        match cond.as_bool() {
            Some(true) => {
                debug!("taking then branch at {}", span);
                self.reduce_expr(*expr_if.then, ctx, cache)
            }
            Some(false) => {
                debug!("taking else branch at {}", span);
                self.reduce_expr(*expr_if.elze, ctx, cache)
            }
            None => {
                let then = self.reduce_expr(*expr_if.then, ctx, cache)?;
                let elze = self.reduce_expr(*expr_if.elze, ctx, cache)?;
                let expr_if = ExprIf {
                    cond: cond.into(),
                    then: then.into(),
                    elze: elze.into(),
                };
                Ok(Expr::with_span(expr_if.into(), span))
            }
        }
    }

    fn reduce_abs(
        &self,
        abs: ExprAbs,
        span: Span,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<Expr> {
        let frame = ScopeFrame::opaque(abs.params.names());
        ctx.with_pushed(frame, |ctx| {
            let params = match abs.params {
                Params::Pattern(pattern) => {
                    let fields = pattern
                        .fields
                        .into_iter()
                        .map(|field| {
                            let default = match field.default {
                                Some(default) => Some(self.reduce_expr(default, ctx, cache)?),
                                None => None,
                            };
                            Ok(ParamField {
                                name: field.name,
                                default,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Params::Pattern(ParamPattern { fields, ..pattern })
                }
                ident => ident,
            };
            let body = self.reduce_expr(*abs.body, ctx, cache)?;
            let abs = ExprAbs {
                params,
                body: body.into(),
            };
            Ok(Expr::with_span(abs.into(), span))
        })
    }

    fn reduce_bindings(
        &self,
        bindings: Vec<Binding>,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<Vec<Binding>> {
        bindings
            .into_iter()
            .map(|binding| match binding {
                Binding::Named(named) => {
                    let path = self.reduce_attr_path(named.path, ctx, cache)?;
                    let value = self.reduce_expr(named.value, ctx, cache)?;
                    Ok(Binding::Named(BindingNamed {
                        path,
                        value,
                        span: named.span,
                    }))
                }
                Binding::Inherit(inherit) => {
                    let from = match inherit.from {
                        Some(from) => Some(self.reduce_expr(*from, ctx, cache)?.into()),
                        None => None,
                    };
                    Ok(Binding::Inherit(BindingInherit { from, ..inherit }))
                }
            })
            .collect()
    }

    fn reduce_attr_path(
        &self,
        path: AttrPath,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<AttrPath> {
        path.into_iter()
            .map(|key| match key {
                KeyName::Dynamic(expr) => Ok(KeyName::Dynamic(self.reduce_expr(expr, ctx, cache)?)),
                key => Ok(key),
            })
            .collect()
    }
}

fn rebuild_app(function: Expr, argument: Expr, span: Span) -> Expr {
    let app = ExprBinary {
        op: BinaryOp::App,
        lhs: function.into(),
        rhs: argument.into(),
    };
    Expr::with_span(app.into(), span)
}
