// Scope queries - stateless operations for variable scope analysis

use nx_core::ast::*;
use std::collections::BTreeSet;

/// Free variables of `expr`, or `None` when a `with` makes name resolution
/// inside it dynamic.
pub fn free_vars(expr: &Expr) -> Option<BTreeSet<String>> {
    let mut free = BTreeSet::new();
    collect_free(expr, &mut free)?;
    Some(free)
}

/// An expression without free variables and without `with`.
pub fn is_closed(expr: &Expr) -> bool {
    free_vars(expr).map_or(false, |free| free.is_empty())
}

/// Whether `name` may be referenced free in `expr`. Always true under `with`.
pub fn may_reference(expr: &Expr, name: &str) -> bool {
    free_vars(expr).map_or(true, |free| free.contains(name))
}

/// Values that may occupy a scope frame: constants, plain strings, paths
/// and closed functions. They have no side effects and no dependency on the
/// scope they are inlined into.
pub fn is_static_value(expr: &Expr) -> bool {
    match expr.kind() {
        ExprKind::Constant(_) | ExprKind::LiteralPath(_) | ExprKind::EnvPath(_) => true,
        ExprKind::Str(string) => string.is_plain(),
        ExprKind::Abs(_) => is_closed(expr),
        _ => false,
    }
}

fn collect_free(expr: &Expr, free: &mut BTreeSet<String>) -> Option<()> {
    match expr.kind() {
        ExprKind::Symbol(symbol) => {
            free.insert(symbol.name.clone());
        }
        ExprKind::Constant(_) | ExprKind::LiteralPath(_) | ExprKind::EnvPath(_) => {}
        ExprKind::Str(string) => {
            for part in &string.parts {
                if let StrPart::Antiquoted(expr) = part {
                    collect_free(expr, free)?;
                }
            }
        }
        ExprKind::Unary(unary) => collect_free(&unary.operand, free)?,
        ExprKind::Binary(binary) => {
            collect_free(&binary.lhs, free)?;
            collect_free(&binary.rhs, free)?;
        }
        ExprKind::List(list) => {
            for item in &list.items {
                collect_free(item, free)?;
            }
        }
        ExprKind::AttrSet(set) => {
            let mut inner = BTreeSet::new();
            collect_bindings(&set.bindings, &mut inner)?;
            if set.recursive {
                remove_introduced(&set.bindings, &mut inner);
            }
            free.extend(inner);
            free.extend(inherited_from_scope(&set.bindings));
        }
        ExprKind::Select(select) => {
            collect_free(&select.expr, free)?;
            collect_path(&select.path, free)?;
            if let Some(default) = &select.default {
                collect_free(default, free)?;
            }
        }
        ExprKind::HasAttr(has) => {
            collect_free(&has.expr, free)?;
            collect_path(&has.path, free)?;
        }
        ExprKind::Abs(abs) => {
            let mut inner = BTreeSet::new();
            if let Params::Pattern(pattern) = &abs.params {
                for field in &pattern.fields {
                    if let Some(default) = &field.default {
                        collect_free(default, &mut inner)?;
                    }
                }
            }
            collect_free(&abs.body, &mut inner)?;
            for name in abs.params.names() {
                inner.remove(name);
            }
            free.extend(inner);
        }
        ExprKind::Let(expr_let) => {
            let mut inner = BTreeSet::new();
            collect_bindings(&expr_let.bindings, &mut inner)?;
            collect_free(&expr_let.body, &mut inner)?;
            remove_introduced(&expr_let.bindings, &mut inner);
            free.extend(inner);
            free.extend(inherited_from_scope(&expr_let.bindings));
        }
        ExprKind::If(expr_if) => {
            collect_free(&expr_if.cond, free)?;
            collect_free(&expr_if.then, free)?;
            collect_free(&expr_if.elze, free)?;
        }
        ExprKind::With(_) => return None,
        ExprKind::Assert(assert) => {
            collect_free(&assert.cond, free)?;
            collect_free(&assert.body, free)?;
        }
    }
    Some(())
}

fn collect_path(path: &AttrPath, free: &mut BTreeSet<String>) -> Option<()> {
    for key in path {
        if let KeyName::Dynamic(expr) = key {
            collect_free(expr, free)?;
        }
    }
    Some(())
}

/// Free variables of binding values, `inherit (from)` sources and dynamic keys.
fn collect_bindings(bindings: &[Binding], free: &mut BTreeSet<String>) -> Option<()> {
    for binding in bindings {
        match binding {
            Binding::Named(named) => {
                collect_path(&named.path, free)?;
                collect_free(&named.value, free)?;
            }
            Binding::Inherit(inherit) => {
                if let Some(from) = &inherit.from {
                    collect_free(from, free)?;
                }
            }
        }
    }
    Some(())
}

fn remove_introduced(bindings: &[Binding], free: &mut BTreeSet<String>) {
    for binding in bindings {
        for name in binding.introduced_names() {
            free.remove(name);
        }
    }
}

/// `inherit x;` reads `x` from the enclosing scope, even inside `rec` and `let`.
fn inherited_from_scope(bindings: &[Binding]) -> impl Iterator<Item = String> + '_ {
    bindings.iter().flat_map(|binding| match binding {
        Binding::Inherit(inherit) if inherit.from.is_none() => inherit.names.clone(),
        _ => Vec::new(),
    })
}
