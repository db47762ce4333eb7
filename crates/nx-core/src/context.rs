use crate::ast::Expr;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a scope frame knows about a name.
#[derive(Clone, Debug, PartialEq)]
pub enum ScopeValue {
    /// Statically known value, safe to inline at every use.
    Known(Expr),
    /// Bound, but the value is unknown (function parameters, recursive
    /// bindings). Shadows outer frames without providing a value.
    Opaque,
}

/// One layer of name bindings.
#[derive(Clone, Default, Debug)]
pub struct ScopeFrame {
    bindings: HashMap<String, ScopeValue>,
}

impl ScopeFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame shadowing every given name without a value.
    pub fn opaque<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut frame = Self::new();
        for name in names {
            frame.insert_opaque(name);
        }
        frame
    }

    pub fn insert_known(&mut self, name: impl Into<String>, value: Expr) {
        self.bindings.insert(name.into(), ScopeValue::Known(value));
    }

    pub fn insert_opaque(&mut self, name: impl Into<String>) {
        self.bindings.insert(name.into(), ScopeValue::Opaque);
    }

    pub fn get(&self, name: &str) -> Option<&ScopeValue> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

struct ScopeNode {
    parent: Option<Arc<ScopeNode>>,
    frame: ScopeFrame,
    /// Set by clearing: values below are hidden, names stay lexically bound.
    barrier: bool,
}

/// Ordered sequence of frames, innermost last.
///
/// The stack is persistent: pushing or clearing yields a new stack and leaves
/// the receiver untouched, so the caller's stack is back in effect on every
/// exit path of the scoped computation, early returns and errors included.
#[derive(Clone, Default)]
pub struct ScopeStack {
    top: Option<Arc<ScopeNode>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Innermost visible binding for `name`. `None` means the symbol is
    /// free, hidden by a clear, or shadowed by an opaque binding, and must be
    /// left unresolved.
    pub fn lookup(&self, name: &str) -> Option<Expr> {
        match self.resolve(name, true)? {
            ScopeValue::Known(expr) => Some(expr.clone()),
            ScopeValue::Opaque => None,
        }
    }

    /// Whether any enclosing frame binds `name`, with or without a known
    /// value. Frames hidden by [`ScopeStack::with_cleared`] still count.
    pub fn is_bound(&self, name: &str) -> bool {
        self.resolve(name, false).is_some()
    }

    fn resolve(&self, name: &str, stop_at_barrier: bool) -> Option<&ScopeValue> {
        let mut node = self.top.as_deref();
        while let Some(current) = node {
            if current.barrier && stop_at_barrier {
                return None;
            }
            if let Some(value) = current.frame.get(name) {
                return Some(value);
            }
            node = current.parent.as_deref();
        }
        None
    }

    /// Whether no binding is visible to [`ScopeStack::lookup`].
    pub fn is_empty(&self) -> bool {
        let mut node = self.top.as_deref();
        while let Some(current) = node {
            if current.barrier {
                return true;
            }
            if !current.frame.is_empty() {
                return false;
            }
            node = current.parent.as_deref();
        }
        true
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.top.as_deref();
        while let Some(current) = node {
            depth += 1;
            node = current.parent.as_deref();
        }
        depth
    }

    /// The stack extended by one frame.
    pub fn pushed(&self, frame: ScopeFrame) -> Self {
        self.push_node(frame, false)
    }

    fn push_node(&self, frame: ScopeFrame, barrier: bool) -> Self {
        Self {
            top: Some(Arc::new(ScopeNode {
                parent: self.top.clone(),
                frame,
                barrier,
            })),
        }
    }

    /// Evaluate `body` with `frame` pushed on top of this stack.
    pub fn with_pushed<T>(&self, frame: ScopeFrame, body: impl FnOnce(&ScopeStack) -> T) -> T {
        let inner = self.pushed(frame);
        body(&inner)
    }

    /// Evaluate `body` with every frame's values hidden.
    pub fn with_cleared<T>(&self, body: impl FnOnce(&ScopeStack) -> T) -> T {
        let inner = self.push_node(ScopeFrame::new(), true);
        body(&inner)
    }
}

impl Debug for ScopeStack {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut frames = Vec::new();
        let mut node = self.top.as_deref();
        while let Some(current) = node {
            if current.barrier {
                frames.push(None);
            } else {
                frames.push(Some(&current.frame));
            }
            node = current.parent.as_deref();
        }
        frames.reverse();
        f.debug_list().entries(frames).finish()
    }
}

/// Where a reduction currently is: the file being reduced and the lexical
/// bindings in effect. Replaced wholesale when entering an imported file.
#[derive(Clone, Debug, Default)]
pub struct ReduceContext {
    file: Option<PathBuf>,
    scope: ScopeStack,
}

impl ReduceContext {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self {
            file,
            scope: ScopeStack::new(),
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn scope(&self) -> &ScopeStack {
        &self.scope
    }

    pub fn lookup(&self, name: &str) -> Option<Expr> {
        self.scope.lookup(name)
    }

    /// The same bindings, attributed to `file`.
    pub fn in_file(&self, file: PathBuf) -> ReduceContext {
        ReduceContext {
            file: Some(file),
            scope: self.scope.clone(),
        }
    }

    /// Evaluate `body` in a context with `frame` pushed.
    pub fn with_pushed<T>(&self, frame: ScopeFrame, body: impl FnOnce(&ReduceContext) -> T) -> T {
        self.scope.with_pushed(frame, |scope| {
            body(&ReduceContext {
                file: self.file.clone(),
                scope: scope.clone(),
            })
        })
    }

    /// Evaluate `body` in a context with an empty scope stack.
    pub fn with_cleared<T>(&self, body: impl FnOnce(&ReduceContext) -> T) -> T {
        self.scope.with_cleared(|scope| {
            body(&ReduceContext {
                file: self.file.clone(),
                scope: scope.clone(),
            })
        })
    }
}
