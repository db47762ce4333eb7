use crate::ast::{load_expr_from_str, Expr};
use crate::error::{Error, Result};
use crate::vfs::VirtualFileSystem;
use std::path::Path;

/// Trait implemented by every source-language frontend.
///
/// A frontend turns the contents of one file into an annotated expression
/// tree. It is invoked at most once per resolved import path during a
/// reduction run.
pub trait LanguageFrontend: Send + Sync {
    fn language(&self) -> &'static str;
    fn extensions(&self) -> &'static [&'static str];
    fn parse(&self, source: &str, path: Option<&Path>) -> Result<Expr>;
}

/// Read `path` through `fs` and parse it with `frontend`.
///
/// Read failures surface as [`Error::Fs`], syntax failures as [`Error::Parse`],
/// both naming the attempted path.
pub fn parse_file(
    frontend: &dyn LanguageFrontend,
    fs: &dyn VirtualFileSystem,
    path: &Path,
) -> Result<Expr> {
    let source = fs.read_to_string(path).map_err(|err| Error::fs(path, err))?;
    frontend.parse(&source, Some(path)).map_err(|err| match err {
        Error::Parse { .. } => err,
        other => Error::parse(path, other),
    })
}

/// Frontend for trees that an external parser serialized as JSON.
#[derive(Debug, Default, Clone)]
pub struct JsonFrontend;

impl JsonFrontend {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageFrontend for JsonFrontend {
    fn language(&self) -> &'static str {
        "json-ast"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn parse(&self, source: &str, path: Option<&Path>) -> Result<Expr> {
        load_expr_from_str(source).map_err(|err| {
            let path = path.unwrap_or_else(|| Path::new("<memory>"));
            Error::parse(path, err)
        })
    }
}
