use crate::config::ReduceOptions;
use crate::error::{import_fs_error, import_parse_error};
use crate::passes::Reducer;
use crate::utils::ImportCache;
use nx_core::ast::{Binding, Expr};
use nx_core::context::ReduceContext;
use nx_core::error::Result;
use nx_core::frontend::parse_file;
use nx_core::vfs::VirtualFileSystem;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Canonical file an `import` of `path` written in `file` refers to.
///
/// `path` is taken relative to the directory of `file` when there is one.
/// A path naming a directory refers to the default module file inside it.
pub fn resolve_import_path(
    fs: &dyn VirtualFileSystem,
    options: &ReduceOptions,
    file: Option<&Path>,
    path: &Path,
) -> Result<PathBuf> {
    let candidate = match file.and_then(Path::parent) {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    };
    let canonical = fs
        .canonicalize(&candidate)
        .map_err(|err| import_fs_error(&candidate, err))?;
    if !fs.is_dir(&canonical) {
        return Ok(canonical);
    }
    // the default file may itself be a link
    let default_file = canonical.join(&options.default_file_name);
    fs.canonicalize(&default_file)
        .map_err(|err| import_fs_error(&default_file, err))
}

/// `let <binding> = <path>; in body`, giving an imported file access to its
/// own location.
pub fn wrap_with_current_file(options: &ReduceOptions, path: &Path, body: Expr) -> Expr {
    Expr::let_in(
        vec![Binding::named(
            options.current_file_binding.clone(),
            Expr::path(path),
        )],
        body,
    )
}

impl Reducer {
    /// Splice the reduced tree of the file `path` refers to.
    ///
    /// A file already in `cache` is returned as cached, which is the
    /// unreduced placeholder while the file is still being reduced further
    /// up the stack.
    pub fn resolve_import(
        &self,
        path: &Path,
        ctx: &ReduceContext,
        cache: &mut ImportCache,
    ) -> Result<Expr> {
        let resolved = resolve_import_path(self.fs.as_ref(), &self.options, ctx.file(), path)?;
        if let Some(state) = cache.get(&resolved) {
            debug!(
                "import cache hit for {} (done: {})",
                resolved.display(),
                state.is_done()
            );
            return Ok(state.expr().clone());
        }

        if self.options.announce_imports {
            self.announce(&resolved)?;
        }
        info!("importing {}", resolved.display());

        let parsed = parse_file(self.frontend.as_ref(), self.fs.as_ref(), &resolved)
            .map_err(|err| import_parse_error(&resolved, err))?;
        let wrapped = wrap_with_current_file(&self.options, &resolved, parsed);
        cache.begin(resolved.clone(), wrapped.clone());

        let file_ctx = ReduceContext::new(Some(resolved.clone()));
        let reduced = self.reduce_expr(wrapped, &file_ctx, cache)?;
        cache.finish(resolved, reduced.clone());
        Ok(reduced)
    }

    fn announce(&self, path: &Path) -> Result<()> {
        let mut sink = match self.announcements.lock() {
            Ok(sink) => sink,
            Err(poison) => poison.into_inner(),
        };
        writeln!(sink, "Importing file {}", path.display())?;
        sink.flush()?;
        Ok(())
    }
}
