use nx_core::error::Error;
use nx_core::vfs::FsError;
use std::path::Path;
use tracing::error;

/// Fatal filesystem failure while resolving an import
pub fn import_fs_error(path: &Path, source: FsError) -> Error {
    error!("cannot resolve import {}: {}", path.display(), source);
    Error::fs(path, source)
}

/// Fatal failure reading or parsing an imported file. Frontend errors
/// already name the file and are passed through.
pub fn import_parse_error(path: &Path, err: Error) -> Error {
    error!("cannot load import {}: {}", path.display(), err);
    match err {
        Error::Parse { .. } | Error::Fs { .. } => err,
        other => Error::parse(path, other),
    }
}

/// Invalid reducer configuration
pub fn config_error(message: impl Into<String>) -> Error {
    Error::Generic(format!("invalid reduce options: {}", message.into()))
}
