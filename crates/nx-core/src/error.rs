use crate::vfs::FsError;
use std::path::PathBuf;
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse failed for {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("Cannot resolve {}: {source}", .path.display())]
    Fs {
        path: PathBuf,
        #[source]
        source: FsError,
    },
    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn fs(path: impl Into<PathBuf>, source: FsError) -> Self {
        Error::Fs {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Generic(e.to_string())
    }
}
impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}
