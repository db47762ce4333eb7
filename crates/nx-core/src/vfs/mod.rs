use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

#[derive(Clone, Debug)]
pub struct FileMetadata {
    pub kind: FileKind,
    pub size: u64,
}

impl FileMetadata {
    fn for_file(contents: &[u8]) -> Self {
        Self {
            kind: FileKind::File,
            size: contents.len() as u64,
        }
    }

    fn for_directory() -> Self {
        Self {
            kind: FileKind::Directory,
            size: 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    #[error("{} is not valid UTF-8", .0.display())]
    NotUtf8(PathBuf),
    #[error("too many levels of symbolic links at {}", .0.display())]
    SymlinkLoop(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type FsResult<T> = std::result::Result<T, FsError>;

/// Filesystem access needed while resolving imports.
pub trait VirtualFileSystem: Send + Sync {
    fn read(&self, path: &Path) -> FsResult<Vec<u8>>;
    /// Metadata of the target, following symlinks.
    fn metadata(&self, path: &Path) -> FsResult<FileMetadata>;
    /// Absolute path with `.`, `..` and symlinks resolved. The target must exist.
    fn canonicalize(&self, path: &Path) -> FsResult<PathBuf>;

    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    fn read_to_string(&self, path: &Path) -> FsResult<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|_| FsError::NotUtf8(path.to_path_buf()))
    }
}

/// Lexically normalise `path`: drop `.`, fold `..` into its parent.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalised = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalised.push(prefix.as_os_str()),
            Component::RootDir => normalised.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalised.pop() && !path.has_root() {
                    normalised.push("..");
                }
            }
            Component::Normal(segment) => normalised.push(segment),
        }
    }
    normalised
}

// -----------------------------------------------------------------------------
// In-memory filesystem
// -----------------------------------------------------------------------------

const MAX_SYMLINK_HOPS: usize = 40;

/// Filesystem kept in memory, rooted at `/`. Relative paths are taken
/// relative to the configured working directory.
#[derive(Clone)]
pub struct InMemoryFileSystem {
    root: Arc<Mutex<HashMap<PathBuf, FsNode>>>,
    cwd: PathBuf,
}

#[derive(Clone, Debug)]
enum FsNode {
    File {
        contents: Vec<u8>,
        metadata: FileMetadata,
    },
    Directory {
        metadata: FileMetadata,
    },
    Symlink {
        target: PathBuf,
    },
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        let mut map = HashMap::new();
        map.insert(
            PathBuf::from("/"),
            FsNode::Directory {
                metadata: FileMetadata::for_directory(),
            },
        );
        Self {
            root: Arc::new(Mutex::new(map)),
            cwd: PathBuf::from("/"),
        }
    }

    pub fn with_cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = normalize_path(&PathBuf::from("/").join(cwd));
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, FsNode>> {
        match self.root.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        normalize_path(&self.cwd.join(path))
    }

    /// Resolve `path` the way the host does: `..` applies to the target of
    /// any symlink before it, not to the link's own name.
    fn lookup_path(&self, path: &Path) -> FsResult<PathBuf> {
        self.resolve(&self.cwd.join(path))
    }

    pub fn write(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        let path = self.absolute(path.as_ref());
        let contents = contents.as_ref();
        self.ensure_dirs(path.parent());
        self.lock().insert(
            path,
            FsNode::File {
                contents: contents.to_vec(),
                metadata: FileMetadata::for_file(contents),
            },
        );
    }

    pub fn mkdirp(&self, path: impl AsRef<Path>) {
        let path = self.absolute(path.as_ref());
        self.ensure_dirs(Some(&path));
    }

    /// Create `link` pointing at `target`. A relative target is resolved
    /// against the link's directory, like a real symlink.
    pub fn symlink(&self, target: impl AsRef<Path>, link: impl AsRef<Path>) {
        let link = self.absolute(link.as_ref());
        self.ensure_dirs(link.parent());
        self.lock().insert(
            link,
            FsNode::Symlink {
                target: target.as_ref().to_path_buf(),
            },
        );
    }

    fn ensure_dirs(&self, path: Option<&Path>) {
        let Some(path) = path else {
            return;
        };
        let mut guard = self.lock();
        for ancestor in path.ancestors() {
            guard
                .entry(ancestor.to_path_buf())
                .or_insert_with(|| FsNode::Directory {
                    metadata: FileMetadata::for_directory(),
                });
        }
    }

    /// Resolve every symlink component of an absolute path, one component
    /// at a time.
    fn resolve(&self, path: &Path) -> FsResult<PathBuf> {
        let guard = self.lock();
        let mut hops = 0;
        let mut pending: Vec<PathBuf> = vec![path.to_path_buf()];
        let mut resolved = PathBuf::from("/");
        while let Some(next) = pending.pop() {
            let mut components = next.components();
            while let Some(component) = components.next() {
                match component {
                    Component::RootDir => resolved = PathBuf::from("/"),
                    Component::Normal(segment) => resolved.push(segment),
                    Component::ParentDir => {
                        if !matches!(guard.get(&resolved), Some(FsNode::Directory { .. })) {
                            return Err(FsError::NotFound(path.to_path_buf()));
                        }
                        resolved.pop();
                        continue;
                    }
                    _ => continue,
                }
                match guard.get(&resolved) {
                    None => return Err(FsError::NotFound(path.to_path_buf())),
                    Some(FsNode::Symlink { target }) => {
                        hops += 1;
                        if hops > MAX_SYMLINK_HOPS {
                            return Err(FsError::SymlinkLoop(path.to_path_buf()));
                        }
                        let rest: PathBuf = components.collect();
                        resolved.pop();
                        let base = resolved.clone();
                        pending.push(rest);
                        pending.push(base.join(target));
                        break;
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(resolved)
    }
}

impl Default for InMemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualFileSystem for InMemoryFileSystem {
    fn read(&self, path: &Path) -> FsResult<Vec<u8>> {
        let resolved = self.lookup_path(path)?;
        match self.lock().get(&resolved) {
            Some(FsNode::File { contents, .. }) => Ok(contents.clone()),
            Some(_) => Err(FsError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "cannot read directory",
            ))),
            None => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    fn metadata(&self, path: &Path) -> FsResult<FileMetadata> {
        let resolved = self.lookup_path(path)?;
        match self.lock().get(&resolved) {
            Some(FsNode::File { metadata, .. }) | Some(FsNode::Directory { metadata }) => {
                Ok(metadata.clone())
            }
            _ => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    fn canonicalize(&self, path: &Path) -> FsResult<PathBuf> {
        self.lookup_path(path)
    }
}

// -----------------------------------------------------------------------------
// Host filesystem implementation
// -----------------------------------------------------------------------------

#[derive(Default)]
pub struct OsFileSystem;

impl OsFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl VirtualFileSystem for OsFileSystem {
    fn read(&self, path: &Path) -> FsResult<Vec<u8>> {
        std::fs::read(path).map_err(|err| not_found_or_io(path, err))
    }

    fn metadata(&self, path: &Path) -> FsResult<FileMetadata> {
        let metadata = std::fs::metadata(path).map_err(|err| not_found_or_io(path, err))?;
        let kind = if metadata.is_dir() {
            FileKind::Directory
        } else if metadata.is_file() {
            FileKind::File
        } else {
            FileKind::Symlink
        };
        Ok(FileMetadata {
            kind,
            size: metadata.len(),
        })
    }

    fn canonicalize(&self, path: &Path) -> FsResult<PathBuf> {
        std::fs::canonicalize(path).map_err(|err| not_found_or_io(path, err))
    }
}

fn not_found_or_io(path: &Path, err: std::io::Error) -> FsError {
    if err.kind() == std::io::ErrorKind::NotFound {
        FsError::NotFound(path.to_path_buf())
    } else {
        FsError::Io(err)
    }
}
