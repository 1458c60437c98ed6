//! Filesystem capability: the only way protocol code touches disk.
//!
//! Every component takes a `&dyn FileSystem`, so hosts can run the whole
//! pipeline against the real disk ([`OsFs`]) or an in-memory tree ([`MemFs`]).

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::FsError;
use crate::matcher::ignore_set;

/// Directories skipped by every walk unless the caller overrides the list.
pub const DEFAULT_IGNORE: &[&str] = &[".git", "node_modules", "target"];

/// One path found by [`FileSystem::walk`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WalkEntry {
    /// Path relative to the walk root, `/`-separated.
    pub path: String,
    pub is_dir: bool,
}

impl WalkEntry {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
        }
    }

    /// Path with a trailing `/` for directories.
    pub fn display(&self) -> String {
        if self.is_dir {
            format!("{}/", self.path)
        } else {
            self.path.clone()
        }
    }
}

/// Abstract filesystem used by the packer, commands and unpacker.
pub trait FileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>, FsError>;

    /// Write `contents`, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), FsError>;

    /// Remove a file or a whole directory tree.
    fn remove(&self, path: &Path) -> Result<(), FsError>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Recursively list everything under `root`, sorted, skipping any entry
    /// whose name matches a pattern in `ignore` (and everything below it).
    fn walk(&self, root: &Path, ignore: &[String]) -> Result<Vec<WalkEntry>, FsError>;
}

/// Resolve a model-supplied relative path under `root`.
///
/// Resolution is lexical: absolute paths and `..` segments that climb above
/// `root` are rejected.
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf, FsError> {
    let escape = || FsError::Escape {
        path: relative.to_string(),
    };

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(relative.trim()).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop().ok_or_else(escape)?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }

    Ok(parts.iter().fold(root.to_path_buf(), |acc, part| acc.join(part)))
}

/// `/`-separated form of `path` relative to `root`.
pub fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// OsFs
// ---------------------------------------------------------------------------

/// The real disk. Walks use the `ignore` crate with its standard filters off,
/// so only the explicit ignore list applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl OsFs {
    pub fn new() -> Self {
        Self
    }
}

fn not_found_or_io(path: &Path, e: std::io::Error) -> FsError {
    if e.kind() == std::io::ErrorKind::NotFound {
        FsError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        FsError::Io(e)
    }
}

impl FileSystem for OsFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        std::fs::read(path).map_err(|e| not_found_or_io(path, e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), FsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), FsError> {
        let metadata = std::fs::symlink_metadata(path).map_err(|e| not_found_or_io(path, e))?;
        if metadata.is_dir() {
            std::fs::remove_dir_all(path)?;
        } else {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn walk(&self, root: &Path, ignore: &[String]) -> Result<Vec<WalkEntry>, FsError> {
        if !root.is_dir() {
            return Err(FsError::NotFound {
                path: root.to_path_buf(),
            });
        }

        let ignored = ignore_set(ignore);
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(move |entry| entry.depth() == 0 || !ignored.is_match(entry.file_name()))
            .build();

        let mut entries = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            entries.push(WalkEntry {
                path: relative_display(root, entry.path()),
                is_dir,
            });
        }

        entries.sort();
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// MemFs
// ---------------------------------------------------------------------------

/// In-memory tree. Directories exist implicitly above every file and
/// explicitly once created with [`MemFs::create_dir`].
#[derive(Debug, Default)]
pub struct MemFs {
    files: RefCell<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: RefCell<BTreeSet<PathBuf>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, builder style.
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Self {
        self.insert(path.as_ref(), contents.as_ref());
        self
    }

    pub fn create_dir(&self, path: impl AsRef<Path>) {
        let mut dirs = self.dirs.borrow_mut();
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }

    /// Contents of a file as UTF-8, if present.
    pub fn read_string(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .borrow()
            .get(path.as_ref())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn file_count(&self) -> usize {
        self.files.borrow().len()
    }

    fn insert(&self, path: &Path, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            self.create_dir(parent);
        }
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), contents.to_vec());
    }
}

impl FileSystem for MemFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), FsError> {
        if self.dirs.borrow().contains(path) {
            return Err(FsError::Io(std::io::Error::other(format!(
                "{} is a directory",
                path.display()
            ))));
        }
        self.insert(path, contents);
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), FsError> {
        if self.files.borrow_mut().remove(path).is_some() {
            return Ok(());
        }
        if !self.is_dir(path) {
            return Err(FsError::NotFound {
                path: path.to_path_buf(),
            });
        }
        self.files.borrow_mut().retain(|p, _| !p.starts_with(path));
        self.dirs.borrow_mut().retain(|p| !p.starts_with(path));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path) || self.is_dir(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.borrow().contains(path)
    }

    fn walk(&self, root: &Path, ignore: &[String]) -> Result<Vec<WalkEntry>, FsError> {
        if !self.is_dir(root) {
            return Err(FsError::NotFound {
                path: root.to_path_buf(),
            });
        }

        let ignored = ignore_set(ignore);
        let visible = |path: &Path| {
            path.strip_prefix(root)
                .map(|rel| {
                    !rel.as_os_str().is_empty()
                        && rel.components().all(|c| !ignored.is_match(c.as_os_str()))
                })
                .unwrap_or(false)
        };

        let mut entries: Vec<WalkEntry> = self
            .dirs
            .borrow()
            .iter()
            .filter(|p| visible(p))
            .map(|p| WalkEntry::dir(relative_display(root, p)))
            .collect();
        entries.extend(
            self.files
                .borrow()
                .keys()
                .filter(|p| visible(p))
                .map(|p| WalkEntry::file(relative_display(root, p))),
        );

        entries.sort();
        Ok(entries)
    }
}
