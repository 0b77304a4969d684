//! The storage abstraction every catalog path operation goes through, so the
//! catalog can run against local disk in production and an in-memory store in
//! tests without changing a single call site.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// A filesystem backend. `LocalFs` is the only backend used in production;
/// `MemFs` exists purely for fast, hermetic tests.
pub trait Filesystem: Send + Sync {
    /// Reads the entire contents of `path`.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    /// Writes `bytes` to `path`, creating parent directories as needed.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
    /// Lists the immediate children of `dir`.
    fn ls(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    /// Returns `true` if `path` exists, as any kind of entry.
    fn exists(&self, path: &Path) -> Result<bool>;
    /// Returns `true` if `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> Result<bool>;
    /// Creates `dir` and all missing parents.
    fn mkdir(&self, dir: &Path) -> Result<()>;
    /// Removes a file or, if `path` is a directory, the entire subtree.
    fn remove(&self, path: &Path) -> Result<()>;
    /// Renames/moves `from` to `to`, overwriting `to` if it exists. Used for the
    /// atomic write-temp-then-rename pattern during ingestion.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

/// A `std::fs`-backed [`Filesystem`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl Filesystem for LocalFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| Error::io(path, e))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let mut file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
        file.write_all(bytes).map_err(|e| Error::io(path, e))
    }

    fn ls(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| Error::io(dir, e))?
            .map(|entry| entry.map(|e| e.path()).map_err(|e| Error::io(dir, e)))
            .collect::<Result<_>>()?;
        entries.sort();
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(path.exists())
    }

    fn is_dir(&self, path: &Path) -> Result<bool> {
        Ok(path.is_dir())
    }

    fn mkdir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            std::fs::remove_dir_all(path).map_err(|e| Error::io(path, e))
        } else {
            std::fs::remove_file(path).map_err(|e| Error::io(path, e))
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::rename(from, to).map_err(|e| Error::io(from, e))
    }
}

/// An in-memory [`Filesystem`], for tests that need catalog semantics without
/// touching disk.
#[derive(Default)]
pub struct MemFs {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemFs {
    /// Constructs an empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filesystem for MemFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.files.lock().unwrap().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn ls(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap();
        let mut children: Vec<PathBuf> = files
            .keys()
            .filter_map(|path| {
                let rest = path.strip_prefix(dir).ok()?;
                let first = rest.components().next()?;
                Some(dir.join(first))
            })
            .collect();
        children.sort();
        children.dedup();
        Ok(children)
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        let files = self.files.lock().unwrap();
        Ok(files.contains_key(path) || files.keys().any(|p| p.starts_with(path)))
    }

    fn is_dir(&self, path: &Path) -> Result<bool> {
        let files = self.files.lock().unwrap();
        Ok(!files.contains_key(path) && files.keys().any(|p| p.starts_with(path)))
    }

    fn mkdir(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        let before = files.len();
        files.retain(|p, _| p != path && !p.starts_with(path));
        if files.len() == before {
            return Err(Error::NotFound(path.display().to_string()));
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        let moved: Vec<(PathBuf, Vec<u8>)> = files
            .iter()
            .filter(|(p, _)| p.starts_with(from))
            .map(|(p, bytes)| (to.join(p.strip_prefix(from).unwrap()), bytes.clone()))
            .collect();
        if moved.is_empty() {
            return Err(Error::NotFound(from.display().to_string()));
        }
        files.retain(|p, _| !p.starts_with(from));
        for (path, bytes) in moved {
            files.insert(path, bytes);
        }
        Ok(())
    }
}

/// A remote S3-backed [`Filesystem`]. Not implemented: every method returns
/// [`Error::NotSupported`]; a real client is outside this crate's scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct S3Fs;

/// An FTP-backed [`Filesystem`]. Not implemented: every method returns
/// [`Error::NotSupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpFs;

macro_rules! unsupported_fs {
    ($ty:ty, $name:literal) => {
        impl Filesystem for $ty {
            fn read(&self, _path: &Path) -> Result<Vec<u8>> {
                Err(Error::NotSupported($name))
            }
            fn write(&self, _path: &Path, _bytes: &[u8]) -> Result<()> {
                Err(Error::NotSupported($name))
            }
            fn ls(&self, _dir: &Path) -> Result<Vec<PathBuf>> {
                Err(Error::NotSupported($name))
            }
            fn exists(&self, _path: &Path) -> Result<bool> {
                Err(Error::NotSupported($name))
            }
            fn is_dir(&self, _path: &Path) -> Result<bool> {
                Err(Error::NotSupported($name))
            }
            fn mkdir(&self, _dir: &Path) -> Result<()> {
                Err(Error::NotSupported($name))
            }
            fn remove(&self, _path: &Path) -> Result<()> {
                Err(Error::NotSupported($name))
            }
            fn rename(&self, _from: &Path, _to: &Path) -> Result<()> {
                Err(Error::NotSupported($name))
            }
        }
    };
}

unsupported_fs!(S3Fs, "S3Fs");
unsupported_fs!(FtpFs, "FtpFs");
