use core::fmt;

use std::{
    collections::HashSet,
    fs::File,
    io, mem,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};

use tempfile::TempPath;
use tracing::warn;

fn registry() -> &'static Mutex<HashSet<PathBuf>> {
    static REGISTRY: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

fn lock() -> std::sync::MutexGuard<'static, HashSet<PathBuf>> {
    registry().lock().unwrap_or_else(|e| e.into_inner())
}

fn register(path: &Path) {
    lock().insert(path.to_owned());
}

fn unregister(path: &Path) {
    lock().remove(path);
}

/// Remove every scratch file still registered and return how many were
/// deleted.
///
/// Fallback for a host shutting down while requests may not have run their
/// cleanup. Request scoped removal through [Part](crate::Part) ownership
/// remains the primary path; calling this with decodes still in flight
/// pulls files out from under them.
pub fn sweep() -> usize {
    let paths = mem::take(&mut *lock());

    let mut removed = 0;
    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(_) => removed += 1,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(target: "formdata", "failed to sweep scratch file {}: {}", path.display(), e),
        }
    }
    removed
}

/// A spilled part payload on disk.
///
/// The file is removed exactly once, on [close](Self::close) or drop,
/// whichever comes first. Every live scratch file is also tracked in the
/// process wide registry consumed by [sweep].
pub(crate) struct ScratchFile {
    path: Option<TempPath>,
}

impl ScratchFile {
    /// create a scratch file inside `dir`, with `name` seeding the file
    /// name. `name` is reduced to its final path component so a declared
    /// filename can not point the file outside the cache directory.
    pub(crate) fn create(dir: &Path, name: &str) -> io::Result<(Self, File)> {
        let name = Path::new(name)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("part.tmp");

        let (file, path) = tempfile::Builder::new().prefix(name).tempfile_in(dir)?.into_parts();

        register(&path);

        Ok((Self { path: Some(path) }, file))
    }

    /// [None] once the file was closed.
    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// remove the file now. idempotent.
    pub(crate) fn close(&mut self) -> io::Result<()> {
        match self.path.take() {
            Some(path) => {
                unregister(&path);
                path.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            unregister(&path);
            // TempPath removes the file when it drops.
        }
    }
}

impl fmt::Debug for ScratchFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScratchFile").field(&self.path.as_deref()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let (scratch, _file) = ScratchFile::create(dir.path(), "a.txt").unwrap();

        let path = scratch.path().unwrap().to_owned();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("a.txt"));

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut scratch, _file) = ScratchFile::create(dir.path(), "b.bin").unwrap();

        let path = scratch.path().unwrap().to_owned();
        scratch.close().unwrap();
        assert!(!path.exists());
        assert!(scratch.path().is_none());

        scratch.close().unwrap();
    }

    #[test]
    fn name_reduced_to_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let (scratch, _file) = ScratchFile::create(dir.path(), "../../etc/passwd").unwrap();

        let path = scratch.path().unwrap();
        assert_eq!(path.parent().unwrap(), dir.path());
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("passwd"));
    }
}
