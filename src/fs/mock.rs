// src/fs/mock.rs

use super::FileSystem;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir,
}

/// In-memory filesystem for tests.
///
/// Paths are normalised by dropping `.` components, so `./docs/a.css` and
/// `docs/a.css` refer to the same entry. The empty path is the root.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("not found: {path:?}"))
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(PathBuf::new(), MockEntry::Dir);
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    /// Add a file, creating its parent directories implicitly.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalize(path.as_ref());
        let mut entries = self.entries.lock().unwrap();
        if let Some(parent) = path.parent() {
            Self::ensure_dirs(&mut entries, parent);
        }
        entries.insert(path, MockEntry::File(content.into()));
    }

    /// Put an empty file at `path`, so creating a directory there fails.
    pub fn add_blocking_file(&self, path: impl AsRef<Path>) {
        self.add_file(path, Vec::new());
    }

    /// Snapshot of all file paths, for assertions.
    pub fn files(&self) -> Vec<PathBuf> {
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .filter(|(_, e)| matches!(e, MockEntry::File(_)))
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn ensure_dirs(entries: &mut BTreeMap<PathBuf, MockEntry>, dir: &Path) {
        let mut current = PathBuf::new();
        for comp in dir.components() {
            current.push(comp);
            entries.entry(current.clone()).or_insert(MockEntry::Dir);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let entries = self.entries.lock().unwrap();
        match entries.get(&normalize(path)) {
            Some(MockEntry::File(content)) => Ok(content.clone()),
            Some(MockEntry::Dir) => Err(io::Error::other(format!("is a directory: {path:?}"))),
            None => Err(not_found(path)),
        }
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let path = normalize(path);
        let mut entries = self.entries.lock().unwrap();
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        if !matches!(entries.get(&parent), Some(MockEntry::Dir)) {
            return Err(not_found(&parent));
        }
        if matches!(entries.get(&path), Some(MockEntry::Dir)) {
            return Err(io::Error::other(format!("is a directory: {path:?}")));
        }
        entries.insert(path, MockEntry::File(contents.to_vec()));
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut entries = self.entries.lock().unwrap();
        let mut current = PathBuf::new();
        for comp in path.components() {
            current.push(comp);
            match entries.get(&current) {
                Some(MockEntry::File(_)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("file exists where a directory is needed: {current:?}"),
                    ));
                }
                Some(MockEntry::Dir) => {}
                None => {
                    entries.insert(current.clone(), MockEntry::Dir);
                }
            }
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&path) {
            Some(MockEntry::File(_)) => {
                entries.remove(&path);
                Ok(())
            }
            Some(MockEntry::Dir) => Err(io::Error::other(format!("is a directory: {path:?}"))),
            None => Err(not_found(&path)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut entries = self.entries.lock().unwrap();
        if !matches!(entries.get(&path), Some(MockEntry::Dir)) {
            return Err(not_found(&path));
        }
        entries.retain(|p, _| !p.starts_with(&path));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap();
        entries.contains_key(&normalize(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap();
        matches!(entries.get(&normalize(path)), Some(MockEntry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap();
        matches!(entries.get(&normalize(path)), Some(MockEntry::Dir))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let key = normalize(path);
        let entries = self.entries.lock().unwrap();
        if !matches!(entries.get(&key), Some(MockEntry::Dir)) {
            return Err(not_found(path));
        }
        Ok(entries
            .keys()
            .filter(|p| p.parent() == Some(key.as_path()) && !p.as_os_str().is_empty())
            .filter_map(|p| p.file_name().map(|name| path.join(name)))
            .collect())
    }
}
