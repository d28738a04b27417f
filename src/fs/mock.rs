// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, executable: bool },
    Dir,
}

/// In-memory filesystem; clones share the same tree, so a fake collaborator
/// and the code under test see each other's writes.
///
/// Parent directories are created implicitly.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(PathBuf::from("."), MockEntry::Dir);

        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    /// Plain (non-executable) file.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.insert_file(path.as_ref(), content.into(), false);
    }

    /// File with the executable bit set, e.g. a built container.
    pub fn add_executable(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.insert_file(path.as_ref(), content.into(), true);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.lock();
        Self::ensure_dirs(&mut entries, path.as_ref());
    }

    /// Remove a path and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.lock().retain(|p, _| !p.starts_with(path));
    }

    fn insert_file(&self, path: &Path, content: Vec<u8>, executable: bool) {
        let mut entries = self.lock();
        if let Some(parent) = path.parent() {
            Self::ensure_dirs(&mut entries, parent);
        }
        entries.insert(
            path.to_path_buf(),
            MockEntry::File {
                content,
                executable,
            },
        );
    }

    fn ensure_dirs(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            entries
                .entry(ancestor.to_path_buf())
                .or_insert(MockEntry::Dir);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FileSystem for MockFileSystem {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        match self.lock().get(path) {
            Some(MockEntry::File { content, .. }) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::Dir))
    }

    fn is_executable(&self, path: &Path) -> bool {
        matches!(
            self.lock().get(path),
            Some(MockEntry::File {
                executable: true,
                ..
            })
        )
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        match self.lock().get(path) {
            Some(MockEntry::Dir) => {}
            Some(MockEntry::File { .. }) => return Err(anyhow!("Not a directory: {:?}", path)),
            None => return Err(anyhow!("Directory not found: {:?}", path)),
        }
        self.remove(path);
        Ok(())
    }
}
