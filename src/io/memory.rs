use indexmap::{IndexMap, IndexSet};
use std::io;
use std::sync::RwLock;

use super::{FileProvider, Workspace};

/// In-memory file system. Listing order is insertion order.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<IndexMap<String, Vec<u8>>>,
    directories: RwLock<IndexSet<String>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a file system from `(path, bytes)` pairs.
    pub fn with_files<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, Vec<u8>)>,
        P: Into<String>,
    {
        let fs = Self::new();
        for (path, bytes) in files {
            fs.insert(path, bytes);
        }
        fs
    }

    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.insert(path.into(), bytes);
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.get(path).cloned()
    }

    pub fn has_directory(&self, path: &str) -> bool {
        let directories = self.directories.read().unwrap_or_else(|e| e.into_inner());
        directories.contains(normalize_dir(path).as_str())
    }
}

fn normalize_dir(path: &str) -> String {
    format!("{}/", path.trim_end_matches('/'))
}

impl FileProvider for MemoryFileSystem {
    fn list(&self) -> io::Result<Vec<String>> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        Ok(files.keys().cloned().collect())
    }

    fn exists(&self, path: &str) -> bool {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.contains_key(path)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.get(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("File not found: {path}"))
        })
    }
}

impl Workspace for MemoryFileSystem {
    fn exists(&self, path: &str) -> bool {
        FileProvider::exists(self, path) || self.has_directory(path)
    }

    fn create_directory_recursive(&self, path: &str) -> io::Result<()> {
        let mut directories = self.directories.write().unwrap_or_else(|e| e.into_inner());
        let mut current = String::from("/");
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push_str(part);
            current.push('/');
            directories.insert(current.clone());
        }
        Ok(())
    }

    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        self.insert(path, bytes.to_vec());
        Ok(())
    }
}
