//! File access for the loader and the exporters.
//!
//! Paths are virtual, slash separated strings such as `/Game/sprites.png`.
//! A [`FileProvider`] turns a root into the flat listing the router consumes
//! and reads bytes for the parsers. A [`Workspace`] adds the write side used
//! by the exporters (directory creation, unique names, saving files).
//!
//! Two implementations are provided:
//! - [`MountedFileSystem`]: maps virtual prefixes (`/Game/`, `/App/`, ...) to disk directories
//! - [`MemoryFileSystem`]: everything in memory, for tests and embedded cartridges

pub mod mounted;
pub mod memory;

pub use memory::MemoryFileSystem;
pub use mounted::MountedFileSystem;

use indexmap::IndexMap;
use regex::Regex;
use std::io;
use std::sync::LazyLock;

/// Read side: listing and file bytes.
pub trait FileProvider: Send + Sync {
    /// Flat listing of every available file path.
    fn list(&self) -> io::Result<Vec<String>>;

    fn exists(&self, path: &str) -> bool;

    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Write side used by export flows.
pub trait Workspace: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    fn create_directory_recursive(&self, path: &str) -> io::Result<()>;

    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()>;

    /// First path derived from `path` that does not exist yet.
    fn unique_file_path(&self, path: &str) -> String {
        let (dir, file) = split_parent(path);
        let (stem, extension) = split_extension(file);

        if !Workspace::exists(self, path) {
            return path.to_string();
        }

        let (base, start) = split_counter(stem);
        (start + 1..)
            .map(|n| format!("{dir}{base}-{n}{extension}"))
            .find(|candidate| !Workspace::exists(self, candidate))
            .unwrap_or_else(|| path.to_string())
    }

    /// Writes every file, stopping at the first failure.
    fn save_files(&self, files: &IndexMap<String, Vec<u8>>) -> io::Result<()> {
        for (path, bytes) in files {
            self.write(path, bytes)?;
        }
        Ok(())
    }
}

static COUNTER_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<base>.*?)-(?P<n>\d+)$").expect("Invalid counter regex"));

/// Splits `screenshot-4` into (`screenshot`, 4); names without a counter start at 0.
fn split_counter(stem: &str) -> (&str, u64) {
    match COUNTER_SUFFIX.captures(stem) {
        Some(caps) => {
            let base = caps.name("base").map_or(stem, |m| m.as_str());
            let n = caps
                .name("n")
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            (base, n)
        }
        None => (stem, 0),
    }
}

/// Splits `/Tmp/a.png` into (`/Tmp/`, `a.png`).
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => path.split_at(i + 1),
        None => ("", path),
    }
}

/// Splits `a.font.png` into (`a.font`, `.png`).
pub fn split_extension(file: &str) -> (&str, &str) {
    match file.rfind('.') {
        Some(i) if i > 0 => file.split_at(i),
        _ => (file, ""),
    }
}

/// File name without directories or any extension: `/Game/Sprites/hero.png` → `hero`.
pub fn file_stem(path: &str) -> &str {
    let (_, file) = split_parent(path);
    file.split('.').next().unwrap_or(file)
}

/// Joins a directory path and a file name with exactly one separator.
pub fn join(dir: &str, file: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), file.trim_start_matches('/'))
}
