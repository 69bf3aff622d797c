use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;

use super::{FileProvider, Workspace};

/// A virtual prefix mapped to a directory on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Virtual prefix, always of the form `/Name/`.
    pub prefix: String,
    pub root: Utf8PathBuf,
}

/// Disk-backed file system exposing several directories under virtual prefixes.
///
/// # Example
/// ```ignore
/// let fs = MountedFileSystem::new()
///     .mount("/Game/", "carts/demo")
///     .mount("/App/", "assets/builtin");
/// let listing = fs.list()?; // ["/Game/data.json", "/App/Fonts/large.font.png", ...]
/// ```
#[derive(Debug, Clone, Default)]
pub struct MountedFileSystem {
    mounts: Vec<Mount>,
}

impl MountedFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mount. Later mounts with the same prefix replace earlier ones.
    pub fn mount(mut self, prefix: &str, root: impl AsRef<Utf8Path>) -> Self {
        let prefix = format!("/{}/", prefix.trim_matches('/'));
        self.mounts.retain(|m| m.prefix != prefix);
        self.mounts.push(Mount {
            prefix,
            root: root.as_ref().to_path_buf(),
        });
        self
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Maps a virtual path onto disk. Rejects paths escaping their mount.
    pub fn resolve(&self, path: &str) -> io::Result<Utf8PathBuf> {
        let mount = self
            .mounts
            .iter()
            .find(|m| path.starts_with(&m.prefix) || path == m.prefix.trim_end_matches('/'))
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("No mount for path: {path}"))
            })?;

        let relative = path
            .strip_prefix(mount.prefix.trim_end_matches('/'))
            .unwrap_or(path)
            .trim_start_matches('/');

        if relative.split('/').any(|part| part == "..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Path escapes its mount: {path}"),
            ));
        }

        Ok(if relative.is_empty() {
            mount.root.clone()
        } else {
            mount.root.join(relative)
        })
    }

    fn walk(dir: &Utf8Path, virtual_dir: &str, out: &mut Vec<String>) -> io::Result<()> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().into_string().map_err(|name| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Non UTF-8 file name: {name:?}"),
                )
            })?;
            entries.push((name, entry.file_type()?.is_dir()));
        }
        // read_dir order is platform dependent
        entries.sort();

        for (name, is_dir) in entries {
            if is_dir {
                Self::walk(&dir.join(&name), &format!("{virtual_dir}{name}/"), out)?;
            } else {
                out.push(format!("{virtual_dir}{name}"));
            }
        }
        Ok(())
    }
}

impl FileProvider for MountedFileSystem {
    fn list(&self) -> io::Result<Vec<String>> {
        let mut files = Vec::new();
        for mount in &self.mounts {
            if !mount.root.exists() {
                tracing::warn!("Mount root {} for {} does not exist", mount.root, mount.prefix);
                continue;
            }
            Self::walk(&mount.root, &mount.prefix, &mut files)?;
        }
        tracing::debug!("Listed {} files across {} mounts", files.len(), self.mounts.len());
        Ok(files)
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.is_file())
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let disk_path = self.resolve(path)?;
        fs::read(&disk_path)
    }
}

impl Workspace for MountedFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.exists())
    }

    fn create_directory_recursive(&self, path: &str) -> io::Result<()> {
        let disk_path = self.resolve(path)?;
        fs::create_dir_all(&disk_path)?;
        tracing::debug!("Created directory {}", disk_path);
        Ok(())
    }

    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let disk_path = self.resolve(path)?;
        if let Some(parent) = disk_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&disk_path, bytes)?;
        tracing::info!("Saved {} ({} bytes)", path, bytes.len());
        Ok(())
    }
}
