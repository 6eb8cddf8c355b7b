//! Source storage backends.
//!
//! A backend exposes a tree of `.mo` files addressed by path segments,
//! e.g. `["Modelica", "Blocks", "package.mo"]`. Failures are reported as
//! absence; the [`Library`](super::library::Library) above caches results.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

pub trait StorageBackend {
    /// Child names of the directory at `path`: subdirectories and `.mo`
    /// files (without extension), excluding `package.mo`. Sorted.
    fn list(&self, path: &[String]) -> Vec<String>;

    /// Text of the file at `path`, `None` if it cannot be read.
    fn read(&self, path: &[String]) -> Option<String>;
}

/// A directory on the local file system.
#[derive(Clone, Debug)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, path: &[String]) -> PathBuf {
        let mut full = self.root.clone();
        full.extend(path);
        full
    }
}

impl StorageBackend for FileSystemStorage {
    fn list(&self, path: &[String]) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.path(path)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if entry.path().is_dir() {
                    Some(name)
                } else if name != "package.mo" {
                    name.strip_suffix(".mo").map(str::to_string)
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn read(&self, path: &[String]) -> Option<String> {
        let full = self.path(path);
        match fs::read_to_string(&full) {
            Ok(text) => {
                log::debug!("read {}", full.display());
                Some(text)
            }
            Err(_) => None,
        }
    }
}

/// An in-memory file tree. Clones share the files and the read counter.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    files: Arc<RwLock<BTreeMap<Vec<String>, String>>>,
    reads: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file at a `/`-separated path, e.g. `"P/package.mo"`.
    pub fn insert(&self, path: &str, text: &str) {
        let key = path.split('/').map(str::to_string).collect();
        if let Ok(mut files) = self.files.write() {
            files.insert(key, text.to_string());
        }
    }

    pub fn with_file(self, path: &str, text: &str) -> Self {
        self.insert(path, text);
        self
    }

    /// Number of successful reads so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl StorageBackend for MemoryStorage {
    fn list(&self, path: &[String]) -> Vec<String> {
        let Ok(files) = self.files.read() else {
            return Vec::new();
        };
        let mut names: Vec<String> = files
            .keys()
            .filter(|key| key.len() > path.len() && key.starts_with(path))
            .filter_map(|key| {
                let name = &key[path.len()];
                if key.len() > path.len() + 1 {
                    Some(name.clone())
                } else if name != "package.mo" {
                    name.strip_suffix(".mo").map(str::to_string)
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn read(&self, path: &[String]) -> Option<String> {
        let text = self.files.read().ok()?.get(path).cloned()?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> Vec<String> {
        p.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect()
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new()
            .with_file("A.mo", "model A end A;")
            .with_file("P/package.mo", "package P end P;")
            .with_file("P/B.mo", "within P; model B end B;")
            .with_file("P/Sub/package.mo", "within P; package Sub end Sub;");
        assert_eq!(storage.list(&[]), vec!["A", "P"]);
        assert_eq!(storage.list(&path("P")), vec!["B", "Sub"]);
        assert!(storage.read(&path("Missing.mo")).is_none());
        assert_eq!(storage.reads(), 0);
        assert_eq!(storage.read(&path("A.mo")).as_deref(), Some("model A end A;"));
        assert_eq!(storage.clone().reads(), 1);
    }

    #[test]
    fn test_file_system_storage() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        fs::create_dir(dir.path().join("P")).expect("failed to create dir");
        fs::write(dir.path().join("A.mo"), "model A end A;").expect("failed to write");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("failed to write");
        fs::write(dir.path().join("P").join("package.mo"), "package P end P;").expect("failed to write");
        fs::write(dir.path().join("P").join("B.mo"), "model B end B;").expect("failed to write");

        let storage = FileSystemStorage::new(dir.path());
        assert_eq!(storage.list(&[]), vec!["A", "P"]);
        assert_eq!(storage.list(&path("P")), vec!["B"]);
        assert_eq!(
            storage.read(&path("P/package.mo")).as_deref(),
            Some("package P end P;")
        );
        assert!(storage.read(&path("Q/package.mo")).is_none());
    }
}
