//! Mount Providers
//!
//! A read-only, map-backed provider for hosts that want to expose a fixed
//! tree (documentation, bundled assets) through a mount point. Also the
//! reference implementation for the provider capability rules: it leaves
//! the write operations at their rejecting defaults.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::vfs::inode::{guess_mime, now_ms};
use crate::vfs::path;
use crate::vfs::types::{Dirent, FileKind, MountProvider, Stat, VfsError};

/// Read-only provider over an in-memory path → bytes map. Intermediate
/// directories are implied by the file paths.
pub struct StaticProvider {
    files: Mutex<HashMap<String, Vec<u8>>>,
    created: i64,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            created: now_ms(),
        }
    }

    /// Add a file before mounting. `subpath` is absolute within the mount.
    pub fn insert(&self, subpath: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path::normalize(subpath), data.to_vec());
    }

    fn is_dir(&self, subpath: &str) -> bool {
        if subpath == "/" {
            return true;
        }
        let prefix = format!("{}/", subpath);
        self.files
            .lock()
            .unwrap()
            .keys()
            .any(|k| k.starts_with(&prefix))
    }
}

impl Default for StaticProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MountProvider for StaticProvider {
    async fn read_file(&self, subpath: &str) -> Result<Vec<u8>, VfsError> {
        let normalized = path::normalize(subpath);
        if self.is_dir(&normalized) {
            return Err(VfsError::IsDirectory {
                path: normalized,
                operation: "read".to_string(),
            });
        }
        self.files
            .lock()
            .unwrap()
            .get(&normalized)
            .cloned()
            .ok_or_else(|| VfsError::not_found(normalized, "open"))
    }

    async fn exists(&self, subpath: &str) -> bool {
        let normalized = path::normalize(subpath);
        self.files.lock().unwrap().contains_key(&normalized) || self.is_dir(&normalized)
    }

    async fn stat(&self, subpath: &str) -> Result<Stat, VfsError> {
        let normalized = path::normalize(subpath);
        if let Some(data) = self.files.lock().unwrap().get(&normalized) {
            return Ok(Stat {
                kind: FileKind::File,
                size: data.len() as u64,
                ctime: self.created,
                mtime: self.created,
                mode: 0o444,
                mime: guess_mime(&path::basename(&normalized)),
            });
        }
        if self.is_dir(&normalized) {
            let entries = self.readdir(&normalized).await?;
            return Ok(Stat {
                kind: FileKind::Directory,
                size: entries.len() as u64,
                ctime: self.created,
                mtime: self.created,
                mode: 0o555,
                mime: None,
            });
        }
        Err(VfsError::not_found(normalized, "stat"))
    }

    async fn readdir(&self, subpath: &str) -> Result<Vec<Dirent>, VfsError> {
        let normalized = path::normalize(subpath);
        if !self.is_dir(&normalized) {
            return if self.files.lock().unwrap().contains_key(&normalized) {
                Err(VfsError::NotDirectory {
                    path: normalized,
                    operation: "scandir".to_string(),
                })
            } else {
                Err(VfsError::not_found(normalized, "scandir"))
            };
        }

        let files = self.files.lock().unwrap();
        let mut entries: Vec<Dirent> = Vec::new();
        for key in files.keys() {
            let Some(rest) = path::strip_prefix(key, &normalized) else {
                continue;
            };
            let rest = rest.trim_start_matches('/');
            let Some(next) = rest.split('/').next() else {
                continue;
            };
            if next.is_empty() || entries.iter().any(|e| e.name == next) {
                continue;
            }
            let kind = if rest.contains('/') {
                FileKind::Directory
            } else {
                FileKind::File
            };
            entries.push(Dirent {
                name: next.to_string(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

// ============================================================================
// Tests
// ============================================================================
