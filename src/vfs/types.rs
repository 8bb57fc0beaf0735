//! VFS Types
//!
//! Error taxonomy, stat/dirent records, watch events, and the mount
//! provider trait.

use async_trait::async_trait;
use thiserror::Error;

/// File system errors. A closed set of POSIX-style kinds; every variant
/// carries the failing path.
#[derive(Error, Debug, Clone)]
pub enum VfsError {
    #[error("ENOENT: no such file or directory, {operation} '{path}'")]
    NotFound { path: String, operation: String },

    #[error("EEXIST: file already exists, {operation} '{path}'")]
    AlreadyExists { path: String, operation: String },

    #[error("ENOTDIR: not a directory, {operation} '{path}'")]
    NotDirectory { path: String, operation: String },

    #[error("EISDIR: illegal operation on a directory, {operation} '{path}'")]
    IsDirectory { path: String, operation: String },

    #[error("ENOTEMPTY: directory not empty, {operation} '{path}'")]
    NotEmpty { path: String, operation: String },

    #[error("EINVAL: {message}, {operation} '{path}'")]
    InvalidArgument {
        path: String,
        operation: String,
        message: String,
    },

    /// A chunked file lost one of its backing chunks to eviction. The
    /// file entry itself stays in the tree.
    #[error("EIO: file content truncated by cache eviction, {operation} '{path}'")]
    Truncated { path: String, operation: String },
}

impl VfsError {
    pub fn not_found(path: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::NotFound {
            path: path.into(),
            operation: operation.into(),
        }
    }

    pub fn read_only(path: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::InvalidArgument {
            path: path.into(),
            operation: operation.into(),
            message: "read-only virtual filesystem".to_string(),
        }
    }
}

/// Kind of a filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

impl FileKind {
    pub fn is_file(self) -> bool {
        matches!(self, FileKind::File)
    }

    pub fn is_directory(self) -> bool {
        matches!(self, FileKind::Directory)
    }
}

/// File status information.
///
/// For chunked files `size` is the stored byte length; for directories it
/// is the child count.
#[derive(Debug, Clone)]
pub struct Stat {
    pub kind: FileKind,
    pub size: u64,
    /// Millisecond epoch
    pub ctime: i64,
    /// Millisecond epoch
    pub mtime: i64,
    pub mode: u32,
    pub mime: Option<String>,
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    pub name: String,
    pub kind: FileKind,
}

/// Change notification emitted by every mutating VFS operation.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Create { path: String, kind: FileKind },
    Modify { path: String, kind: FileKind },
    Delete { path: String, kind: FileKind },
    Rename { path: String, old_path: String, kind: FileKind },
}

impl WatchEvent {
    /// The primary (new) path the event is about.
    pub fn path(&self) -> &str {
        match self {
            WatchEvent::Create { path, .. }
            | WatchEvent::Modify { path, .. }
            | WatchEvent::Delete { path, .. }
            | WatchEvent::Rename { path, .. } => path,
        }
    }

    /// The pre-rename path, when there is one.
    pub fn old_path(&self) -> Option<&str> {
        match self {
            WatchEvent::Rename { old_path, .. } => Some(old_path),
            _ => None,
        }
    }
}

/// A subtree delegated to an external capability object, reached by
/// path-prefix dispatch.
///
/// Read operations are required. Write operations default to rejecting
/// with `EINVAL: read-only virtual filesystem`; full-capability providers
/// override them. Subpaths are absolute within the mount (`"/"` when the
/// operation targets the mount root itself).
#[async_trait]
pub trait MountProvider: Send + Sync {
    async fn read_file(&self, subpath: &str) -> Result<Vec<u8>, VfsError>;

    async fn read_file_string(&self, subpath: &str) -> Result<String, VfsError> {
        let bytes = self.read_file(subpath).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn exists(&self, subpath: &str) -> bool;

    async fn stat(&self, subpath: &str) -> Result<Stat, VfsError>;

    async fn readdir(&self, subpath: &str) -> Result<Vec<Dirent>, VfsError>;

    async fn write_file(&self, subpath: &str, _data: &[u8]) -> Result<(), VfsError> {
        Err(VfsError::read_only(subpath, "write"))
    }

    async fn unlink(&self, subpath: &str) -> Result<(), VfsError> {
        Err(VfsError::read_only(subpath, "unlink"))
    }

    async fn mkdir(&self, subpath: &str, _recursive: bool) -> Result<(), VfsError> {
        Err(VfsError::read_only(subpath, "mkdir"))
    }

    async fn rmdir(&self, subpath: &str) -> Result<(), VfsError> {
        Err(VfsError::read_only(subpath, "rmdir"))
    }

    async fn rename(&self, old_subpath: &str, _new_subpath: &str) -> Result<(), VfsError> {
        Err(VfsError::read_only(old_subpath, "rename"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_path() {
        let err = VfsError::not_found("/etc/missing", "open");
        assert_eq!(
            err.to_string(),
            "ENOENT: no such file or directory, open '/etc/missing'"
        );

        let err = VfsError::read_only("/ro/file", "write");
        assert!(err.to_string().contains("read-only virtual filesystem"));
    }

    #[test]
    fn test_watch_event_accessors() {
        let ev = WatchEvent::Rename {
            path: "/b".to_string(),
            old_path: "/a".to_string(),
            kind: FileKind::File,
        };
        assert_eq!(ev.path(), "/b");
        assert_eq!(ev.old_path(), Some("/a"));

        let ev = WatchEvent::Create {
            path: "/x".to_string(),
            kind: FileKind::Directory,
        };
        assert_eq!(ev.old_path(), None);
    }
}
