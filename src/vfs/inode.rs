//! Inode Tree
//!
//! In-memory representation of files and directories. A file's bytes live
//! either inline on the inode or as chunk references into the content
//! store, never both.

use std::collections::HashMap;

use chrono::Utc;

use crate::content::ChunkRef;
use crate::vfs::types::FileKind;

/// Millisecond epoch timestamp.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Backing storage for a file's bytes.
#[derive(Debug, Clone)]
pub enum FileData {
    /// Small files keep their bytes on the inode.
    Inline(Vec<u8>),
    /// Large files hold refs into the content store.
    Chunked {
        refs: Vec<ChunkRef>,
        stored_size: u64,
    },
}

impl FileData {
    pub fn size(&self) -> u64 {
        match self {
            FileData::Inline(bytes) => bytes.len() as u64,
            FileData::Chunked { stored_size, .. } => *stored_size,
        }
    }
}

/// Node payload: file bytes or directory children.
#[derive(Debug, Clone)]
pub enum InodeKind {
    File { data: FileData },
    Directory { children: HashMap<String, Inode> },
}

/// One node in the tree. A directory owns its children; the map key always
/// equals the child's `name`.
#[derive(Debug, Clone)]
pub struct Inode {
    /// Last path segment; `""` for the root directory
    pub name: String,
    /// POSIX permission bits
    pub mode: u32,
    /// Millisecond epoch
    pub ctime: i64,
    /// Millisecond epoch
    pub mtime: i64,
    /// Cached content-type hint for the file's name
    pub mime: Option<String>,
    pub kind: InodeKind,
}

impl Inode {
    pub fn new_file(name: impl Into<String>, data: FileData) -> Self {
        let name = name.into();
        let now = now_ms();
        let mime = guess_mime(&name);
        Self {
            name,
            mode: 0o644,
            ctime: now,
            mtime: now,
            mime,
            kind: InodeKind::File { data },
        }
    }

    pub fn new_dir(name: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            name: name.into(),
            mode: 0o755,
            ctime: now,
            mtime: now,
            mime: None,
            kind: InodeKind::Directory {
                children: HashMap::new(),
            },
        }
    }

    /// Root inode: an unnamed directory.
    pub fn root() -> Self {
        Self::new_dir("")
    }

    pub fn file_kind(&self) -> FileKind {
        match self.kind {
            InodeKind::File { .. } => FileKind::File,
            InodeKind::Directory { .. } => FileKind::Directory,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, InodeKind::Directory { .. })
    }

    /// Stat size: stored byte length for files, child count for dirs.
    pub fn size(&self) -> u64 {
        match &self.kind {
            InodeKind::File { data } => data.size(),
            InodeKind::Directory { children } => children.len() as u64,
        }
    }

    pub fn children(&self) -> Option<&HashMap<String, Inode>> {
        match &self.kind {
            InodeKind::Directory { children } => Some(children),
            InodeKind::File { .. } => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut HashMap<String, Inode>> {
        match &mut self.kind {
            InodeKind::Directory { children } => Some(children),
            InodeKind::File { .. } => None,
        }
    }

    /// Walk `segs` down from this node.
    pub fn find(&self, segs: &[String]) -> Option<&Inode> {
        let mut node = self;
        for seg in segs {
            node = node.children()?.get(seg)?;
        }
        Some(node)
    }

    /// Walk `segs` down from this node, mutably.
    pub fn find_mut(&mut self, segs: &[String]) -> Option<&mut Inode> {
        let mut node = self;
        for seg in segs {
            node = node.children_mut()?.get_mut(seg)?;
        }
        Some(node)
    }

    pub fn touch(&mut self) {
        self.mtime = now_ms();
    }
}

/// Content-type hint from the file name extension.
pub fn guess_mime(name: &str) -> Option<String> {
    let ext = name.rsplit('.').next()?;
    if ext == name {
        return None;
    }
    let mime = match ext.to_ascii_lowercase().as_str() {
        "txt" | "log" | "conf" | "md" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "sh" => "application/x-sh",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        "wasm" => "application/wasm",
        _ => return None,
    };
    Some(mime.to_string())
}

// ============================================================================
// Tests
// ============================================================================
