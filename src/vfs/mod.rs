//! Virtual File System
//!
//! Hierarchical in-memory inode tree with mount-point dispatch, change
//! notification, and content-store-backed chunked file storage.

pub mod inode;
pub mod path;
pub mod providers;
pub mod types;
pub mod vfs;
pub mod watch;

pub use providers::StaticProvider;
pub use types::{Dirent, FileKind, MountProvider, Stat, VfsError, WatchEvent};
pub use vfs::Vfs;
pub use watch::WatchHandle;
