//! VFS Operations
//!
//! The public filesystem surface: path resolution, mount-point dispatch,
//! inode-tree mutation, chunked storage promotion, and change
//! notification. All operations are atomic with respect to the tree —
//! they validate first, then mutate, so a failed call leaves the tree
//! unchanged. Watch listeners run synchronously before the operation
//! returns, after the tree lock is released.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::content::{ChunkRef, ContentStore, CHUNK_THRESHOLD};
use crate::vfs::inode::{now_ms, FileData, Inode, InodeKind};
use crate::vfs::path;
use crate::vfs::types::{Dirent, FileKind, MountProvider, Stat, VfsError, WatchEvent};
use crate::vfs::watch::{WatchHandle, WatchHub, WatchListener};

struct Mount {
    path: String,
    provider: Arc<dyn MountProvider>,
}

/// The virtual filesystem.
pub struct Vfs {
    tree: RwLock<Inode>,
    /// Sorted by descending path length so the first prefix match wins
    mounts: RwLock<Vec<Mount>>,
    store: Arc<ContentStore>,
    watch: WatchHub,
}

impl Vfs {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self {
            tree: RwLock::new(Inode::root()),
            mounts: RwLock::new(Vec::new()),
            store,
            watch: WatchHub::new(),
        }
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Watch subscriptions
    // ------------------------------------------------------------------

    pub fn subscribe(&self, listener: WatchListener) -> WatchHandle {
        self.watch.subscribe(listener)
    }

    pub fn subscribe_path(&self, scope: &str, listener: WatchListener) -> WatchHandle {
        self.watch.subscribe_path(scope, listener)
    }

    pub fn unsubscribe(&self, handle: WatchHandle) {
        self.watch.unsubscribe(handle)
    }

    // ------------------------------------------------------------------
    // Mounts
    // ------------------------------------------------------------------

    /// Delegate the subtree at `mount_path` to `provider`.
    pub async fn mount(&self, mount_path: &str, provider: Arc<dyn MountProvider>) {
        let normalized = path::normalize(mount_path);
        let mut mounts = self.mounts.write().await;
        mounts.retain(|m| m.path != normalized);
        mounts.push(Mount {
            path: normalized,
            provider,
        });
        mounts.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
    }

    pub async fn unmount(&self, mount_path: &str) {
        let normalized = path::normalize(mount_path);
        self.mounts.write().await.retain(|m| m.path != normalized);
    }

    /// Most-specific mount covering `abs`, with the provider subpath.
    async fn find_mount(&self, abs: &str) -> Option<(String, String, Arc<dyn MountProvider>)> {
        let mounts = self.mounts.read().await;
        for mount in mounts.iter() {
            if let Some(subpath) = path::strip_prefix(abs, &mount.path) {
                return Some((mount.path.clone(), subpath, mount.provider.clone()));
            }
        }
        None
    }

    /// Mount paths strictly beneath `abs`, for readdir synthesis.
    async fn mounts_under(&self, abs: &str) -> Vec<String> {
        let mounts = self.mounts.read().await;
        mounts
            .iter()
            .filter(|m| m.path != abs && path::starts_with(&m.path, abs))
            .map(|m| m.path.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    pub async fn mkdir(&self, p: &str, recursive: bool) -> Result<(), VfsError> {
        let abs = path::resolve("/", p);
        if let Some((_, subpath, provider)) = self.find_mount(&abs).await {
            return provider.mkdir(&subpath, recursive).await;
        }

        let segs = path::segments(&abs);
        if segs.is_empty() {
            return Err(VfsError::AlreadyExists {
                path: abs,
                operation: "mkdir".to_string(),
            });
        }

        let mut events = Vec::new();
        {
            let mut tree = self.tree.write().await;
            let mut node = &mut *tree;
            let mut walked = String::new();

            for (i, seg) in segs.iter().enumerate() {
                walked.push('/');
                walked.push_str(seg);
                let last = i == segs.len() - 1;

                if !node.is_directory() {
                    return Err(VfsError::NotDirectory {
                        path: abs,
                        operation: "mkdir".to_string(),
                    });
                }
                let has_child = node.children().unwrap().contains_key(seg);

                if has_child {
                    let child = node.children_mut().unwrap().get_mut(seg).unwrap();
                    if last {
                        return match (child.is_directory(), recursive) {
                            // mkdir -p on an existing directory is a no-op
                            (true, true) => Ok(()),
                            _ => Err(VfsError::AlreadyExists {
                                path: abs,
                                operation: "mkdir".to_string(),
                            }),
                        };
                    }
                    if !child.is_directory() {
                        return Err(VfsError::NotDirectory {
                            path: abs,
                            operation: "mkdir".to_string(),
                        });
                    }
                    node = child;
                } else {
                    if !last && !recursive {
                        return Err(VfsError::not_found(abs, "mkdir"));
                    }
                    node.children_mut()
                        .unwrap()
                        .insert(seg.clone(), Inode::new_dir(seg.clone()));
                    events.push(WatchEvent::Create {
                        path: walked.clone(),
                        kind: FileKind::Directory,
                    });
                    node = node.children_mut().unwrap().get_mut(seg).unwrap();
                }
            }
        }
        self.emit(events);
        Ok(())
    }

    pub async fn rmdir(&self, p: &str) -> Result<(), VfsError> {
        let abs = path::resolve("/", p);
        if let Some((_, subpath, provider)) = self.find_mount(&abs).await {
            return provider.rmdir(&subpath).await;
        }

        let segs = path::segments(&abs);
        if segs.is_empty() {
            return Err(VfsError::InvalidArgument {
                path: abs,
                operation: "rmdir".to_string(),
                message: "cannot remove root".to_string(),
            });
        }

        {
            let mut tree = self.tree.write().await;
            let (parent_segs, name) = segs.split_at(segs.len() - 1);
            let parent = tree
                .find_mut(parent_segs)
                .ok_or_else(|| VfsError::not_found(abs.clone(), "rmdir"))?;
            let child = parent
                .children()
                .ok_or_else(|| VfsError::NotDirectory {
                    path: abs.clone(),
                    operation: "rmdir".to_string(),
                })?
                .get(&name[0])
                .ok_or_else(|| VfsError::not_found(abs.clone(), "rmdir"))?;
            if !child.is_directory() {
                return Err(VfsError::NotDirectory {
                    path: abs,
                    operation: "rmdir".to_string(),
                });
            }
            if child.size() > 0 {
                return Err(VfsError::NotEmpty {
                    path: abs,
                    operation: "rmdir".to_string(),
                });
            }
            parent.children_mut().unwrap().remove(&name[0]);
        }
        self.emit(vec![WatchEvent::Delete {
            path: abs,
            kind: FileKind::Directory,
        }]);
        Ok(())
    }

    pub async fn rmdir_recursive(&self, p: &str) -> Result<(), VfsError> {
        let abs = path::resolve("/", p);
        if let Some((_, subpath, provider)) = self.find_mount(&abs).await {
            return provider.rmdir(&subpath).await;
        }

        let segs = path::segments(&abs);
        if segs.is_empty() {
            return Err(VfsError::InvalidArgument {
                path: abs,
                operation: "rmdir".to_string(),
                message: "cannot remove root".to_string(),
            });
        }

        let mut events = Vec::new();
        {
            let mut tree = self.tree.write().await;
            let (parent_segs, name) = segs.split_at(segs.len() - 1);
            let parent = tree
                .find_mut(parent_segs)
                .ok_or_else(|| VfsError::not_found(abs.clone(), "rmdir"))?;
            let child = parent
                .children()
                .ok_or_else(|| VfsError::NotDirectory {
                    path: abs.clone(),
                    operation: "rmdir".to_string(),
                })?
                .get(&name[0])
                .ok_or_else(|| VfsError::not_found(abs.clone(), "rmdir"))?;
            if !child.is_directory() {
                return Err(VfsError::NotDirectory {
                    path: abs,
                    operation: "rmdir".to_string(),
                });
            }

            let removed = parent.children_mut().unwrap().remove(&name[0]).unwrap();
            self.release_subtree(&removed, &abs, &mut events);
        }
        self.emit(events);
        Ok(())
    }

    /// Release chunk refs and record delete events, children before
    /// parents, ending with the subtree root.
    fn release_subtree(&self, node: &Inode, abs: &str, events: &mut Vec<WatchEvent>) {
        match &node.kind {
            InodeKind::Directory { children } => {
                let mut names: Vec<&String> = children.keys().collect();
                names.sort();
                for name in names {
                    let child = &children[name];
                    self.release_subtree(child, &format!("{}/{}", abs, name), events);
                }
                events.push(WatchEvent::Delete {
                    path: abs.to_string(),
                    kind: FileKind::Directory,
                });
            }
            InodeKind::File { data } => {
                if let FileData::Chunked { refs, .. } = data {
                    self.store.delete_chunked(refs);
                }
                events.push(WatchEvent::Delete {
                    path: abs.to_string(),
                    kind: FileKind::File,
                });
            }
        }
    }

    pub async fn write_file(&self, p: &str, data: &[u8]) -> Result<(), VfsError> {
        let abs = path::resolve("/", p);
        if let Some((_, subpath, provider)) = self.find_mount(&abs).await {
            provider.write_file(&subpath, data).await?;
            self.emit(vec![WatchEvent::Modify {
                path: abs,
                kind: FileKind::File,
            }]);
            return Ok(());
        }

        let event;
        {
            let mut tree = self.tree.write().await;
            let segs = path::segments(&abs);
            if segs.is_empty() {
                return Err(VfsError::IsDirectory {
                    path: abs,
                    operation: "write".to_string(),
                });
            }
            let (parent_segs, name) = segs.split_at(segs.len() - 1);
            let parent = tree
                .find_mut(parent_segs)
                .ok_or_else(|| VfsError::not_found(abs.clone(), "write"))?;
            if !parent.is_directory() {
                return Err(VfsError::NotDirectory {
                    path: abs,
                    operation: "write".to_string(),
                });
            }

            let new_data = self.make_file_data(data);
            match parent.children_mut().unwrap().get_mut(&name[0]) {
                Some(existing) => {
                    if existing.is_directory() {
                        return Err(VfsError::IsDirectory {
                            path: abs,
                            operation: "write".to_string(),
                        });
                    }
                    if let InodeKind::File {
                        data: FileData::Chunked { refs, .. },
                    } = &existing.kind
                    {
                        self.store.delete_chunked(refs);
                    }
                    existing.kind = InodeKind::File { data: new_data };
                    existing.mtime = now_ms();
                    event = WatchEvent::Modify {
                        path: abs.clone(),
                        kind: FileKind::File,
                    };
                }
                None => {
                    parent
                        .children_mut()
                        .unwrap()
                        .insert(name[0].clone(), Inode::new_file(name[0].clone(), new_data));
                    event = WatchEvent::Create {
                        path: abs.clone(),
                        kind: FileKind::File,
                    };
                }
            }
        }
        self.emit(vec![event]);
        Ok(())
    }

    pub async fn append_file(&self, p: &str, data: &[u8]) -> Result<(), VfsError> {
        let abs = path::resolve("/", p);
        if self.find_mount(&abs).await.is_some() {
            let existing = match self.read_file(&abs).await {
                Ok(bytes) => bytes,
                Err(VfsError::NotFound { .. }) => Vec::new(),
                Err(e) => return Err(e),
            };
            let mut combined = existing;
            combined.extend_from_slice(data);
            return self.write_file(&abs, &combined).await;
        }

        let event;
        {
            let mut tree = self.tree.write().await;
            let segs = path::segments(&abs);
            if segs.is_empty() {
                return Err(VfsError::IsDirectory {
                    path: abs,
                    operation: "append".to_string(),
                });
            }
            let (parent_segs, name) = segs.split_at(segs.len() - 1);
            let parent = tree
                .find_mut(parent_segs)
                .ok_or_else(|| VfsError::not_found(abs.clone(), "append"))?;
            if !parent.is_directory() {
                return Err(VfsError::NotDirectory {
                    path: abs,
                    operation: "append".to_string(),
                });
            }

            match parent.children_mut().unwrap().get_mut(&name[0]) {
                Some(existing) => {
                    if existing.is_directory() {
                        return Err(VfsError::IsDirectory {
                            path: abs,
                            operation: "append".to_string(),
                        });
                    }
                    let InodeKind::File { data: old } = &existing.kind else {
                        unreachable!()
                    };
                    let mut combined = match old {
                        FileData::Inline(bytes) => bytes.clone(),
                        FileData::Chunked { refs, .. } => {
                            let loaded =
                                self.store.load_chunked(refs).ok_or(VfsError::Truncated {
                                    path: abs.clone(),
                                    operation: "append".to_string(),
                                })?;
                            self.store.delete_chunked(refs);
                            loaded
                        }
                    };
                    combined.extend_from_slice(data);
                    existing.kind = InodeKind::File {
                        data: self.make_file_data(&combined),
                    };
                    existing.mtime = now_ms();
                    event = WatchEvent::Modify {
                        path: abs.clone(),
                        kind: FileKind::File,
                    };
                }
                None => {
                    parent.children_mut().unwrap().insert(
                        name[0].clone(),
                        Inode::new_file(name[0].clone(), self.make_file_data(data)),
                    );
                    event = WatchEvent::Create {
                        path: abs.clone(),
                        kind: FileKind::File,
                    };
                }
            }
        }
        self.emit(vec![event]);
        Ok(())
    }

    /// Promotion rule: at or above CHUNK_THRESHOLD the bytes go to the
    /// content store, below it they stay inline on the inode.
    fn make_file_data(&self, data: &[u8]) -> FileData {
        if data.len() >= CHUNK_THRESHOLD {
            FileData::Chunked {
                refs: self.store.store_chunked(data),
                stored_size: data.len() as u64,
            }
        } else {
            FileData::Inline(data.to_vec())
        }
    }

    pub async fn read_file(&self, p: &str) -> Result<Vec<u8>, VfsError> {
        let abs = path::resolve("/", p);
        if let Some((_, subpath, provider)) = self.find_mount(&abs).await {
            return provider.read_file(&subpath).await;
        }

        let tree = self.tree.read().await;
        let node = tree
            .find(&path::segments(&abs))
            .ok_or_else(|| VfsError::not_found(abs.clone(), "open"))?;
        match &node.kind {
            InodeKind::Directory { .. } => Err(VfsError::IsDirectory {
                path: abs,
                operation: "read".to_string(),
            }),
            InodeKind::File { data } => match data {
                FileData::Inline(bytes) => Ok(bytes.clone()),
                FileData::Chunked { refs, .. } => {
                    self.store.load_chunked(refs).ok_or(VfsError::Truncated {
                        path: abs,
                        operation: "read".to_string(),
                    })
                }
            },
        }
    }

    pub async fn read_file_string(&self, p: &str) -> Result<String, VfsError> {
        let bytes = self.read_file(p).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn stat(&self, p: &str) -> Result<Stat, VfsError> {
        let abs = path::resolve("/", p);
        if let Some((_, subpath, provider)) = self.find_mount(&abs).await {
            return provider.stat(&subpath).await;
        }

        let tree = self.tree.read().await;
        let node = tree
            .find(&path::segments(&abs))
            .ok_or_else(|| VfsError::not_found(abs.clone(), "stat"))?;
        Ok(Stat {
            kind: node.file_kind(),
            size: node.size(),
            ctime: node.ctime,
            mtime: node.mtime,
            mode: node.mode,
            mime: node.mime.clone(),
        })
    }

    pub async fn chmod(&self, p: &str, mode: u32) -> Result<(), VfsError> {
        let abs = path::resolve("/", p);
        if self.find_mount(&abs).await.is_some() {
            return Err(VfsError::read_only(abs, "chmod"));
        }

        let kind;
        {
            let mut tree = self.tree.write().await;
            let node = tree
                .find_mut(&path::segments(&abs))
                .ok_or_else(|| VfsError::not_found(abs.clone(), "chmod"))?;
            node.mode = mode & 0o7777;
            kind = node.file_kind();
        }
        self.emit(vec![WatchEvent::Modify { path: abs, kind }]);
        Ok(())
    }

    pub async fn unlink(&self, p: &str) -> Result<(), VfsError> {
        let abs = path::resolve("/", p);
        if let Some((_, subpath, provider)) = self.find_mount(&abs).await {
            provider.unlink(&subpath).await?;
            self.emit(vec![WatchEvent::Delete {
                path: abs,
                kind: FileKind::File,
            }]);
            return Ok(());
        }

        {
            let mut tree = self.tree.write().await;
            let segs = path::segments(&abs);
            if segs.is_empty() {
                return Err(VfsError::IsDirectory {
                    path: abs,
                    operation: "unlink".to_string(),
                });
            }
            let (parent_segs, name) = segs.split_at(segs.len() - 1);
            let parent = tree
                .find_mut(parent_segs)
                .ok_or_else(|| VfsError::not_found(abs.clone(), "unlink"))?;
            let child = parent
                .children()
                .and_then(|c| c.get(&name[0]))
                .ok_or_else(|| VfsError::not_found(abs.clone(), "unlink"))?;
            if child.is_directory() {
                return Err(VfsError::IsDirectory {
                    path: abs,
                    operation: "unlink".to_string(),
                });
            }
            let removed = parent.children_mut().unwrap().remove(&name[0]).unwrap();
            if let InodeKind::File {
                data: FileData::Chunked { refs, .. },
            } = &removed.kind
            {
                self.store.delete_chunked(refs);
            }
        }
        self.emit(vec![WatchEvent::Delete {
            path: abs,
            kind: FileKind::File,
        }]);
        Ok(())
    }

    /// Move within the tree. Disallowed across mount boundaries.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), VfsError> {
        let abs_from = path::resolve("/", from);
        let abs_to = path::resolve("/", to);
        let mount_from = self.find_mount(&abs_from).await;
        let mount_to = self.find_mount(&abs_to).await;

        let kind;
        match (&mount_from, &mount_to) {
            (Some((pa, sub_a, provider)), Some((pb, sub_b, _))) if pa == pb => {
                provider.rename(sub_a, sub_b).await?;
                kind = FileKind::File;
            }
            (None, None) => {
                let mut tree = self.tree.write().await;
                let segs_from = path::segments(&abs_from);
                let segs_to = path::segments(&abs_to);
                if segs_from.is_empty() || segs_to.is_empty() {
                    return Err(VfsError::InvalidArgument {
                        path: abs_from,
                        operation: "rename".to_string(),
                        message: "cannot rename root".to_string(),
                    });
                }
                if path::starts_with(&abs_to, &abs_from) {
                    return Err(VfsError::InvalidArgument {
                        path: abs_to,
                        operation: "rename".to_string(),
                        message: "cannot move a directory into itself".to_string(),
                    });
                }

                // Validate the destination parent before detaching the source.
                let (to_parent_segs, to_name) = segs_to.split_at(segs_to.len() - 1);
                {
                    let to_parent = tree
                        .find(to_parent_segs)
                        .ok_or_else(|| VfsError::not_found(abs_to.clone(), "rename"))?;
                    if !to_parent.is_directory() {
                        return Err(VfsError::NotDirectory {
                            path: abs_to,
                            operation: "rename".to_string(),
                        });
                    }
                    if let Some(existing) = to_parent.children().unwrap().get(&to_name[0]) {
                        if existing.is_directory() {
                            return Err(VfsError::InvalidArgument {
                                path: abs_to,
                                operation: "rename".to_string(),
                                message: "target is a directory".to_string(),
                            });
                        }
                    }
                }

                let (from_parent_segs, from_name) = segs_from.split_at(segs_from.len() - 1);
                let from_parent = tree
                    .find_mut(from_parent_segs)
                    .ok_or_else(|| VfsError::not_found(abs_from.clone(), "rename"))?;
                let mut moved = from_parent
                    .children_mut()
                    .and_then(|c| c.remove(&from_name[0]))
                    .ok_or_else(|| VfsError::not_found(abs_from.clone(), "rename"))?;
                moved.name = to_name[0].clone();
                moved.mtime = now_ms();
                kind = moved.file_kind();

                let to_parent = tree.find_mut(to_parent_segs).unwrap();
                if let Some(replaced) = to_parent
                    .children_mut()
                    .unwrap()
                    .insert(to_name[0].clone(), moved)
                {
                    if let InodeKind::File {
                        data: FileData::Chunked { refs, .. },
                    } = &replaced.kind
                    {
                        self.store.delete_chunked(refs);
                    }
                }
            }
            _ => {
                return Err(VfsError::InvalidArgument {
                    path: abs_from,
                    operation: "rename".to_string(),
                    message: "cannot rename across mount boundaries".to_string(),
                });
            }
        }

        self.emit(vec![WatchEvent::Rename {
            path: abs_to,
            old_path: abs_from,
            kind,
        }]);
        Ok(())
    }

    /// Read+write copy. Cross-mount is fine because it goes through the
    /// public read/write surface.
    pub async fn copy_file(&self, from: &str, to: &str) -> Result<(), VfsError> {
        let data = self.read_file(from).await?;
        self.write_file(to, &data).await
    }

    pub async fn touch(&self, p: &str) -> Result<(), VfsError> {
        let abs = path::resolve("/", p);
        if self.find_mount(&abs).await.is_some() {
            if self.exists(&abs).await {
                return Ok(());
            }
            return self.write_file(&abs, b"").await;
        }

        let event;
        {
            let mut tree = self.tree.write().await;
            let segs = path::segments(&abs);
            if segs.is_empty() {
                return Ok(());
            }
            let (parent_segs, name) = segs.split_at(segs.len() - 1);
            let parent = tree
                .find_mut(parent_segs)
                .ok_or_else(|| VfsError::not_found(abs.clone(), "touch"))?;
            if !parent.is_directory() {
                return Err(VfsError::NotDirectory {
                    path: abs,
                    operation: "touch".to_string(),
                });
            }
            match parent.children_mut().unwrap().get_mut(&name[0]) {
                Some(node) => {
                    node.touch();
                    event = WatchEvent::Modify {
                        path: abs.clone(),
                        kind: node.file_kind(),
                    };
                }
                None => {
                    parent.children_mut().unwrap().insert(
                        name[0].clone(),
                        Inode::new_file(name[0].clone(), FileData::Inline(Vec::new())),
                    );
                    event = WatchEvent::Create {
                        path: abs.clone(),
                        kind: FileKind::File,
                    };
                }
            }
        }
        self.emit(vec![event]);
        Ok(())
    }

    pub async fn readdir(&self, p: &str) -> Result<Vec<Dirent>, VfsError> {
        let abs = path::resolve("/", p);
        let mut entries = if let Some((_, subpath, provider)) = self.find_mount(&abs).await {
            provider.readdir(&subpath).await?
        } else {
            let tree = self.tree.read().await;
            let node = tree
                .find(&path::segments(&abs))
                .ok_or_else(|| VfsError::not_found(abs.clone(), "scandir"))?;
            let children = node.children().ok_or_else(|| VfsError::NotDirectory {
                path: abs.clone(),
                operation: "scandir".to_string(),
            })?;
            children
                .values()
                .map(|c| Dirent {
                    name: c.name.clone(),
                    kind: c.file_kind(),
                })
                .collect()
        };

        // Inject the next segment of any mount living below this directory.
        for mount_path in self.mounts_under(&abs).await {
            if let Some(sub) = path::strip_prefix(&mount_path, &abs) {
                let next = sub.trim_start_matches('/').split('/').next().unwrap_or("");
                if !next.is_empty() && !entries.iter().any(|e| e.name == next) {
                    entries.push(Dirent {
                        name: next.to_string(),
                        kind: FileKind::Directory,
                    });
                }
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub async fn readdir_stat(&self, p: &str) -> Result<Vec<(Dirent, Stat)>, VfsError> {
        let abs = path::resolve("/", p);
        let entries = self.readdir(&abs).await?;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let child_path = if abs == "/" {
                format!("/{}", entry.name)
            } else {
                format!("{}/{}", abs, entry.name)
            };
            let stat = self.stat(&child_path).await?;
            out.push((entry, stat));
        }
        Ok(out)
    }

    pub async fn exists(&self, p: &str) -> bool {
        let abs = path::resolve("/", p);
        if let Some((_, subpath, provider)) = self.find_mount(&abs).await {
            return provider.exists(&subpath).await;
        }
        let tree = self.tree.read().await;
        tree.find(&path::segments(&abs)).is_some()
    }

    fn emit(&self, events: Vec<WatchEvent>) {
        for event in &events {
            self.watch.notify(event);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::CHUNK_SIZE;
    use crate::vfs::providers::StaticProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn vfs() -> Vfs {
        Vfs::new(Arc::new(ContentStore::new()))
    }

    #[tokio::test]
    async fn test_mkdir_and_stat() {
        let fs = vfs();
        fs.mkdir("/a", false).await.unwrap();
        let stat = fs.stat("/a").await.unwrap();
        assert_eq!(stat.kind, FileKind::Directory);
        assert_eq!(stat.mode, 0o755);
        assert_eq!(stat.size, 0);
    }

    #[tokio::test]
    async fn test_mkdir_missing_parent() {
        let fs = vfs();
        let err = fs.mkdir("/a/b/c", false).await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound { .. }));
        fs.mkdir("/a/b/c", true).await.unwrap();
        assert!(fs.exists("/a/b/c").await);
    }

    #[tokio::test]
    async fn test_mkdir_exists() {
        let fs = vfs();
        fs.mkdir("/a", false).await.unwrap();
        let err = fs.mkdir("/a", false).await.unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists { .. }));
        // Recursive form tolerates an existing directory.
        fs.mkdir("/a", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let fs = vfs();
        fs.write_file("/hello.txt", b"hi there").await.unwrap();
        assert_eq!(fs.read_file("/hello.txt").await.unwrap(), b"hi there");
        assert_eq!(fs.read_file_string("/hello.txt").await.unwrap(), "hi there");
    }

    #[tokio::test]
    async fn test_write_missing_parent() {
        let fs = vfs();
        let err = fs.write_file("/no/file.txt", b"x").await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_write_to_directory() {
        let fs = vfs();
        fs.mkdir("/dir", false).await.unwrap();
        let err = fs.write_file("/dir", b"x").await.unwrap_err();
        assert!(matches!(err, VfsError::IsDirectory { .. }));
        let err = fs.read_file("/dir").await.unwrap_err();
        assert!(matches!(err, VfsError::IsDirectory { .. }));
    }

    #[tokio::test]
    async fn test_chunked_promotion() {
        let fs = vfs();
        // 251 is coprime to the chunk size, so every chunk is distinct.
        let data: Vec<u8> = (0..1_100_000_usize).map(|i| (i % 251) as u8).collect();
        fs.write_file("/big.bin", &data).await.unwrap();

        // 4 full chunks plus a 51424-byte tail.
        assert_eq!(fs.store().count(), 5);
        let stat = fs.stat("/big.bin").await.unwrap();
        assert_eq!(stat.size, 1_100_000);
        assert_eq!(fs.read_file("/big.bin").await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_chunk_dedup_identical_blocks() {
        let fs = vfs();
        let mut data = Vec::new();
        for _ in 0..8 {
            data.extend_from_slice(&vec![7_u8; CHUNK_SIZE]);
        }
        fs.write_file("/same.bin", &data).await.unwrap();
        assert_eq!(fs.store().count(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_chunked_releases_refs() {
        let fs = vfs();
        let data = vec![1_u8; CHUNK_THRESHOLD];
        fs.write_file("/f", &data).await.unwrap();
        assert!(fs.store().count() > 0);
        fs.write_file("/f", b"small now").await.unwrap();
        assert_eq!(fs.store().count(), 0);
        assert_eq!(fs.read_file("/f").await.unwrap(), b"small now");
    }

    #[tokio::test]
    async fn test_unlink_releases_chunks() {
        let fs = vfs();
        fs.write_file("/f", &vec![1_u8; CHUNK_THRESHOLD]).await.unwrap();
        fs.unlink("/f").await.unwrap();
        assert_eq!(fs.store().count(), 0);
        assert!(!fs.exists("/f").await);
    }

    #[tokio::test]
    async fn test_evicted_chunk_read_is_truncated_error() {
        let store = Arc::new(ContentStore::new());
        let fs = Vfs::new(store.clone());
        let data = vec![9_u8; CHUNK_THRESHOLD];
        fs.write_file("/f", &data).await.unwrap();

        // Simulate budget-pressure eviction of one backing chunk.
        let hash = store.put(&data[..CHUNK_SIZE]);
        store.delete(&hash);

        let err = fs.read_file("/f").await.unwrap_err();
        assert!(matches!(err, VfsError::Truncated { .. }));
        // The file entry stays.
        assert!(fs.exists("/f").await);
    }

    #[tokio::test]
    async fn test_append_inline() {
        let fs = vfs();
        fs.write_file("/log", b"one\n").await.unwrap();
        fs.append_file("/log", b"two\n").await.unwrap();
        assert_eq!(fs.read_file_string("/log").await.unwrap(), "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_append_promotes_to_chunked() {
        let fs = vfs();
        fs.write_file("/f", &vec![1_u8; CHUNK_THRESHOLD - 10]).await.unwrap();
        assert_eq!(fs.store().count(), 0);
        fs.append_file("/f", &vec![2_u8; 20]).await.unwrap();
        assert!(fs.store().count() > 0);
        let stat = fs.stat("/f").await.unwrap();
        assert_eq!(stat.size, (CHUNK_THRESHOLD + 10) as u64);
    }

    #[tokio::test]
    async fn test_rename() {
        let fs = vfs();
        fs.mkdir("/a", false).await.unwrap();
        fs.mkdir("/b", false).await.unwrap();
        fs.write_file("/a/f.txt", b"data").await.unwrap();
        fs.rename("/a/f.txt", "/b/g.txt").await.unwrap();
        assert!(!fs.exists("/a/f.txt").await);
        assert_eq!(fs.read_file_string("/b/g.txt").await.unwrap(), "data");
    }

    #[tokio::test]
    async fn test_rename_directory() {
        let fs = vfs();
        fs.mkdir("/old/sub", true).await.unwrap();
        fs.write_file("/old/sub/f", b"x").await.unwrap();
        fs.rename("/old", "/new").await.unwrap();
        assert_eq!(fs.read_file_string("/new/sub/f").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_rmdir_semantics() {
        let fs = vfs();
        fs.mkdir("/d/inner", true).await.unwrap();
        let err = fs.rmdir("/d").await.unwrap_err();
        assert!(matches!(err, VfsError::NotEmpty { .. }));
        fs.rmdir("/d/inner").await.unwrap();
        fs.rmdir("/d").await.unwrap();
        assert!(!fs.exists("/d").await);
    }

    #[tokio::test]
    async fn test_rmdir_recursive_releases_chunks() {
        let fs = vfs();
        fs.mkdir("/d/sub", true).await.unwrap();
        fs.write_file("/d/sub/big", &vec![1_u8; CHUNK_THRESHOLD])
            .await
            .unwrap();
        fs.write_file("/d/small", b"x").await.unwrap();
        fs.rmdir_recursive("/d").await.unwrap();
        assert_eq!(fs.store().count(), 0);
        assert!(!fs.exists("/d").await);
    }

    #[tokio::test]
    async fn test_readdir_sorted() {
        let fs = vfs();
        fs.mkdir("/d", false).await.unwrap();
        fs.write_file("/d/b.txt", b"").await.unwrap();
        fs.write_file("/d/a.txt", b"").await.unwrap();
        fs.mkdir("/d/c", false).await.unwrap();
        let names: Vec<String> = fs
            .readdir("/d")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c"]);
    }

    #[tokio::test]
    async fn test_touch_creates_and_updates() {
        let fs = vfs();
        fs.touch("/new").await.unwrap();
        assert!(fs.exists("/new").await);
        let before = fs.stat("/new").await.unwrap().mtime;
        fs.touch("/new").await.unwrap();
        assert!(fs.stat("/new").await.unwrap().mtime >= before);
    }

    #[tokio::test]
    async fn test_copy_file() {
        let fs = vfs();
        fs.write_file("/src", b"payload").await.unwrap();
        fs.copy_file("/src", "/dst").await.unwrap();
        assert_eq!(fs.read_file("/dst").await.unwrap(), b"payload");
        assert!(fs.exists("/src").await);
    }

    // ------------------------------------------------------------------
    // Mounts
    // ------------------------------------------------------------------

    fn static_provider(files: &[(&str, &str)]) -> Arc<StaticProvider> {
        let provider = StaticProvider::new();
        for (p, content) in files {
            provider.insert(p, content.as_bytes());
        }
        Arc::new(provider)
    }

    #[tokio::test]
    async fn test_mount_read_dispatch() {
        let fs = vfs();
        fs.mount("/pkg", static_provider(&[("/readme", "mounted")]))
            .await;
        assert_eq!(fs.read_file_string("/pkg/readme").await.unwrap(), "mounted");
        assert!(fs.exists("/pkg/readme").await);
    }

    #[tokio::test]
    async fn test_mount_longest_prefix_wins() {
        let fs = vfs();
        fs.mount("/a", static_provider(&[("/b/c", "outer")])).await;
        fs.mount("/a/b", static_provider(&[("/c", "inner")])).await;
        assert_eq!(fs.read_file_string("/a/b/c").await.unwrap(), "inner");
    }

    #[tokio::test]
    async fn test_mount_write_rejected() {
        let fs = vfs();
        fs.mount("/ro", static_provider(&[])).await;
        let err = fs.write_file("/ro/f", b"x").await.unwrap_err();
        assert!(err.to_string().contains("read-only virtual filesystem"));
    }

    #[tokio::test]
    async fn test_rename_across_mount_boundary() {
        let fs = vfs();
        fs.mount("/ro", static_provider(&[("/f", "x")])).await;
        fs.mkdir("/native", false).await.unwrap();
        let err = fs.rename("/ro/f", "/native/f").await.unwrap_err();
        assert!(err.to_string().contains("across mount boundaries"));
    }

    #[tokio::test]
    async fn test_copy_across_mount_boundary() {
        let fs = vfs();
        fs.mount("/ro", static_provider(&[("/f", "content")])).await;
        fs.mkdir("/native", false).await.unwrap();
        fs.copy_file("/ro/f", "/native/f").await.unwrap();
        assert_eq!(fs.read_file_string("/native/f").await.unwrap(), "content");
    }

    #[tokio::test]
    async fn test_readdir_synthesizes_mount_entries() {
        let fs = vfs();
        fs.mkdir("/mnt", false).await.unwrap();
        fs.mount("/mnt/remote/deep", static_provider(&[])).await;
        let names: Vec<String> = fs
            .readdir("/mnt")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["remote"]);
    }

    // ------------------------------------------------------------------
    // Watch
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_watch_create_modify() {
        let fs = vfs();
        let events: Arc<Mutex<Vec<WatchEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        fs.subscribe(Arc::new(move |e| sink.lock().unwrap().push(e.clone())));

        fs.write_file("/f", b"1").await.unwrap();
        fs.write_file("/f", b"2").await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], WatchEvent::Create { .. }));
        assert!(matches!(events[1], WatchEvent::Modify { .. }));
    }

    #[tokio::test]
    async fn test_watch_recursive_mkdir_order() {
        let fs = vfs();
        let paths: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = paths.clone();
        fs.subscribe(Arc::new(move |e| {
            sink.lock().unwrap().push(e.path().to_string())
        }));

        fs.mkdir("/a/b/c", true).await.unwrap();
        assert_eq!(*paths.lock().unwrap(), vec!["/a", "/a/b", "/a/b/c"]);
    }

    #[tokio::test]
    async fn test_watch_recursive_delete_child_first() {
        let fs = vfs();
        fs.mkdir("/d/sub", true).await.unwrap();
        fs.write_file("/d/sub/f", b"x").await.unwrap();

        let paths: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = paths.clone();
        fs.subscribe(Arc::new(move |e| {
            sink.lock().unwrap().push(e.path().to_string())
        }));

        fs.rmdir_recursive("/d").await.unwrap();
        assert_eq!(*paths.lock().unwrap(), vec!["/d/sub/f", "/d/sub", "/d"]);
    }

    #[tokio::test]
    async fn test_watch_exactly_one_event_per_mutation() {
        let fs = vfs();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        fs.subscribe(Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        fs.write_file("/f", b"x").await.unwrap();
        fs.touch("/f").await.unwrap();
        fs.unlink("/f").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_watch_rename_event() {
        let fs = vfs();
        fs.write_file("/a", b"x").await.unwrap();

        let events: Arc<Mutex<Vec<WatchEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        fs.subscribe_path("/a", Arc::new(move |e| sink.lock().unwrap().push(e.clone())));

        fs.rename("/a", "/b").await.unwrap();
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path(), "/b");
        assert_eq!(events[0].old_path(), Some("/a"));
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let fs = vfs();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = fs.subscribe(Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        fs.write_file("/f", b"x").await.unwrap();
        fs.unsubscribe(handle);
        fs.write_file("/f", b"y").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
