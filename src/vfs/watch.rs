//! Watch Pub/Sub
//!
//! Change notification for VFS mutations. Listeners subscribe globally or
//! scoped to a path prefix; every mutating operation notifies synchronously
//! before it returns. A panicking listener is isolated so the ones after it
//! still observe the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::vfs::path;
use crate::vfs::types::WatchEvent;

pub type WatchListener = Arc<dyn Fn(&WatchEvent) + Send + Sync>;

struct Watcher {
    id: u64,
    /// None = global subscription
    scope: Option<String>,
    listener: WatchListener,
}

/// Unsubscribe handle returned by `subscribe`/`subscribe_path`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchHandle(u64);

/// Listener registry shared by the VFS.
pub struct WatchHub {
    watchers: Mutex<Vec<Watcher>>,
    next_id: AtomicU64,
}

impl WatchHub {
    pub fn new() -> Self {
        Self {
            watchers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to every event.
    pub fn subscribe(&self, listener: WatchListener) -> WatchHandle {
        self.add(None, listener)
    }

    /// Subscribe to events at `scope` or beneath it. Renames match on
    /// either the new or the old path.
    pub fn subscribe_path(&self, scope: &str, listener: WatchListener) -> WatchHandle {
        self.add(Some(path::normalize(scope)), listener)
    }

    pub fn unsubscribe(&self, handle: WatchHandle) {
        self.watchers.lock().unwrap().retain(|w| w.id != handle.0);
    }

    /// Deliver `event` to every matching listener, in subscription order.
    pub fn notify(&self, event: &WatchEvent) {
        // Snapshot under the lock so listeners can re-enter the hub.
        let listeners: Vec<WatchListener> = {
            let watchers = self.watchers.lock().unwrap();
            watchers
                .iter()
                .filter(|w| Self::matches(w.scope.as_deref(), event))
                .map(|w| w.listener.clone())
                .collect()
        };
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                log::warn!("watch listener panicked on {:?}", event);
            }
        }
    }

    fn add(&self, scope: Option<String>, listener: WatchListener) -> WatchHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.watchers.lock().unwrap().push(Watcher {
            id,
            scope,
            listener,
        });
        WatchHandle(id)
    }

    fn matches(scope: Option<&str>, event: &WatchEvent) -> bool {
        let Some(scope) = scope else { return true };
        if path::starts_with(event.path(), scope) {
            return true;
        }
        event
            .old_path()
            .map(|old| path::starts_with(old, scope))
            .unwrap_or(false)
    }
}

impl Default for WatchHub {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::types::FileKind;
    use std::sync::atomic::AtomicUsize;

    fn create_event(p: &str) -> WatchEvent {
        WatchEvent::Create {
            path: p.to_string(),
            kind: FileKind::File,
        }
    }

    #[test]
    fn test_global_subscription() {
        let hub = WatchHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        hub.subscribe(Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        hub.notify(&create_event("/anywhere"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scoped_subscription() {
        let hub = WatchHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        hub.subscribe_path("/home/user", Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        hub.notify(&create_event("/home/user"));
        hub.notify(&create_event("/home/user/file.txt"));
        hub.notify(&create_event("/home/username"));
        hub.notify(&create_event("/tmp/file.txt"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rename_matches_old_path() {
        let hub = WatchHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        hub.subscribe_path("/src", Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        hub.notify(&WatchEvent::Rename {
            path: "/dst/file".to_string(),
            old_path: "/src/file".to_string(),
            kind: FileKind::File,
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let hub = WatchHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = hub.subscribe(Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        hub.notify(&create_event("/a"));
        hub.unsubscribe(handle);
        hub.notify(&create_event("/b"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let hub = WatchHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        hub.subscribe(Arc::new(|_| panic!("bad listener")));
        let c = count.clone();
        hub.subscribe(Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        hub.notify(&create_event("/a"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
