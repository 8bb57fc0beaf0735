//! Pathname Expansion
//!
//! Matches glob fields against the VFS tree rooted at the working
//! directory. Patterns cross directory boundaries only via explicit `/`
//! separators: each path segment matches against one directory level.
//! With no match the pattern is preserved literally (nullglob off), and
//! dotfiles are skipped unless the segment explicitly starts with a dot.

use crate::interpreter::expansion::pattern::{glob_match, glob_unescape, has_glob_chars};
use crate::vfs::path;
use crate::vfs::{FileKind, Vfs};

/// Expand one pattern-encoded field into matching paths, sorted. A field
/// with no active metacharacters, or with no matches, comes back as its
/// literal (unescaped) self.
pub async fn expand_glob_field(vfs: &Vfs, cwd: &str, field: &str) -> Vec<String> {
    if !has_glob_chars(field) {
        return vec![glob_unescape(field)];
    }

    let absolute = field.starts_with('/');
    let segments: Vec<&str> = field
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let mut candidates: Vec<String> = vec![if absolute {
        "/".to_string()
    } else {
        String::new()
    }];

    for (i, segment) in segments.iter().enumerate() {
        let last = i == segments.len() - 1;
        let mut next = Vec::new();

        for candidate in &candidates {
            let abs_dir = to_absolute(cwd, candidate);
            if !has_glob_chars(segment) {
                let name = glob_unescape(segment);
                let display = join_display(candidate, &name);
                let abs = to_absolute(cwd, &display);
                if vfs.exists(&abs).await {
                    next.push(display);
                }
                continue;
            }

            let Ok(entries) = vfs.readdir(&abs_dir).await else {
                continue;
            };
            for entry in entries {
                if entry.name.starts_with('.') && !segment_allows_hidden(segment) {
                    continue;
                }
                if !last && entry.kind != FileKind::Directory {
                    continue;
                }
                if glob_match(segment, &entry.name) {
                    next.push(join_display(candidate, &entry.name));
                }
            }
        }
        candidates = next;
        if candidates.is_empty() {
            break;
        }
    }

    if candidates.is_empty() {
        return vec![glob_unescape(field)];
    }
    candidates.sort();
    candidates
}

fn segment_allows_hidden(segment: &str) -> bool {
    segment.starts_with('.') || segment.starts_with("\\.")
}

fn to_absolute(cwd: &str, display: &str) -> String {
    if display.is_empty() {
        cwd.to_string()
    } else if display.starts_with('/') {
        path::normalize(display)
    } else {
        path::resolve(cwd, display)
    }
}

fn join_display(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else if base == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", base, name)
    }
}

// ============================================================================
// Tests
// ============================================================================
