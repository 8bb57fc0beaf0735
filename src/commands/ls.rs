use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::exec::context::{Command, CommandContext, CommandError, OutputStream};
use crate::vfs::FileKind;

pub struct LsCommand;

#[async_trait]
impl Command for LsCommand {
    fn name(&self) -> &'static str {
        "ls"
    }

    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError> {
        let mut long = false;
        let mut all = false;
        let mut paths = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-l" => long = true,
                "-a" => all = true,
                "-la" | "-al" => {
                    long = true;
                    all = true;
                }
                _ => paths.push(arg.clone()),
            }
        }
        if paths.is_empty() {
            paths.push(".".to_string());
        }

        let mut code = 0;
        let several = paths.len() > 1;
        for (i, path) in paths.iter().enumerate() {
            let abs = ctx.resolve_path(path);
            let stat = match ctx.vfs.stat(&abs).await {
                Ok(stat) => stat,
                Err(e) => {
                    ctx.stderr.write(&format!("ls: {}\n", e));
                    code = 1;
                    continue;
                }
            };

            if stat.kind == FileKind::File {
                ctx.stdout.write(&format!("{}\n", path));
                continue;
            }

            if several {
                if i > 0 {
                    ctx.stdout.write("\n");
                }
                ctx.stdout.write(&format!("{}:\n", path));
            }
            match ctx.vfs.readdir_stat(&abs).await {
                Ok(entries) => {
                    for (entry, entry_stat) in entries {
                        if !all && entry.name.starts_with('.') {
                            continue;
                        }
                        if long {
                            ctx.stdout.write(&format!(
                                "{} {:>8} {} {}\n",
                                mode_string(entry_stat.kind, entry_stat.mode),
                                entry_stat.size,
                                format_mtime(entry_stat.mtime),
                                entry.name
                            ));
                        } else {
                            ctx.stdout.write(&format!("{}\n", entry.name));
                        }
                    }
                }
                Err(e) => {
                    ctx.stderr.write(&format!("ls: {}\n", e));
                    code = 1;
                }
            }
        }
        Ok(code)
    }
}

fn mode_string(kind: FileKind, mode: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push(if kind == FileKind::Directory { 'd' } else { '-' });
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

fn format_mtime(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%b %e %H:%M").to_string(),
        None => "?".to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::run_command_with_vfs;
    use crate::content::ContentStore;
    use crate::vfs::Vfs;
    use std::sync::Arc;

    async fn sample() -> Arc<Vfs> {
        let vfs = Arc::new(Vfs::new(Arc::new(ContentStore::new())));
        vfs.mkdir("/dir", true).await.unwrap();
        vfs.write_file("/dir/b.txt", b"bb").await.unwrap();
        vfs.write_file("/dir/a.txt", b"a").await.unwrap();
        vfs.write_file("/dir/.hidden", b"").await.unwrap();
        vfs
    }

    #[tokio::test]
    async fn test_ls_sorted_names() {
        let vfs = sample().await;
        let (code, stdout, _) = run_command_with_vfs(&LsCommand, &["/dir"], None, vfs).await;
        assert_eq!(code, 0);
        assert_eq!(stdout, "a.txt\nb.txt\n");
    }

    #[tokio::test]
    async fn test_ls_all_shows_hidden() {
        let vfs = sample().await;
        let (_, stdout, _) = run_command_with_vfs(&LsCommand, &["-a", "/dir"], None, vfs).await;
        assert!(stdout.contains(".hidden"));
    }

    #[tokio::test]
    async fn test_ls_long_format() {
        let vfs = sample().await;
        let (_, stdout, _) = run_command_with_vfs(&LsCommand, &["-l", "/dir"], None, vfs).await;
        assert!(stdout.contains("-rw-r--r--"));
        assert!(stdout.contains("a.txt"));
    }

    #[tokio::test]
    async fn test_ls_missing() {
        let vfs = sample().await;
        let (code, _, stderr) = run_command_with_vfs(&LsCommand, &["/nope"], None, vfs).await;
        assert_eq!(code, 1);
        assert!(stderr.contains("ENOENT"));
    }

    #[test]
    fn test_mode_string() {
        assert_eq!(mode_string(FileKind::File, 0o644), "-rw-r--r--");
        assert_eq!(mode_string(FileKind::Directory, 0o755), "drwxr-xr-x");
    }
}
