use async_trait::async_trait;

use crate::exec::context::{Command, CommandContext, CommandError, InputStream, OutputStream};

pub struct HeadCommand;

#[async_trait]
impl Command for HeadCommand {
    fn name(&self) -> &'static str {
        "head"
    }

    async fn run(&self, mut ctx: CommandContext) -> Result<i32, CommandError> {
        let mut count: usize = 10;
        let mut files = Vec::new();
        let mut i = 0;
        while i < ctx.args.len() {
            match ctx.args[i].as_str() {
                "-n" => {
                    i += 1;
                    count = ctx
                        .args
                        .get(i)
                        .and_then(|a| a.parse().ok())
                        .ok_or_else(|| CommandError("head: invalid line count".to_string()))?;
                }
                arg if arg.starts_with("-n") => {
                    count = arg[2..]
                        .parse()
                        .map_err(|_| CommandError("head: invalid line count".to_string()))?;
                }
                arg => files.push(arg.to_string()),
            }
            i += 1;
        }

        if files.is_empty() {
            // Stream from stdin, stopping as soon as enough lines arrived
            // so an infinite producer upstream is not drained forever.
            let mut seen = 0;
            let mut pending = String::new();
            'outer: while let Some(stdin) = ctx.stdin.as_mut() {
                if ctx.signal.is_cancelled() {
                    return Ok(130);
                }
                let Some(chunk) = stdin.read().await else {
                    break;
                };
                pending.push_str(&chunk);
                while let Some(pos) = pending.find('\n') {
                    let line: String = pending.drain(..=pos).collect();
                    ctx.stdout.write(&line);
                    seen += 1;
                    if seen >= count {
                        break 'outer;
                    }
                }
            }
            if ctx.signal.is_cancelled() {
                return Ok(130);
            }
            if seen < count && !pending.is_empty() {
                ctx.stdout.write(&pending);
            }
            return Ok(0);
        }

        let mut code = 0;
        for file in &files {
            let abs = ctx.resolve_path(file);
            match ctx.vfs.read_file_string(&abs).await {
                Ok(content) => {
                    for line in content.lines().take(count) {
                        ctx.stdout.write(&format!("{}\n", line));
                    }
                }
                Err(e) => {
                    ctx.stderr.write(&format!("head: {}\n", e));
                    code = 1;
                }
            }
        }
        Ok(code)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{run_command, run_command_with_vfs};
    use crate::content::ContentStore;
    use crate::vfs::Vfs;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_head_stdin_default() {
        let input: String = (1..=20).map(|i| format!("line {}\n", i)).collect();
        let (code, stdout, _) = run_command(&HeadCommand, &[], Some(&input)).await;
        assert_eq!(code, 0);
        assert_eq!(stdout.lines().count(), 10);
        assert!(stdout.starts_with("line 1\n"));
    }

    #[tokio::test]
    async fn test_head_n_flag() {
        let input = "a\nb\nc\nd\n";
        let (_, stdout, _) = run_command(&HeadCommand, &["-n", "2"], Some(input)).await;
        assert_eq!(stdout, "a\nb\n");
    }

    #[tokio::test]
    async fn test_head_file() {
        let vfs = Arc::new(Vfs::new(Arc::new(ContentStore::new())));
        vfs.write_file("/f", b"1\n2\n3\n").await.unwrap();
        let (_, stdout, _) =
            run_command_with_vfs(&HeadCommand, &["-n1", "/f"], None, vfs).await;
        assert_eq!(stdout, "1\n");
    }
}
