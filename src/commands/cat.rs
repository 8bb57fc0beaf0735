use async_trait::async_trait;

use crate::exec::context::{Command, CommandContext, CommandError, OutputStream};

pub struct CatCommand;

#[async_trait]
impl Command for CatCommand {
    fn name(&self) -> &'static str {
        "cat"
    }

    async fn run(&self, mut ctx: CommandContext) -> Result<i32, CommandError> {
        if ctx.args.is_empty() || ctx.args.iter().any(|a| a == "-") {
            let data = ctx.read_stdin().await;
            ctx.stdout.write(&data);
            if ctx.args.is_empty() {
                return Ok(0);
            }
        }

        let mut code = 0;
        for arg in &ctx.args {
            if arg == "-" {
                continue;
            }
            let abs = ctx.resolve_path(arg);
            match ctx.vfs.read_file_string(&abs).await {
                Ok(content) => ctx.stdout.write(&content),
                Err(e) => {
                    ctx.stderr.write(&format!("cat: {}\n", e));
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
    async fn test_cat_stdin() {
        let (code, stdout, _) = run_command(&CatCommand, &[], Some("piped data")).await;
        assert_eq!(code, 0);
        assert_eq!(stdout, "piped data");
    }

    #[tokio::test]
    async fn test_cat_files() {
        let vfs = Arc::new(Vfs::new(Arc::new(ContentStore::new())));
        vfs.write_file("/a", b"one\n").await.unwrap();
        vfs.write_file("/b", b"two\n").await.unwrap();
        let (code, stdout, _) = run_command_with_vfs(&CatCommand, &["/a", "/b"], None, vfs).await;
        assert_eq!(code, 0);
        assert_eq!(stdout, "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_cat_missing_file() {
        let (code, _, stderr) = run_command(&CatCommand, &["/nope"], None).await;
        assert_eq!(code, 1);
        assert!(stderr.contains("ENOENT"));
    }
}
