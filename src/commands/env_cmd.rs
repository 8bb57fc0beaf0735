use async_trait::async_trait;

use crate::exec::context::{Command, CommandContext, CommandError, OutputStream};

pub struct EnvCommand;

#[async_trait]
impl Command for EnvCommand {
    fn name(&self) -> &'static str {
        "env"
    }

    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError> {
        let mut names: Vec<&String> = ctx.env.keys().collect();
        names.sort();
        for name in names {
            ctx.stdout.write(&format!("{}={}\n", name, ctx.env[name]));
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentStore;
    use crate::vfs::Vfs;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_env_lists_sorted() {
        use crate::exec::context::{BufferedWriter, CommandContext};
        use tokio_util::sync::CancellationToken;

        let vfs = Arc::new(Vfs::new(Arc::new(ContentStore::new())));
        let stdout = BufferedWriter::new();
        let mut env = std::collections::HashMap::new();
        env.insert("B".to_string(), "2".to_string());
        env.insert("A".to_string(), "1".to_string());
        let ctx = CommandContext {
            args: vec![],
            env,
            cwd: "/".to_string(),
            vfs,
            stdout: Arc::new(stdout.clone()),
            stderr: Arc::new(BufferedWriter::new()),
            stdin: None,
            signal: CancellationToken::new(),
            set_raw_mode: None,
            registry: None,
        };
        EnvCommand.run(ctx).await.unwrap();
        assert_eq!(stdout.contents(), "A=1\nB=2\n");
    }
}
