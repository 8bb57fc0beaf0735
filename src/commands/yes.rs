use async_trait::async_trait;

use crate::exec::context::{Command, CommandContext, CommandError, OutputStream};

pub struct YesCommand;

#[async_trait]
impl Command for YesCommand {
    fn name(&self) -> &'static str {
        "yes"
    }

    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError> {
        let line = if ctx.args.is_empty() {
            "y\n".to_string()
        } else {
            format!("{}\n", ctx.args.join(" "))
        };

        loop {
            if ctx.signal.is_cancelled() {
                return Ok(130);
            }
            ctx.stdout.write(&line);
            // Yield so downstream stages run and cancellation lands.
            tokio::task::yield_now().await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
