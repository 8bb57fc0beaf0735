use async_trait::async_trait;

use crate::exec::context::{Command, CommandContext, CommandError, OutputStream};

pub struct ClearCommand;

#[async_trait]
impl Command for ClearCommand {
    fn name(&self) -> &'static str {
        "clear"
    }

    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError> {
        // Standard clear-screen + cursor-home sequence; the terminal
        // widget interprets it.
        ctx.stdout.write("\x1b[2J\x1b[H");
        Ok(0)
    }
}
