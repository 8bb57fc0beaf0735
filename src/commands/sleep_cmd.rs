use std::time::Duration;

use async_trait::async_trait;

use crate::exec::context::{Command, CommandContext, CommandError};

pub struct SleepCommand;

#[async_trait]
impl Command for SleepCommand {
    fn name(&self) -> &'static str {
        "sleep"
    }

    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError> {
        let Some(arg) = ctx.args.first() else {
            return Err(CommandError("sleep: missing operand".to_string()));
        };
        let seconds: f64 = arg
            .trim_end_matches('s')
            .parse()
            .map_err(|_| CommandError(format!("sleep: invalid time interval '{}'", arg)))?;

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(seconds)) => Ok(0),
            _ = ctx.signal.cancelled() => Ok(130),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
