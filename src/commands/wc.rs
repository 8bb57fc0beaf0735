use async_trait::async_trait;

use crate::exec::context::{Command, CommandContext, CommandError, OutputStream};

pub struct WcCommand;

#[async_trait]
impl Command for WcCommand {
    fn name(&self) -> &'static str {
        "wc"
    }

    async fn run(&self, mut ctx: CommandContext) -> Result<i32, CommandError> {
        let mut show_lines = false;
        let mut show_words = false;
        let mut show_chars = false;
        let mut files = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-l" => show_lines = true,
                "-w" => show_words = true,
                "-c" | "-m" => show_chars = true,
                other => files.push(other.to_string()),
            }
        }
        if !(show_lines || show_words || show_chars) {
            show_lines = true;
            show_words = true;
            show_chars = true;
        }

        let emit = |content: &str, label: Option<&str>, ctx: &CommandContext| {
            let mut fields = Vec::new();
            if show_lines {
                fields.push(format!("{:>7}", content.matches('\n').count()));
            }
            if show_words {
                fields.push(format!("{:>7}", content.split_whitespace().count()));
            }
            if show_chars {
                fields.push(format!("{:>7}", content.len()));
            }
            match label {
                Some(label) => ctx.stdout.write(&format!("{} {}\n", fields.join(""), label)),
                None => ctx.stdout.write(&format!("{}\n", fields.join(""))),
            }
        };

        if files.is_empty() {
            let content = ctx.read_stdin().await;
            emit(&content, None, &ctx);
            return Ok(0);
        }

        let mut code = 0;
        for file in &files {
            let abs = ctx.resolve_path(file);
            match ctx.vfs.read_file_string(&abs).await {
                Ok(content) => emit(&content, Some(file), &ctx),
                Err(e) => {
                    ctx.stderr.write(&format!("wc: {}\n", e));
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
    use crate::commands::test_support::run_command;

    #[tokio::test]
    async fn test_wc_default() {
        let (code, stdout, _) = run_command(&WcCommand, &[], Some("one two\nthree\n")).await;
        assert_eq!(code, 0);
        let fields: Vec<&str> = stdout.split_whitespace().collect();
        assert_eq!(fields, vec!["2", "3", "14"]);
    }

    #[tokio::test]
    async fn test_wc_lines_only() {
        let (_, stdout, _) = run_command(&WcCommand, &["-l"], Some("a\nb\nc\n")).await;
        assert_eq!(stdout.trim(), "3");
    }
}
