use async_trait::async_trait;

use crate::exec::context::{Command, CommandContext, CommandError, OutputStream};

pub struct EchoCommand;

#[async_trait]
impl Command for EchoCommand {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError> {
        let mut no_newline = false;
        let mut interpret_escapes = false;
        let mut start = 0;

        while start < ctx.args.len() {
            match ctx.args[start].as_str() {
                "-n" => no_newline = true,
                "-e" => interpret_escapes = true,
                "-E" => interpret_escapes = false,
                "-ne" | "-en" => {
                    no_newline = true;
                    interpret_escapes = true;
                }
                _ => break,
            }
            start += 1;
        }

        let mut output = ctx.args[start..].join(" ");
        if interpret_escapes {
            output = process_escapes(&output);
        }
        if !no_newline {
            output.push('\n');
        }
        ctx.stdout.write(&output);
        Ok(0)
    }
}

fn process_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('0') => out.push('\0'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
