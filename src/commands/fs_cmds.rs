//! Filesystem Commands
//!
//! Thin argv front-ends over the VFS operations: mkdir, rm, touch, cp,
//! mv.

use async_trait::async_trait;

use crate::exec::context::{Command, CommandContext, CommandError, OutputStream};
use crate::vfs::FileKind;

pub struct MkdirCommand;

#[async_trait]
impl Command for MkdirCommand {
    fn name(&self) -> &'static str {
        "mkdir"
    }

    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError> {
        let recursive = ctx.args.iter().any(|a| a == "-p");
        let dirs: Vec<&String> = ctx.args.iter().filter(|a| !a.starts_with('-')).collect();
        if dirs.is_empty() {
            return Err(CommandError("mkdir: missing operand".to_string()));
        }
        let mut code = 0;
        for dir in dirs {
            let abs = ctx.resolve_path(dir);
            if let Err(e) = ctx.vfs.mkdir(&abs, recursive).await {
                ctx.stderr.write(&format!("mkdir: {}\n", e));
                code = 1;
            }
        }
        Ok(code)
    }
}

pub struct RmCommand;

#[async_trait]
impl Command for RmCommand {
    fn name(&self) -> &'static str {
        "rm"
    }

    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError> {
        let mut recursive = false;
        let mut force = false;
        let mut targets = Vec::new();
        for arg in &ctx.args {
            match arg.as_str() {
                "-r" | "-R" => recursive = true,
                "-f" => force = true,
                "-rf" | "-fr" => {
                    recursive = true;
                    force = true;
                }
                other => targets.push(other.to_string()),
            }
        }
        if targets.is_empty() {
            return Err(CommandError("rm: missing operand".to_string()));
        }

        let mut code = 0;
        for target in &targets {
            let abs = ctx.resolve_path(target);
            let result = match ctx.vfs.stat(&abs).await {
                Ok(stat) if stat.kind == FileKind::Directory => {
                    if recursive {
                        ctx.vfs.rmdir_recursive(&abs).await
                    } else {
                        ctx.stderr
                            .write(&format!("rm: cannot remove '{}': Is a directory\n", target));
                        code = 1;
                        continue;
                    }
                }
                Ok(_) => ctx.vfs.unlink(&abs).await,
                Err(e) => {
                    if !force {
                        ctx.stderr.write(&format!("rm: {}\n", e));
                        code = 1;
                    }
                    continue;
                }
            };
            if let Err(e) = result {
                ctx.stderr.write(&format!("rm: {}\n", e));
                code = 1;
            }
        }
        Ok(code)
    }
}

pub struct TouchCommand;

#[async_trait]
impl Command for TouchCommand {
    fn name(&self) -> &'static str {
        "touch"
    }

    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError> {
        if ctx.args.is_empty() {
            return Err(CommandError("touch: missing file operand".to_string()));
        }
        let mut code = 0;
        for arg in &ctx.args {
            let abs = ctx.resolve_path(arg);
            if let Err(e) = ctx.vfs.touch(&abs).await {
                ctx.stderr.write(&format!("touch: {}\n", e));
                code = 1;
            }
        }
        Ok(code)
    }
}

pub struct CpCommand;

#[async_trait]
impl Command for CpCommand {
    fn name(&self) -> &'static str {
        "cp"
    }

    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError> {
        let paths: Vec<&String> = ctx.args.iter().filter(|a| !a.starts_with('-')).collect();
        let [src, dst] = paths.as_slice() else {
            return Err(CommandError("cp: expected source and destination".to_string()));
        };
        let src_abs = ctx.resolve_path(src);
        let mut dst_abs = ctx.resolve_path(dst);

        // Copying into a directory keeps the source file name.
        if let Ok(stat) = ctx.vfs.stat(&dst_abs).await {
            if stat.kind == FileKind::Directory {
                dst_abs = format!("{}/{}", dst_abs, crate::vfs::path::basename(&src_abs));
            }
        }

        match ctx.vfs.copy_file(&src_abs, &dst_abs).await {
            Ok(()) => Ok(0),
            Err(e) => {
                ctx.stderr.write(&format!("cp: {}\n", e));
                Ok(1)
            }
        }
    }
}

pub struct MvCommand;

#[async_trait]
impl Command for MvCommand {
    fn name(&self) -> &'static str {
        "mv"
    }

    async fn run(&self, ctx: CommandContext) -> Result<i32, CommandError> {
        let paths: Vec<&String> = ctx.args.iter().filter(|a| !a.starts_with('-')).collect();
        let [src, dst] = paths.as_slice() else {
            return Err(CommandError("mv: expected source and destination".to_string()));
        };
        let src_abs = ctx.resolve_path(src);
        let mut dst_abs = ctx.resolve_path(dst);

        if let Ok(stat) = ctx.vfs.stat(&dst_abs).await {
            if stat.kind == FileKind::Directory {
                dst_abs = format!("{}/{}", dst_abs, crate::vfs::path::basename(&src_abs));
            }
        }

        match ctx.vfs.rename(&src_abs, &dst_abs).await {
            Ok(()) => Ok(0),
            Err(e) => {
                ctx.stderr.write(&format!("mv: {}\n", e));
                Ok(1)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
