//! Base Command Set
//!
//! The small set of registry commands the kernel ships so the runtime is
//! usable out of the box. Each one is a `Command` implementation that
//! consumes only its `CommandContext`; heavyweight utilities are the
//! host's business.

pub mod cat;
pub mod clear_cmd;
pub mod echo;
pub mod env_cmd;
pub mod fs_cmds;
pub mod head;
pub mod ls;
pub mod sleep_cmd;
pub mod wc;
pub mod yes;

use std::sync::Arc;

use crate::exec::registry::CommandRegistry;


/// Register every base command.
pub fn install_base_commands(registry: &CommandRegistry) {
    registry.register(Arc::new(echo::EchoCommand));
    registry.register(Arc::new(cat::CatCommand));
    registry.register(Arc::new(ls::LsCommand));
    registry.register(Arc::new(head::HeadCommand));
    registry.register(Arc::new(yes::YesCommand));
    registry.register(Arc::new(wc::WcCommand));
    registry.register(Arc::new(sleep_cmd::SleepCommand));
    registry.register(Arc::new(clear_cmd::ClearCommand));
    registry.register(Arc::new(env_cmd::EnvCommand));
    registry.register(Arc::new(fs_cmds::MkdirCommand));
    registry.register(Arc::new(fs_cmds::RmCommand));
    registry.register(Arc::new(fs_cmds::TouchCommand));
    registry.register(Arc::new(fs_cmds::CpCommand));
    registry.register(Arc::new(fs_cmds::MvCommand));
}
