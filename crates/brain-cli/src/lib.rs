mod args;
mod commands;

pub use args::{Cli, Commands, DaemonCommand, IndexCommand, OutputFormat, QueueCommand};
pub use commands::run;
