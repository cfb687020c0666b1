pub mod commands;
pub mod global;

pub use global::{Command, CommandLineArgs, GlobalArgs, Mode};
