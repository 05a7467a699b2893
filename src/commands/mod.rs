// src/commands/mod.rs
//! Command handlers for the rpmcopy CLI

mod copy;
mod parse;
mod vercmp;

pub use copy::cmd_copy;
pub use parse::cmd_parse;
pub use vercmp::cmd_vercmp;
