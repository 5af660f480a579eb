//! CLI command handlers
//!
//! Each subcommand is implemented in its own module.

pub mod generate;
pub mod helpers;
pub mod inspect;
pub mod pool;
pub mod quiz;
