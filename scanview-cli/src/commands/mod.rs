//! CLI subcommands.

pub mod config;
pub mod presets;
pub mod simulate;
