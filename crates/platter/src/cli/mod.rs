//! Subcommand implementations.

pub mod bundle;
pub mod config;
pub mod search;
