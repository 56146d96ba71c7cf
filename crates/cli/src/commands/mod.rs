//! Subcommand implementations.

pub mod agent;
pub mod config_cmd;
pub mod doctor;
pub mod tools;
