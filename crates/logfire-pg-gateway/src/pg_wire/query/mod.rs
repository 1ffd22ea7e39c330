//! Query inspection before forwarding

pub mod pg_commands;

pub use pg_commands::detect_psql_command;
