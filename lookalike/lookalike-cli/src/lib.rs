//! Command implementations and terminal output for the `lookalike` binary.

pub mod commands;
pub mod output;

pub use output::OutputFormat;
