//! CLI exit status handling.

pub mod exit_code;

pub use exit_code::ExitCode;
