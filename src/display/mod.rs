//! Terminal tables for run summaries, hits, and status.

pub mod tables;

pub use tables::{TableBuilder, create_hits_table, create_run_table, create_status_table};
