// Gateway file to expose integration tests from the integration/ subdirectory
// This file allows Rust's test runner to discover tests in subdirectories

mod common;

#[path = "integration/test_pipeline_runs.rs"]
mod test_pipeline_runs;

#[path = "integration/test_run_exclusivity.rs"]
mod test_run_exclusivity;

#[path = "integration/test_query_paths.rs"]
mod test_query_paths;

#[path = "integration/test_persistent_backends.rs"]
mod test_persistent_backends;
