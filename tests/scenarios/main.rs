//! Scenario-based tests for pkgpipe

mod helpers;

mod build_compile;
mod condition_pruning;
mod test_compile;
