//! Integration test modules.

mod harness;
mod simulated_stream_test;
mod teardown_test;
