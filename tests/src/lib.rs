//! Host-side tests for the radiosoc core
//!
//! Everything runs on the simulated counter from `radiosoc_core::test_utils`.
//! `cargo test -p radiosoc-tests` runs the suites below;
//! `cargo run -p radiosoc-tests` walks through the scenarios with output.

pub mod support;

#[cfg(test)]
mod arbitration_tests;
#[cfg(test)]
mod wraparound_tests;
#[cfg(test)]
mod sleep_scenario_tests;
