//! Scenario tests for the data client
//!
//! Unit tests live next to the code they cover; these exercise whole call
//! paths against a WireMock destination or a mocked transport.

pub mod client_tests;
pub mod config_tests;
