//! Common test utilities for channel-dl integration tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod client;
#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
pub use client::*;
#[allow(unused_imports)]
pub use fixtures::*;
