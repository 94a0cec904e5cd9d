//! Common test utilities for meshcopy E2E tests

#[allow(dead_code)]
pub mod cluster;
#[allow(dead_code)]
pub mod fixtures;

pub use cluster::*;
#[allow(unused_imports)]
pub use fixtures::*;
