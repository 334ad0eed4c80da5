//! Shared test utilities for reposcan integration tests.
//!
//! This module provides:
//! - `FakeProvider`, an in-memory provider serving ZIP archives
//! - `TestHarness` for isolated runs with a temp database and scratch dir

pub mod archive;
pub mod harness;

pub use archive::{zip_tree, FakeProvider};
pub use harness::TestHarness;
