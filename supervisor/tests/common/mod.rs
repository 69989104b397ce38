//! Shared test doubles and fixtures for integration tests

pub mod fakes;
pub mod fixtures;
pub mod helpers;
