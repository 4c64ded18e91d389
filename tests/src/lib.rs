//! Shared setup and fixtures for the integration suite.

pub mod fixtures;
pub mod setup;
