//! Shared fixtures for the Keel integration suite.

pub mod helpers;
