//! Shared fixtures for the integration test crates.
#![allow(dead_code)]

pub mod fixtures;
