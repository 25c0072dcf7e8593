//! Test utilities for kvload.
//!
//! This crate provides utilities to facilitate testing of the load harness against a real
//! network store. See the modules for all available utilities.

pub mod server;
pub mod tracing;
