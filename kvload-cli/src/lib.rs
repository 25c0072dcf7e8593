//! Command line harness for the kvload workloads.
//!
//! This wraps [`kvload_core`] with configuration loading, logging, signal handling and a run
//! summary. The `kvload` binary is a thin shim around [`cli::execute`].

pub mod cli;
pub mod config;
pub mod harness;
pub mod observability;
pub mod summary;
