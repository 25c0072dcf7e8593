//! Load generation against key-value stores.
//!
//! The crate provides the building blocks of a write/read harness: deterministic key generation,
//! closed-loop pacing, streaming latency quantiles, and the [`Writer`] and [`Reader`] loops that
//! tie them together. Stores are reached through the [`Connector`] and [`Store`] traits, so the
//! same workload runs against any backend.
//!
//! [`Connector`]: store::Connector
//! [`Store`]: store::Store
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod clock;
pub mod digest;
mod error;
pub mod keyset;
pub mod pacer;
pub mod report;
pub mod store;
pub mod window;
pub mod workload;

pub use error::{Result, WorkloadError};
pub use workload::{Reader, ReaderOptions, ReaderReport, Writer, WriterOptions, WriterReport};
