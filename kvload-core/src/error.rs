use thiserror::Error;

use crate::digest::DigestError;
use crate::store::StoreError;

/// Errors that end a workload loop.
///
/// Every variant is fatal for the loop that returns it: measurements collected after a failed
/// operation would no longer describe a healthy store.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// The store failed to connect, prepare, write or read.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The latency digest could not be set up.
    #[error("digest error: {0}")]
    Digest(#[from] DigestError),

    /// The workload options cannot describe a valid run.
    #[error("invalid workload options: {0}")]
    InvalidOptions(String),
}

/// Result type for workload loops.
pub type Result<T, E = WorkloadError> = std::result::Result<T, E>;
