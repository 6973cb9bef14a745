//! Error taxonomy for the processing pipeline.
//!
//! Three things can go wrong, and they are handled differently:
//!
//! - **Invalid input** ([`Error::InvalidPoint`]): a non-finite coordinate,
//!   accuracy, or a filter state that went non-finite. The pipeline logs a
//!   warning, skips the offending point, and keeps going.
//! - **Storage failure** ([`Error::Storage`]): a batch fetch or write failed.
//!   This aborts the current run for the track/race; because every write is
//!   an idempotent upsert or a full replace, the run is safe to retry from
//!   scratch.
//! - **Insufficient data** is *not* an error. Stages that find nothing to do
//!   (too few points, no stable tack pair, no qualifying clusters) return an
//!   empty result or `None`.

use thiserror::Error;

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A point carried non-finite or otherwise unusable numbers. The caller
    /// skips the point; it is never silently stored.
    #[error("invalid point {id}: {reason}")]
    InvalidPoint { id: u64, reason: &'static str },

    /// The storage collaborator failed. Aborts the run; retry-safe.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary storage-layer error.
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Storage(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_point_message() {
        let err = Error::InvalidPoint { id: 42, reason: "non-finite latitude" };
        assert_eq!(err.to_string(), "invalid point 42: non-finite latitude");
    }

    #[test]
    fn test_storage_wraps_source() {
        let err = Error::storage(std::io::Error::new(std::io::ErrorKind::Other, "connection reset"));
        assert!(err.to_string().contains("connection reset"));
    }
}
