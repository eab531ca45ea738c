//! Error types for the audit cursor

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while sampling stripes for audit
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Sampling Errors
    // =========================================================================
    /// The index returned no entries for every listing attempt
    #[error("unable to find pointers after {attempts} attempts")]
    ExhaustedListing { attempts: usize },

    /// A non-empty page yielded no auditable pointer
    #[error("could not find valid pointer after {attempts} attempts")]
    ExhaustedSampling { attempts: usize },

    /// The call was cancelled before it completed
    #[error("stripe selection cancelled")]
    Cancelled,

    // =========================================================================
    // Segment Index Errors
    // =========================================================================
    /// Pointer not present in the index
    #[error("pointer not found: {0}")]
    NotFound(String),

    /// Underlying index failure
    #[error("segment index error: {0}")]
    Store(String),

    // =========================================================================
    // Pointer Decoding Errors
    // =========================================================================
    /// Malformed expiration or creation timestamp
    #[error("invalid timestamp: {0}")]
    TimestampDecode(String),

    /// Redundancy scheme cannot describe an erasure layout
    #[error("invalid redundancy scheme: {0}")]
    InvalidRedundancy(String),

    // =========================================================================
    // Entropy Errors
    // =========================================================================
    /// Entropy source failure
    #[error("random source failure: {0}")]
    RandomSource(String),

    // =========================================================================
    // Process Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fixture could not be parsed
    #[error("Failed to load fixture: {0}")]
    Fixture(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller should simply try the selection again later.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::ExhaustedListing { .. } | Error::ExhaustedSampling { .. }
        )
    }
}

impl From<getrandom::Error> for Error {
    fn from(e: getrandom::Error) -> Self {
        Error::RandomSource(e.to_string())
    }
}
