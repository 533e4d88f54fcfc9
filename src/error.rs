//! Unified error type for fieldrec.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for on-target logging when enabled.

/// Top-level error type used by the collaborator seams.
///
/// Nothing here crosses the dispatcher/encoder boundary: protocol problems
/// become `Action`s, and the coordinator logs these and degrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Storage
    /// The storage collaborator could not provide or finalize a recording.
    Storage(StorageError),

    // Audio
    /// The audio path refused to start capture or monitoring.
    AudioUnavailable,

    // Transport
    /// Serial read/write to the Bluetooth module failed.
    Serial,
}

/// Storage failures we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No medium mounted or the medium is full.
    Unavailable,
    /// Path could not be built (clock unset, name overflow).
    PathRejected,
    /// Header rewrite after a recording failed.
    HeaderWrite,
}

// Convenience conversions

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::Storage(e)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Storage(StorageError::Unavailable) => write!(f, "storage unavailable"),
            Error::Storage(StorageError::PathRejected) => write!(f, "recording path rejected"),
            Error::Storage(StorageError::HeaderWrite) => write!(f, "header write failed"),
            Error::AudioUnavailable => write!(f, "audio path unavailable"),
            Error::Serial => write!(f, "serial transport error"),
        }
    }
}
