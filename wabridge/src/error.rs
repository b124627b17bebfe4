//! Unified error type for the wabridge SDK.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the wabridge SDK.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A returned pointer was unexpectedly null.
    #[error("unexpected null pointer from FFI")]
    NullPointer,

    /// A string received from FFI contained invalid UTF-8.
    #[error("invalid UTF-8 in FFI string")]
    InvalidUtf8,

    /// An argument passed to the SDK was invalid.
    #[error("{0}")]
    InvalidArgument(String),

    /// An enum discriminant outside the known range.
    #[error("unknown {what} value {value}")]
    UnknownValue {
        /// The C field the value came from.
        what: &'static str,
        /// Raw value.
        value: u8,
    },

    /// The media payload could not be fetched or written.
    #[error("media download failed")]
    DownloadFailed,

    /// The library did not return a pairing code.
    #[error("phone pairing failed")]
    PairingFailed,
}
