//! Adapter error type and the fatal-error convention.

use crate::backend::BackendError;
use crate::descriptor::DescriptorError;
use crate::jid::JidError;

/// Result alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong inside the adapter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A malformed identifier.
    #[error("invalid identifier: {0}")]
    Jid(#[from] JidError),

    /// A file id that cannot be decoded.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The protocol client reported a failure.
    #[error("protocol client: {0}")]
    Backend(#[from] BackendError),

    /// Filesystem failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The host passed a null pointer.
    #[error("null pointer for {0}")]
    NullPointer(&'static str),

    /// The host passed a string that is not UTF-8.
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// `wa_send_message` got a message type it does not know.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// No connector is available to open the store.
    #[error("no connector installed and the native backend is disabled")]
    NoConnector,

    /// A call needed the client before `wa_new_client`.
    #[error("client not created; call wa_new_client first")]
    NoClient,

    /// Any other rejected argument.
    #[error("{0}")]
    InvalidArgument(String),
}

/// Abort the process on an adapter invariant violation. No recovery
/// contract is offered to the host for these.
pub(crate) fn fatal(context: &str, err: &dyn std::fmt::Display) -> ! {
    tracing::error!("{context}: {err}");
    std::process::abort()
}

/// Unwrap or abort via [`fatal`].
pub(crate) trait OrFatal<T> {
    fn or_fatal(self, context: &str) -> T;
}

impl<T, E: std::fmt::Display> OrFatal<T> for std::result::Result<T, E> {
    fn or_fatal(self, context: &str) -> T {
        match self {
            Ok(v) => v,
            Err(e) => fatal(context, &e),
        }
    }
}
