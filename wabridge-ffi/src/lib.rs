//! `wabridge-ffi`: C ABI adapter over a WhatsApp multi-device protocol client.
//!
//! Design principles:
//! - One process-wide client, created by [`client::wa_new_client`] from the
//!   installed [`backend::Connector`], or the built-in `native` one.
//! - Host callbacks (log, message, event) are plain C function pointers with
//!   an opaque `user_data`; they run on library threads.
//! - Everything handed to the host is heap-allocated and owned by the host,
//!   which releases it with the matching `wa_free_*` function.
//! - Async library calls block internally on a shared tokio runtime.
//! - Adapter invariant violations abort the process; media downloads report
//!   a status code; unsupported events and messages are logged and dropped.

mod ffi;
mod host;

pub mod backend;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod download;
pub mod error;
pub mod jid;
pub mod log;
#[cfg(feature = "native")]
pub mod native;
pub mod normalize;
pub mod project;
pub mod proto;
pub mod pump;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use ffi::{
    CContact, CEvent, CFileMessage, CMessage, CMessageInfo, CReceiptEvent, CTextMessage,
    ContactList, EventCallback, EventKind, LogHandler, MessageHandlerCallback, MessageType,
    QrCallback, wa_free_event, wa_free_message, wa_free_string,
};
