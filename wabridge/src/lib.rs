#![doc = include_str!("../README.md")]
#![allow(unsafe_code)]

pub mod client;
pub mod error;
pub mod types;

mod ffi;

// Re-export core public API at crate root.
pub use client::{Client, Quote, init_logger};
pub use error::{Error, Result};
pub use types::{
    Contact, Event, FileContent, FileKind, Jid, LogLevel, Message, MessageContent, MessageInfo,
    ReceiptKind,
};
