#![allow(unsafe_code)]
//! SDK types: identifiers, messages, events and contacts.

use std::fmt;

use wabridge_ffi::{CContact, CEvent, CFileMessage, CMessage, CReceiptEvent, CTextMessage};

use crate::error::{Error, Result};
use crate::ffi::{borrowed_nullable, borrowed_string, borrowed_strings};

macro_rules! ffi_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident {
        $($(#[$vm:meta])* $variant:ident = $val:expr),* $(,)?
    }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        $vis enum $name { $($(#[$vm])* $variant = $val),* }

        impl $name {
            /// Convert from FFI `u8`. Returns `None` for unknown values.
            #[must_use]
            pub const fn from_ffi(v: u8) -> Option<Self> {
                match v { $($val => Some(Self::$variant),)* _ => None }
            }
        }
    };
}

ffi_enum! {
    /// Media payload kind.
    pub enum FileKind {
        /// Photo.
        Image = 0,
        /// Video clip.
        Video = 1,
        /// Voice note or audio file.
        Audio = 2,
        /// Any other file.
        Document = 3,
        /// Sticker.
        Sticker = 4,
    }
}

ffi_enum! {
    /// Who read the messages of a receipt.
    pub enum ReceiptKind {
        /// The peer read them.
        Read = 0,
        /// Another of the local user's devices read them.
        ReadSelf = 1,
    }
}

ffi_enum! {
    /// Severity of a forwarded log line.
    pub enum LogLevel {
        /// Error.
        Error = 0,
        /// Warning.
        Warn = 1,
        /// Informational.
        Info = 2,
        /// Debug and trace.
        Debug = 3,
    }
}

/// Canonical `user@server` identifier of a person, group or broadcast list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jid(String);

impl Jid {
    /// Wrap an identifier string. No validation; the adapter checks on send.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The `user` part (before `@`), or empty for server-only identifiers.
    #[must_use]
    pub fn user(&self) -> &str {
        self.0.split_once('@').map_or("", |(user, _)| user)
    }

    /// The server part.
    #[must_use]
    pub fn server(&self) -> &str {
        self.0.split_once('@').map_or(&self.0, |(_, server)| server)
    }

    /// Whether this is a group chat.
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.server() == "g.us"
    }

    /// Identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Jid {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for Jid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Message metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    /// Protocol message id.
    pub id: String,
    /// Chat the message belongs to.
    pub chat: Jid,
    /// Author.
    pub sender: Jid,
    /// Unix seconds.
    pub timestamp: i64,
    /// Sent by the local user (from any device).
    pub is_from_me: bool,
    /// Id of the message this one replies to.
    pub quote_id: Option<String>,
}

/// A media payload reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    /// Media kind.
    pub kind: FileKind,
    /// Where [`Client::download_file`](crate::Client::download_file) puts the
    /// payload, relative to the base path.
    pub path: String,
    /// Opaque descriptor; store it to download the payload later.
    pub file_id: String,
    /// Caption, if any.
    pub caption: Option<String>,
}

/// Message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Media payload.
    File(FileContent),
}

/// A delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Metadata.
    pub info: MessageInfo,
    /// Body.
    pub content: MessageContent,
}

impl Message {
    /// Copy a borrowed C message.
    pub(crate) unsafe fn from_c(m: &CMessage) -> Result<Self> {
        let info = unsafe {
            MessageInfo {
                id: borrowed_string(m.info.id)?,
                chat: Jid(borrowed_string(m.info.chat)?),
                sender: Jid(borrowed_string(m.info.sender)?),
                timestamp: m.info.timestamp,
                is_from_me: m.info.is_from_me,
                quote_id: borrowed_nullable(m.info.quote_id)?,
            }
        };
        if m.message.is_null() {
            return Err(Error::NullPointer);
        }
        let content = match m.message_type {
            0 => {
                let text = unsafe { &*m.message.cast::<CTextMessage>() };
                MessageContent::Text(unsafe { borrowed_string(text.text)? })
            }
            1 => {
                let file = unsafe { &*m.message.cast::<CFileMessage>() };
                MessageContent::File(FileContent {
                    kind: FileKind::from_ffi(file.kind).ok_or(Error::UnknownValue {
                        what: "file kind",
                        value: file.kind,
                    })?,
                    path: unsafe { borrowed_string(file.path)? },
                    file_id: unsafe { borrowed_string(file.file_id)? },
                    caption: unsafe { borrowed_nullable(file.caption)? },
                })
            }
            value => {
                return Err(Error::UnknownValue {
                    what: "message type",
                    value,
                });
            }
        };
        Ok(Self { info, content })
    }
}

/// A non-message notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// History sync progress, percent.
    SyncProgress(u8),
    /// Initial app-state sync finished; contact names are now available.
    AppStateSyncComplete,
    /// Messages in `chat` were read.
    Receipt {
        /// Who read them.
        kind: ReceiptKind,
        /// Chat the messages belong to.
        chat: Jid,
        /// Ids of the read messages.
        message_ids: Vec<String>,
    },
}

impl Event {
    /// Copy a borrowed C event.
    pub(crate) unsafe fn from_c(e: &CEvent) -> Result<Self> {
        match e.kind {
            0 => {
                if e.data.is_null() {
                    return Err(Error::NullPointer);
                }
                Ok(Self::SyncProgress(unsafe { *e.data.cast::<u8>() }))
            }
            1 => Ok(Self::AppStateSyncComplete),
            2 => {
                if e.data.is_null() {
                    return Err(Error::NullPointer);
                }
                let r = unsafe { &*e.data.cast::<CReceiptEvent>() };
                Ok(Self::Receipt {
                    kind: ReceiptKind::from_ffi(r.kind).ok_or(Error::UnknownValue {
                        what: "receipt kind",
                        value: r.kind,
                    })?,
                    chat: Jid(unsafe { borrowed_string(r.id)? }),
                    message_ids: unsafe { borrowed_strings(r.message_ids, r.size)? },
                })
            }
            value => Err(Error::UnknownValue {
                what: "event kind",
                value,
            }),
        }
    }
}

/// A stored contact or a joined group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contact {
    /// Whether the store had an entry.
    pub found: bool,
    /// Address-book first name.
    pub first_name: String,
    /// Address-book full name, or the group name.
    pub full_name: String,
    /// Name the contact chose for themselves.
    pub push_name: String,
    /// Verified business name.
    pub business_name: String,
}

impl Contact {
    /// Name to show: full name, first name, `~ push name`, `+ business name`.
    #[must_use]
    pub fn display_name(&self) -> String {
        if !self.full_name.is_empty() {
            self.full_name.clone()
        } else if !self.first_name.is_empty() {
            self.first_name.clone()
        } else if !self.push_name.is_empty() {
            format!("~ {}", self.push_name)
        } else if !self.business_name.is_empty() {
            format!("+ {}", self.business_name)
        } else {
            String::new()
        }
    }

    pub(crate) unsafe fn from_c(c: &CContact) -> Result<Self> {
        unsafe {
            Ok(Self {
                found: c.found,
                first_name: borrowed_string(c.first_name)?,
                full_name: borrowed_string(c.full_name)?,
                push_name: borrowed_string(c.push_name)?,
                business_name: borrowed_string(c.business_name)?,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jid_parts() {
        let j = Jid::from("120363@g.us");
        assert_eq!(j.user(), "120363");
        assert!(j.is_group());
        assert_eq!(Jid::from("s.whatsapp.net").server(), "s.whatsapp.net");
        let j = Jid::from("15551234567@s.whatsapp.net");
        assert_eq!(j.to_string(), "15551234567@s.whatsapp.net");
    }

    #[test]
    fn display_name_order() {
        let c = Contact {
            push_name: "al".into(),
            business_name: "ACME".into(),
            ..Default::default()
        };
        assert_eq!(c.display_name(), "~ al");
        let c = Contact {
            business_name: "ACME".into(),
            ..Default::default()
        };
        assert_eq!(c.display_name(), "+ ACME");
    }

    #[test]
    fn enums_from_ffi() {
        assert_eq!(FileKind::from_ffi(4), Some(FileKind::Sticker));
        assert_eq!(FileKind::from_ffi(5), None);
        assert_eq!(LogLevel::from_ffi(3), Some(LogLevel::Debug));
        assert_eq!(ReceiptKind::from_ffi(1), Some(ReceiptKind::ReadSelf));
    }
}
