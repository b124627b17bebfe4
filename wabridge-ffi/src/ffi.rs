//! Core FFI infrastructure: C data types, runtime, memory helpers, free functions.

use std::ffi::{CStr, CString, c_char, c_void};
use std::sync::OnceLock;

use tokio::runtime::{Runtime, RuntimeFlavor};

use crate::error::{Error, Result};
use crate::project::{MessageContent, ProjectedMessage};
use crate::pump::BridgeEvent;

// ---------------------------------------------------------------------------
// Callback types
// ---------------------------------------------------------------------------

/// Log sink. `msg` is borrowed for the duration of the call.
/// `level`: 0 = error, 1 = warn, 2 = info, 3 = debug (and trace).
pub type LogHandler = unsafe extern "C" fn(msg: *const c_char, level: u8, user_data: *mut c_void);

/// Pairing code sink. `code` is borrowed for the duration of the call.
pub type QrCallback = unsafe extern "C" fn(code: *const c_char, user_data: *mut c_void);

/// Message sink. The host owns `message` and frees it with [`wa_free_message`].
pub type MessageHandlerCallback =
    unsafe extern "C" fn(message: *mut CMessage, is_sync: bool, user_data: *mut c_void);

/// Event sink. The host owns `event` and frees it with [`wa_free_event`].
pub type EventCallback = unsafe extern "C" fn(event: *mut CEvent, user_data: *mut c_void);

// ---------------------------------------------------------------------------
// Data transfer types (flat, repr(C))
// ---------------------------------------------------------------------------

/// Message metadata. Identifiers are canonical `user@server` strings.
#[repr(C)]
#[derive(Debug)]
pub struct CMessageInfo {
    /// Protocol-assigned message id.
    pub id: *mut c_char,
    /// Conversation the message belongs to.
    pub chat: *mut c_char,
    /// Author of the message.
    pub sender: *mut c_char,
    /// Unix seconds.
    pub timestamp: i64,
    /// Sent by the local user.
    pub is_from_me: bool,
    /// Null when the message quotes nothing.
    pub quote_id: *mut c_char,
    /// Reserved, always 0.
    pub read_by: u16,
}

/// Payload of a text message.
#[repr(C)]
#[derive(Debug)]
pub struct CTextMessage {
    /// Message body.
    pub text: *mut c_char,
}

/// Payload of a media message.
#[repr(C)]
#[derive(Debug)]
pub struct CFileMessage {
    /// 0 = image, 1 = video, 2 = audio, 3 = document, 4 = sticker.
    pub kind: u8,
    /// Path relative to the media base directory.
    pub path: *mut c_char,
    /// Media descriptor for `wa_download_file`.
    pub file_id: *mut c_char,
    /// Null when there is no caption.
    pub caption: *mut c_char,
}

/// Discriminant of [`CMessage::message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// [`CTextMessage`] payload.
    Text = 0,
    /// [`CFileMessage`] payload.
    File = 1,
}

impl MessageType {
    /// Decode a discriminant received from the host.
    #[must_use]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Text),
            1 => Some(Self::File),
            _ => None,
        }
    }
}

/// A message delivered to the host, live or from history.
#[repr(C)]
#[derive(Debug)]
pub struct CMessage {
    /// Metadata.
    pub info: CMessageInfo,
    /// See [`MessageType`].
    pub message_type: u8,
    /// `*mut CTextMessage` or `*mut CFileMessage`.
    pub message: *mut c_void,
}

/// Payload of a receipt event.
#[repr(C)]
#[derive(Debug)]
pub struct CReceiptEvent {
    /// 0 = read, 1 = read by own other device.
    pub kind: u8,
    /// Canonical chat id.
    pub id: *mut c_char,
    /// Ids of the receipted messages.
    pub message_ids: *mut *mut c_char,
    /// Length of `message_ids`.
    pub size: usize,
}

/// Discriminant of [`CEvent::data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    /// History sync advanced; data is the percent.
    SyncProgress = 0,
    /// App-state patches finished syncing; no data.
    AppStateSyncComplete = 1,
    /// A read receipt; data is a [`CReceiptEvent`].
    Receipt = 2,
}

/// A non-message event delivered to the host.
#[repr(C)]
#[derive(Debug)]
pub struct CEvent {
    /// See [`EventKind`].
    pub kind: u8,
    /// `*mut u8` percent, null, or `*mut CReceiptEvent`.
    pub data: *mut c_void,
}

/// Stored details of one contact. Empty strings when unknown.
#[repr(C)]
#[derive(Debug)]
pub struct CContact {
    /// The store has an entry for this contact.
    pub found: bool,
    /// Given name.
    pub first_name: *mut c_char,
    /// Full name from the address book.
    pub full_name: *mut c_char,
    /// Name the contact chose for themselves.
    pub push_name: *mut c_char,
    /// Verified business name.
    pub business_name: *mut c_char,
}

/// Parallel arrays of identifiers and contacts. Free with [`crate::client::wa_free_contacts`].
#[repr(C)]
#[derive(Debug)]
pub struct ContactList {
    /// Canonical identifiers, `size` entries.
    pub jids: *mut *mut c_char,
    /// Contact details, `size` entries.
    pub contacts: *mut CContact,
    /// Number of entries.
    pub size: u32,
}

// ---------------------------------------------------------------------------
// Shared tokio runtime
// ---------------------------------------------------------------------------

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Get or initialize the global tokio runtime.
pub(crate) fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| Runtime::new().expect("failed to create tokio runtime"))
}

/// Drive a future to completion from a host thread, or from inside a
/// runtime when a host callback re-enters the adapter.
///
/// A current-thread runtime cannot be blocked in place, so the future then
/// runs on the shared runtime from a scoped helper thread.
pub(crate) fn block_on<F>(fut: F) -> F::Output
where
    F: std::future::Future + Send,
    F::Output: Send,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(fut))
        }
        Ok(_) => std::thread::scope(|s| {
            s.spawn(|| runtime().block_on(fut))
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        }),
        Err(_) => runtime().block_on(fut),
    }
}

// ---------------------------------------------------------------------------
// String helpers
// ---------------------------------------------------------------------------

/// Copy a C string into an owned `String`.
pub(crate) unsafe fn c_str_to_string(s: *const c_char, what: &'static str) -> Result<String> {
    if s.is_null() {
        return Err(Error::NullPointer(what));
    }
    Ok(unsafe { CStr::from_ptr(s) }
        .to_str()
        .map_err(|_| Error::InvalidUtf8(what))?
        .to_owned())
}

/// Copy a nullable C string. Null and empty both map to `None`.
pub(crate) unsafe fn c_str_to_option(s: *const c_char, what: &'static str) -> Result<Option<String>> {
    if s.is_null() {
        return Ok(None);
    }
    let s = unsafe { c_str_to_string(s, what)? };
    Ok((!s.is_empty()).then_some(s))
}

/// Allocate a C string the host will own. Interior NULs are dropped.
pub(crate) fn to_c_string(s: &str) -> *mut c_char {
    let s = if s.contains('\0') {
        s.replace('\0', "")
    } else {
        s.to_owned()
    };
    CString::new(s)
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut())
}

fn option_to_c(s: Option<&str>) -> *mut c_char {
    s.map_or(std::ptr::null_mut(), to_c_string)
}

/// Free a string previously returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Move strings into a heap array of C strings. Returns the pointer and length.
pub(crate) fn string_vec_to_c(v: &[String]) -> (*mut *mut c_char, usize) {
    let boxed: Box<[*mut c_char]> = v.iter().map(|s| to_c_string(s)).collect();
    let len = boxed.len();
    (Box::into_raw(boxed).cast::<*mut c_char>(), len)
}

/// Free an array from [`string_vec_to_c`].
pub(crate) unsafe fn free_c_string_array(arr: *mut *mut c_char, len: usize) {
    if arr.is_null() {
        return;
    }
    let boxed = unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(arr, len)) };
    for s in boxed.iter() {
        unsafe { wa_free_string(*s) };
    }
}

/// Box a value and return a raw pointer.
pub(crate) fn into_raw<T>(val: T) -> *mut T {
    Box::into_raw(Box::new(val))
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

impl CMessage {
    /// Deep-copy a projected message into host-owned C memory.
    pub(crate) fn from_projected(msg: &ProjectedMessage) -> Self {
        let info = &msg.info;
        let c_info = CMessageInfo {
            id: to_c_string(&info.id),
            chat: to_c_string(&info.chat.canonical()),
            sender: to_c_string(&info.sender.canonical()),
            timestamp: info.timestamp,
            is_from_me: info.is_from_me,
            quote_id: option_to_c(info.quote_id.as_deref()),
            read_by: 0,
        };
        let (message_type, message) = match &msg.content {
            MessageContent::Text(text) => (
                MessageType::Text,
                into_raw(CTextMessage {
                    text: to_c_string(text),
                })
                .cast::<c_void>(),
            ),
            MessageContent::File(file) => (
                MessageType::File,
                into_raw(CFileMessage {
                    kind: file.kind as u8,
                    path: to_c_string(&file.path),
                    file_id: to_c_string(&file.file_id),
                    caption: option_to_c(file.caption.as_deref()),
                })
                .cast::<c_void>(),
            ),
        };
        Self {
            info: c_info,
            message_type: message_type as u8,
            message,
        }
    }
}

/// Free a message delivered to the message callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_free_message(message: *mut CMessage) {
    if message.is_null() {
        return;
    }
    let msg = unsafe { Box::from_raw(message) };
    unsafe {
        wa_free_string(msg.info.id);
        wa_free_string(msg.info.chat);
        wa_free_string(msg.info.sender);
        wa_free_string(msg.info.quote_id);
    }
    if msg.message.is_null() {
        return;
    }
    match MessageType::from_u8(msg.message_type) {
        Some(MessageType::Text) => {
            let text = unsafe { Box::from_raw(msg.message.cast::<CTextMessage>()) };
            unsafe { wa_free_string(text.text) };
        }
        Some(MessageType::File) => {
            let file = unsafe { Box::from_raw(msg.message.cast::<CFileMessage>()) };
            unsafe {
                wa_free_string(file.path);
                wa_free_string(file.file_id);
                wa_free_string(file.caption);
            }
        }
        None => tracing::warn!(
            message_type = msg.message_type,
            "leaking payload of unknown message type"
        ),
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

impl CEvent {
    pub(crate) fn from_event(event: &BridgeEvent) -> Self {
        match event {
            BridgeEvent::SyncProgress(percent) => Self {
                kind: EventKind::SyncProgress as u8,
                data: into_raw(*percent).cast::<c_void>(),
            },
            BridgeEvent::AppStateSyncComplete => Self {
                kind: EventKind::AppStateSyncComplete as u8,
                data: std::ptr::null_mut(),
            },
            BridgeEvent::Receipt {
                kind,
                chat,
                message_ids,
            } => {
                let (ids, size) = string_vec_to_c(message_ids);
                Self {
                    kind: EventKind::Receipt as u8,
                    data: into_raw(CReceiptEvent {
                        kind: *kind as u8,
                        id: to_c_string(&chat.canonical()),
                        message_ids: ids,
                        size,
                    })
                    .cast::<c_void>(),
                }
            }
        }
    }
}

/// Free an event delivered to the event callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_free_event(event: *mut CEvent) {
    if event.is_null() {
        return;
    }
    let event = unsafe { Box::from_raw(event) };
    if event.data.is_null() {
        return;
    }
    match event.kind {
        k if k == EventKind::SyncProgress as u8 => {
            drop(unsafe { Box::from_raw(event.data.cast::<u8>()) });
        }
        k if k == EventKind::Receipt as u8 => {
            let receipt = unsafe { Box::from_raw(event.data.cast::<CReceiptEvent>()) };
            unsafe {
                wa_free_string(receipt.id);
                free_c_string_array(receipt.message_ids, receipt.size);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileKind;
    use crate::project::{FileMessage, MessageInfo};
    use crate::pump::ReceiptKind;

    unsafe fn read(s: *const c_char) -> String {
        unsafe { CStr::from_ptr(s) }.to_str().unwrap().to_owned()
    }

    #[test]
    fn struct_layout_field_order() {
        assert_eq!(std::mem::offset_of!(CMessage, info), 0);
        assert_eq!(std::mem::offset_of!(CMessageInfo, id), 0);
        assert!(
            std::mem::offset_of!(CMessageInfo, quote_id)
                < std::mem::offset_of!(CMessageInfo, read_by)
        );
        assert_eq!(std::mem::offset_of!(CFileMessage, kind), 0);
        assert_eq!(std::mem::offset_of!(CEvent, kind), 0);
    }

    #[test]
    fn file_message_to_c_and_back() {
        let msg = ProjectedMessage {
            info: MessageInfo {
                id: "ID1".into(),
                chat: "1@s.whatsapp.net".parse().unwrap(),
                sender: "2:4@s.whatsapp.net".parse().unwrap(),
                timestamp: 7,
                is_from_me: true,
                quote_id: Some("Q".into()),
            },
            content: MessageContent::File(FileMessage {
                kind: FileKind::Sticker,
                path: "stickers/ID1.webp".into(),
                file_id: "{}".into(),
                caption: None,
            }),
        };
        let ptr = into_raw(CMessage::from_projected(&msg));
        unsafe {
            let c = &*ptr;
            assert_eq!(read(c.info.sender), "2@s.whatsapp.net");
            assert_eq!(read(c.info.quote_id), "Q");
            assert_eq!(c.info.read_by, 0);
            assert_eq!(c.message_type, MessageType::File as u8);
            let file = &*c.message.cast::<CFileMessage>();
            assert_eq!(file.kind, 4);
            assert!(file.caption.is_null());
            assert_eq!(read(file.path), "stickers/ID1.webp");
            wa_free_message(ptr);
        }
    }

    #[test]
    fn receipt_event_to_c() {
        let ev = BridgeEvent::Receipt {
            kind: ReceiptKind::ReadSelf,
            chat: "5@s.whatsapp.net".parse().unwrap(),
            message_ids: vec!["a".into(), "b".into()],
        };
        let ptr = into_raw(CEvent::from_event(&ev));
        unsafe {
            assert_eq!((*ptr).kind, EventKind::Receipt as u8);
            let r = &*(*ptr).data.cast::<CReceiptEvent>();
            assert_eq!(r.kind, 1);
            assert_eq!(r.size, 2);
            assert_eq!(read(r.id), "5@s.whatsapp.net");
            assert_eq!(read(*r.message_ids.add(1)), "b");
            wa_free_event(ptr);
        }
    }

    #[test]
    fn progress_event_to_c() {
        let ptr = into_raw(CEvent::from_event(&BridgeEvent::SyncProgress(42)));
        unsafe {
            assert_eq!(*(*ptr).data.cast::<u8>(), 42);
            wa_free_event(ptr);
        }
    }

    #[test]
    fn block_on_from_plain_thread() {
        assert_eq!(block_on(async { tokio::task::yield_now().await; 7 }), 7);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn block_on_inside_current_thread_runtime() {
        let out = block_on(async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            "done"
        });
        assert_eq!(out, "done");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn block_on_inside_multi_thread_runtime() {
        assert_eq!(block_on(async { 3 + 4 }), 7);
    }

    #[test]
    fn nul_bytes_are_stripped() {
        let p = to_c_string("a\0b");
        unsafe {
            assert_eq!(read(p), "ab");
            wa_free_string(p);
        }
    }
}
