#![allow(unsafe_code)]
//! Client: session setup, callbacks, sending, contacts and media.

use std::ffi::{c_char, c_void};
use std::path::Path;
use std::sync::mpsc;

use wabridge_ffi::client as sys;
use wabridge_ffi::{CEvent, CMessage, MessageType, wa_free_event, wa_free_message};

use crate::error::{Error, Result};
use crate::ffi::{borrowed_string, c_str_ptr, optional_c_string, take_c_string, to_c_string};
use crate::types::{Contact, Event, Jid, LogLevel, Message};

type LogFn = Box<dyn Fn(&str, LogLevel) + Send + Sync>;
type MessageFn = Box<dyn Fn(Message, bool) + Send + Sync>;
type EventFn = Box<dyn Fn(Event) + Send + Sync>;

/// The message a reply refers to.
#[derive(Debug, Clone, Copy)]
pub struct Quote<'a> {
    /// Id of the quoted message.
    pub id: &'a str,
    /// Author of the quoted message, when known.
    pub sender: Option<&'a Jid>,
}

/// Handle to the process-wide client.
///
/// The adapter holds a single client per process; creating a second
/// [`Client`] replaces the first.
#[derive(Debug)]
pub struct Client {
    _private: (),
}

impl Client {
    /// Open (or create) the session store at `db_path`.
    ///
    /// Uses the connector installed with
    /// [`wabridge_ffi::backend::install_connector`], else the built-in one.
    /// The adapter aborts the process if the store cannot be opened.
    ///
    /// # Errors
    ///
    /// Fails if `db_path` is not valid UTF-8 or contains NUL.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path
            .as_ref()
            .to_str()
            .ok_or_else(|| Error::InvalidArgument("db path is not UTF-8".into()))?;
        let c_path = to_c_string(path)?;
        unsafe { sys::wa_new_client(c_path.as_ptr()) };
        Ok(Self { _private: () })
    }

    /// Receive adapter log lines. Replaces any previous log handler.
    pub fn on_log<F: Fn(&str, LogLevel) + Send + Sync + 'static>(&self, f: F) {
        let ctx = leak_ctx::<LogFn>(Box::new(f));
        unsafe { sys::wa_set_log_handler(Some(log_trampoline), ctx) };
    }

    /// Receive messages; the flag is `true` for history-sync replays.
    /// Replaces any previous message handler. Set before [`Self::connect`].
    pub fn on_message<F: Fn(Message, bool) + Send + Sync + 'static>(&self, f: F) {
        let ctx = leak_ctx::<MessageFn>(Box::new(f));
        unsafe { sys::wa_set_message_handler(Some(message_trampoline), ctx) };
    }

    /// Receive events. Replaces any previous event handler. Set before
    /// [`Self::connect`].
    pub fn on_event<F: Fn(Event) + Send + Sync + 'static>(&self, f: F) {
        let ctx = leak_ctx::<EventFn>(Box::new(f));
        unsafe { sys::wa_set_event_handler(Some(event_trampoline), ctx) };
    }

    /// Deliver messages through a channel instead of a closure.
    #[must_use]
    pub fn messages(&self) -> mpsc::Receiver<(Message, bool)> {
        let (tx, rx) = mpsc::channel();
        self.on_message(move |m, is_sync| {
            let _ = tx.send((m, is_sync));
        });
        rx
    }

    /// Deliver events through a channel instead of a closure.
    #[must_use]
    pub fn events(&self) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel();
        self.on_event(move |e| {
            let _ = tx.send(e);
        });
        rx
    }

    /// Connect, calling `qr` with each pairing code to render if the store
    /// holds no session. Blocks until paired or resumed.
    ///
    /// Returns `true` when an existing session was resumed.
    pub fn connect<F: FnMut(&str)>(&self, mut qr: F) -> bool {
        let mut cb: &mut dyn FnMut(&str) = &mut qr;
        let ctx = (&raw mut cb).cast::<c_void>();
        unsafe { sys::wa_connect(Some(qr_trampoline), ctx) }
    }

    /// Request a code to enter on the phone for linking by phone number.
    ///
    /// # Errors
    ///
    /// [`Error::PairingFailed`] when the library rejects the request.
    pub fn pair_phone(&self, phone: &str) -> Result<String> {
        let c_phone = to_c_string(phone)?;
        let code = unsafe { sys::wa_pair_phone(c_phone.as_ptr()) };
        if code.is_null() {
            return Err(Error::PairingFailed);
        }
        unsafe { take_c_string(code) }
    }

    /// Send a text message. The sent message is also delivered to the
    /// message handler.
    ///
    /// # Errors
    ///
    /// Fails on arguments containing NUL. Send failures abort the process.
    pub fn send_text(&self, to: &Jid, text: &str, quote: Option<Quote<'_>>) -> Result<()> {
        self.send(to, MessageType::Text, text, quote)
    }

    /// Upload and send a local file. The kind (image, video, audio or
    /// document) follows the file's mime type.
    ///
    /// # Errors
    ///
    /// Fails on a non-UTF-8 path or arguments containing NUL.
    pub fn send_file(&self, to: &Jid, path: &Path, quote: Option<Quote<'_>>) -> Result<()> {
        let path = path
            .to_str()
            .ok_or_else(|| Error::InvalidArgument("file path is not UTF-8".into()))?;
        self.send(to, MessageType::File, path, quote)
    }

    fn send(
        &self,
        to: &Jid,
        kind: MessageType,
        content: &str,
        quote: Option<Quote<'_>>,
    ) -> Result<()> {
        let c_to = to_c_string(to.as_str())?;
        let c_content = to_c_string(content)?;
        let c_quote_id = optional_c_string(quote.map(|q| q.id))?;
        let c_quote_sender = optional_c_string(quote.and_then(|q| q.sender).map(Jid::as_str))?;
        unsafe {
            sys::wa_send_message(
                c_to.as_ptr(),
                kind as u8,
                c_content.as_ptr(),
                c_str_ptr(c_quote_id.as_ref()),
                c_str_ptr(c_quote_sender.as_ref()),
            );
        }
        Ok(())
    }

    /// Named contacts (also keyed by alias where known) and joined groups.
    ///
    /// # Errors
    ///
    /// Fails if the adapter returns malformed strings.
    pub fn contacts(&self) -> Result<Vec<(Jid, Contact)>> {
        let list = unsafe { sys::wa_get_contacts() };
        let len = list.size as usize;
        let result = (0..len)
            .map(|i| unsafe {
                let jid = Jid::new(borrowed_string(*list.jids.add(i))?);
                Ok((jid, Contact::from_c(&*list.contacts.add(i))?))
            })
            .collect();
        unsafe { sys::wa_free_contacts(list) };
        result
    }

    /// Fetch the payload described by `file_id` into `base_path`. A no-op
    /// when the file is already there.
    ///
    /// # Errors
    ///
    /// [`Error::DownloadFailed`] on any decode, network or filesystem failure.
    pub fn download_file(&self, file_id: &str, base_path: &Path) -> Result<()> {
        let c_id = to_c_string(file_id)?;
        let base = base_path
            .to_str()
            .ok_or_else(|| Error::InvalidArgument("base path is not UTF-8".into()))?;
        let c_base = to_c_string(base)?;
        match unsafe { sys::wa_download_file(c_id.as_ptr(), c_base.as_ptr()) } {
            0 => Ok(()),
            _ => Err(Error::DownloadFailed),
        }
    }

    /// Tear down the connection.
    pub fn disconnect(&self) {
        unsafe { sys::wa_disconnect() };
    }
}

/// Initialize stderr logging. `level` is a filter directive such as
/// `"debug"`; `None` reads `WABRIDGE_LOG`, falling back to `"info"`.
/// Call before [`Client::on_log`]. Returns whether this call installed the
/// logger.
///
/// # Errors
///
/// Fails if `level` contains NUL.
pub fn init_logger(level: Option<&str>) -> Result<bool> {
    let c_level = optional_c_string(level)?;
    Ok(unsafe { wabridge_ffi::log::wa_init_logger(c_str_ptr(c_level.as_ref())) } == 0)
}

/// Box a handler for use as callback context. Handlers live for the rest of
/// the process: library threads may still hold a replaced one.
fn leak_ctx<T: 'static>(f: T) -> *mut c_void {
    Box::into_raw(Box::new(f)).cast::<c_void>()
}

unsafe extern "C" fn qr_trampoline(code: *const c_char, ctx: *mut c_void) {
    let cb = unsafe { &mut *ctx.cast::<&mut dyn FnMut(&str)>() };
    if let Ok(code) = unsafe { borrowed_string(code) } {
        cb(&code);
    }
}

unsafe extern "C" fn log_trampoline(msg: *const c_char, level: u8, ctx: *mut c_void) {
    let f = unsafe { &*ctx.cast::<LogFn>() };
    if let Ok(msg) = unsafe { borrowed_string(msg) } {
        f(&msg, LogLevel::from_ffi(level).unwrap_or(LogLevel::Debug));
    }
}

unsafe extern "C" fn message_trampoline(msg: *mut CMessage, is_sync: bool, ctx: *mut c_void) {
    if msg.is_null() {
        return;
    }
    let f = unsafe { &*ctx.cast::<MessageFn>() };
    let parsed = unsafe { Message::from_c(&*msg) };
    unsafe { wa_free_message(msg) };
    if let Ok(m) = parsed {
        f(m, is_sync);
    }
}

unsafe extern "C" fn event_trampoline(event: *mut CEvent, ctx: *mut c_void) {
    if event.is_null() {
        return;
    }
    let f = unsafe { &*ctx.cast::<EventFn>() };
    let parsed = unsafe { Event::from_c(&*event) };
    unsafe { wa_free_event(event) };
    if let Ok(e) = parsed {
        f(e);
    }
}
