//! Process-wide host callback registrations.
//!
//! Slots are written by the host before `wa_connect` and read from library
//! threads. `user_data` is stored as an address; the adapter never
//! dereferences it.

use std::ffi::{CString, c_void};
use std::sync::RwLock;

use tracing::warn;

use crate::ffi::{CEvent, CMessage, EventCallback, LogHandler, MessageHandlerCallback, into_raw};
use crate::project::ProjectedMessage;
use crate::pump::{BridgeEvent, Sink};

#[derive(Debug, Clone, Copy)]
struct Registration<F> {
    callback: F,
    user_data: usize,
}

impl<F: Copy> Registration<F> {
    fn get(slot: &RwLock<Option<Self>>) -> Option<Self> {
        *slot.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set(slot: &RwLock<Option<Self>>, callback: Option<F>, user_data: *mut c_void) {
        let reg = callback.map(|callback| Self {
            callback,
            user_data: user_data as usize,
        });
        *slot.write().unwrap_or_else(std::sync::PoisonError::into_inner) = reg;
    }

    const fn user_data(self) -> *mut c_void {
        self.user_data as *mut c_void
    }
}

static LOG: RwLock<Option<Registration<LogHandler>>> = RwLock::new(None);
static MESSAGE: RwLock<Option<Registration<MessageHandlerCallback>>> = RwLock::new(None);
static EVENT: RwLock<Option<Registration<EventCallback>>> = RwLock::new(None);

pub(crate) fn set_log_handler(cb: Option<LogHandler>, user_data: *mut c_void) {
    Registration::set(&LOG, cb, user_data);
}

pub(crate) fn set_message_handler(cb: Option<MessageHandlerCallback>, user_data: *mut c_void) {
    Registration::set(&MESSAGE, cb, user_data);
}

pub(crate) fn set_event_handler(cb: Option<EventCallback>, user_data: *mut c_void) {
    Registration::set(&EVENT, cb, user_data);
}

/// Forward one formatted line to the host log handler, if any.
/// Returns whether a handler was called.
pub(crate) fn log(line: &str, level: u8) -> bool {
    let Some(reg) = Registration::get(&LOG) else {
        return false;
    };
    let Ok(msg) = CString::new(line.replace('\0', "")) else {
        return false;
    };
    unsafe { (reg.callback)(msg.as_ptr(), level, reg.user_data()) };
    true
}

/// [`Sink`] that hands pump output to the registered host callbacks.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HostSink;

impl Sink for HostSink {
    fn message(&self, message: ProjectedMessage, is_sync: bool) {
        let Some(reg) = Registration::get(&MESSAGE) else {
            warn!(id = %message.info.id, "no message handler registered, dropping message");
            return;
        };
        let ptr = into_raw(CMessage::from_projected(&message));
        unsafe { (reg.callback)(ptr, is_sync, reg.user_data()) };
    }

    fn event(&self, event: BridgeEvent) {
        let Some(reg) = Registration::get(&EVENT) else {
            warn!(?event, "no event handler registered, dropping event");
            return;
        };
        let ptr = into_raw(CEvent::from_event(&event));
        unsafe { (reg.callback)(ptr, reg.user_data()) };
    }
}
