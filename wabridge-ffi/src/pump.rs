//! Event pump: library events in, projected messages and host events out.

use std::sync::{Arc, Weak};

use tracing::{info, warn};

use crate::backend::{MessageEvent, PatchName, Receipt, ReceiptType, WaClient, WaEvent};
use crate::jid::Jid;
use crate::normalize::Normalizer;
use crate::project::{MessageInfo, ProjectedMessage, project};
use crate::proto;

/// Receipt kinds surfaced to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReceiptKind {
    /// Read by the other party.
    Read = 0,
    /// Read on another of the local user's devices.
    ReadSelf = 1,
}

impl ReceiptKind {
    fn from_library(t: &ReceiptType) -> Option<Self> {
        match t {
            ReceiptType::Read => Some(Self::Read),
            ReceiptType::ReadSelf => Some(Self::ReadSelf),
            _ => None,
        }
    }
}

/// Non-message events delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// History sync progress, percent.
    SyncProgress(u8),
    /// The regular app-state patch finished syncing.
    AppStateSyncComplete,
    /// A read receipt.
    Receipt {
        kind: ReceiptKind,
        chat: Jid,
        message_ids: Vec<String>,
    },
}

/// Destination of pump output.
pub trait Sink: Send + Sync {
    /// Deliver one projected message; `is_sync` marks history.
    fn message(&self, message: ProjectedMessage, is_sync: bool);
    /// Deliver one non-message event.
    fn event(&self, event: BridgeEvent);
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn message(&self, message: ProjectedMessage, is_sync: bool) {
        (**self).message(message, is_sync);
    }

    fn event(&self, event: BridgeEvent) {
        (**self).event(event);
    }
}

/// Dispatches library events for one client.
///
/// Holds the client weakly: the client owns the handler that owns the pump.
pub struct Pump<S> {
    client: Weak<dyn WaClient>,
    sink: S,
}

impl<S> std::fmt::Debug for Pump<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pump").finish_non_exhaustive()
    }
}

impl<S: Sink + 'static> Pump<S> {
    /// Pump for `client`, feeding `sink`. Call [`Pump::handle`] to drive it.
    pub fn new(client: &Arc<dyn WaClient>, sink: S) -> Self {
        Self {
            client: Arc::downgrade(client),
            sink,
        }
    }

    /// Subscribe a pump to the client's event bus.
    pub fn register(client: &Arc<dyn WaClient>, sink: S) {
        let pump = Self::new(client, sink);
        client.add_event_handler(Arc::new(move |event: WaEvent| pump.handle(event)));
    }

    /// Route one library event to the sink.
    pub fn handle(&self, event: WaEvent) {
        let Some(client) = self.client.upgrade() else {
            warn!(event = event.name(), "client gone, dropping event");
            return;
        };
        let normalizer = Normalizer::for_client(client.as_ref());

        match event {
            WaEvent::Message(evt) => self.on_message(&normalizer, &evt),
            WaEvent::Receipt(receipt) => self.on_receipt(&normalizer, receipt),
            WaEvent::AppStateSyncComplete { name } => {
                if name == PatchName::Regular {
                    self.sink.event(BridgeEvent::AppStateSyncComplete);
                } else {
                    warn!(patch = name.as_str(), "ignoring app state patch");
                }
            }
            WaEvent::HistorySync(sync) => self.on_history(&normalizer, &sync),
            other => warn!(event = other.name(), "unhandled event"),
        }
    }

    fn on_message<F: Fn(&Jid) -> Option<Jid>>(&self, n: &Normalizer<F>, evt: &MessageEvent) {
        let src = &evt.info;
        let info = MessageInfo {
            id: src.id.clone(),
            chat: n.chat(&src.chat, &src.sender),
            sender: n.sender(&src.chat, &src.sender),
            timestamp: src.timestamp,
            is_from_me: src.is_from_me,
            quote_id: None,
        };
        let projected = project(&info, &evt.message);
        if projected.is_empty() {
            warn!(id = %src.id, "message has no supported content");
        }
        for msg in projected {
            self.sink.message(msg, false);
        }
    }

    fn on_receipt<F: Fn(&Jid) -> Option<Jid>>(&self, n: &Normalizer<F>, receipt: Receipt) {
        let Some(kind) = ReceiptKind::from_library(&receipt.receipt_type) else {
            warn!(receipt_type = ?receipt.receipt_type, "ignoring receipt");
            return;
        };
        let chat = n.chat(&receipt.chat, &receipt.sender);
        info!(
            chat = %chat.canonical(),
            ids = ?receipt.message_ids,
            ?kind,
            "messages read"
        );
        self.sink.event(BridgeEvent::Receipt {
            kind,
            chat,
            message_ids: receipt.message_ids,
        });
    }

    fn on_history<F: Fn(&Jid) -> Option<Jid>>(&self, n: &Normalizer<F>, sync: &proto::HistorySync) {
        let progress = u8::try_from(sync.progress().min(100)).unwrap_or(100);
        self.sink.event(BridgeEvent::SyncProgress(progress));

        for conv in &sync.conversations {
            let chat: Jid = match conv.id.parse() {
                Ok(chat) => chat,
                Err(e) => {
                    warn!(id = %conv.id, error = %e, "skipping conversation with bad id");
                    continue;
                }
            };
            for entry in &conv.messages {
                let Some(web) = &entry.message else {
                    warn!(chat = %conv.id, "skipping history entry without message info");
                    continue;
                };
                let Some(info) = history_info(n.own(), &chat, web) else {
                    continue;
                };
                let Some(message) = &web.message else {
                    warn!(id = %info.id, "skipping history entry without content");
                    continue;
                };
                let info = MessageInfo {
                    chat: n.chat(&info.chat, &info.sender),
                    sender: n.sender(&info.chat, &info.sender),
                    ..info
                };
                let projected = project(&info, message);
                if projected.is_empty() {
                    warn!(id = %info.id, "history message has no supported content");
                }
                for msg in projected {
                    self.sink.message(msg, true);
                }
            }
        }
    }
}

/// Rebuild raw message metadata for an archived record. `None` when the
/// sender cannot be attributed.
fn history_info(own: Option<&Jid>, chat: &Jid, web: &proto::WebMessageInfo) -> Option<MessageInfo> {
    let key = web.key.as_ref();
    let is_from_me = key.is_some_and(proto::MessageKey::from_me);
    let id = key.map(proto::MessageKey::id).unwrap_or_default().to_owned();

    let sender = if is_from_me {
        own.map(Jid::to_non_ad).unwrap_or_default()
    } else {
        let raw = [
            web.participant(),
            key.map(proto::MessageKey::participant).unwrap_or_default(),
        ]
        .into_iter()
        .find(|s| !s.is_empty());
        match raw {
            Some(raw) => match raw.parse::<Jid>() {
                Ok(jid) => jid,
                Err(e) => {
                    warn!(%id, sender = raw, error = %e, "dropping history message with bad sender");
                    return None;
                }
            },
            None => chat.clone(),
        }
    };
    if sender.is_empty() {
        warn!(%id, "dropping history message without sender");
        return None;
    }

    Some(MessageInfo {
        id,
        chat: chat.clone(),
        sender,
        timestamp: i64::try_from(web.message_timestamp()).unwrap_or(i64::MAX),
        is_from_me,
        quote_id: None,
    })
}
