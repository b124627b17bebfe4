//! Built-in [`Connector`] over the `whatsapp-rust` stack.
//!
//! The session lives in the SQLite store named by [`StoreConfig`], the
//! transport is the tokio WebSocket factory and media goes through the ureq
//! HTTP client. Library events are translated into [`WaEvent`]s; message and
//! history payloads cross over by re-encoding, since the wire tags of
//! [`crate::proto`] match the library's schema.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wacore::store::DevicePropsOverride;
use wacore::types::events::Event;
use wacore::types::presence::ReceiptType as WireReceiptType;
use wacore_binary::Jid as WireJid;
use whatsapp_rust::bot::{Bot, BotHandle};
use whatsapp_rust::download::MediaType as WireMediaType;
use whatsapp_rust::pair_code::{CompanionWebClientType, PairCodeOptions};
use whatsapp_rust::store::SqliteStore;
use whatsapp_rust::waproto::whatsapp as wa;
use whatsapp_rust::{Client, TokioRuntime, UploadOptions};
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

use crate::backend::{
    BackendError, BackendResult, Connector, ContactInfo, DownloadRequest, EventHandler, GroupInfo,
    MessageEvent, MessageSource, QrItem, Receipt, ReceiptType, SendResponse, UploadResponse,
    WaClient, WaEvent,
};
use crate::config::{PairClientType, PairingConfig, StoreConfig};
use crate::descriptor::MediaType;
use crate::ffi::block_on;
use crate::jid::{DEFAULT_USER_SERVER, HIDDEN_USER_SERVER, Jid};
use crate::proto;

/// How long `connect` and phone pairing wait for the socket.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens the SQLite session store and builds a `whatsapp-rust` client for
/// its first device.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConnector;

impl Connector for NativeConnector {
    fn open(&self, store: &StoreConfig) -> BackendResult<Arc<dyn WaClient>> {
        store
            .ensure_parent()
            .map_err(|e| BackendError::Store(e.to_string()))?;
        let client = block_on(NativeClient::open(store))?;
        Ok(Arc::new(client))
    }
}

/// State shared with the event callback registered on the library.
#[derive(Default)]
struct Shared {
    handlers: RwLock<Vec<EventHandler>>,
    qr: Mutex<Option<mpsc::Sender<QrItem>>>,
    own: RwLock<Option<Jid>>,
    contacts: RwLock<BTreeMap<Jid, ContactInfo>>,
}

impl Shared {
    fn open_qr(&self) -> mpsc::Receiver<QrItem> {
        let (tx, rx) = mpsc::channel(16);
        *self.qr.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Push onto the pairing channel; `last` closes it.
    fn qr(&self, item: QrItem, last: bool) {
        let mut slot = self.qr.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(tx) => {
                if tx.try_send(item).is_err() {
                    warn!("pairing channel full or closed");
                }
            }
            None => debug!("pairing event without an open QR channel"),
        }
        if last {
            *slot = None;
        }
    }

    fn learn(&self, jid: Jid, update: impl FnOnce(&mut ContactInfo)) {
        let mut contacts = self.contacts.write().unwrap_or_else(PoisonError::into_inner);
        let entry = contacts.entry(jid.to_non_ad()).or_default();
        entry.found = true;
        update(entry);
    }

    fn contacts(&self) -> Vec<(Jid, ContactInfo)> {
        self.contacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(jid, info)| (jid.clone(), info.clone()))
            .collect()
    }

    fn dispatch(&self, event: &Event) {
        match event {
            Event::PairingQrCode { code, .. } => self.qr(QrItem::Code(code.clone()), false),
            Event::PairSuccess(pair) => {
                info!(id = %pair.id, platform = %pair.platform, "paired");
                *self.own.write().unwrap_or_else(PoisonError::into_inner) = Some(Jid::from(&pair.id));
                self.qr(QrItem::Success, true);
            }
            Event::PairError(pair) => self.qr(QrItem::Error(pair.error.clone()), true),
            Event::PushNameUpdate(update) => {
                let name = update.new_push_name.clone();
                self.learn(Jid::from(&update.jid), |c| c.push_name = name);
            }
            Event::ContactUpdate(update) => {
                let action = &update.action;
                self.learn(Jid::from(&update.jid), |c| {
                    if let Some(full) = &action.full_name {
                        c.full_name.clone_from(full);
                    }
                    if let Some(first) = &action.first_name {
                        c.first_name.clone_from(first);
                    }
                });
            }
            _ => {}
        }

        let event = translate(event);
        match &event {
            WaEvent::Message(msg) if !msg.info.is_from_me && !msg.info.push_name.is_empty() => {
                let name = msg.info.push_name.clone();
                self.learn(msg.info.sender.clone(), |c| c.push_name = name);
            }
            WaEvent::HistorySync(history) => {
                for entry in &history.pushnames {
                    let (Some(id), Some(name)) = (&entry.id, &entry.pushname) else {
                        continue;
                    };
                    match id.parse::<Jid>() {
                        Ok(jid) => self.learn(jid, |c| c.push_name.clone_from(name)),
                        Err(e) => debug!(error = %e, "skipping push name"),
                    }
                }
            }
            _ => {}
        }

        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in &handlers {
            handler(event.clone());
        }
    }
}

/// Re-encode between two prost types that share wire tags.
fn recode<M: prost::Message + Default>(from: &impl prost::Message) -> Result<M, prost::DecodeError> {
    M::decode(from.encode_to_vec().as_slice())
}

fn translate(event: &Event) -> WaEvent {
    match event {
        Event::Message(message, info) => match recode::<proto::Message>(&**message) {
            Ok(message) => WaEvent::Message(Box::new(MessageEvent {
                info: MessageSource {
                    id: info.id.clone(),
                    chat: Jid::from(&info.source.chat),
                    sender: Jid::from(&info.source.sender),
                    is_from_me: info.source.is_from_me,
                    is_group: info.source.is_group,
                    timestamp: info.timestamp.timestamp(),
                    push_name: info.push_name.clone(),
                },
                message,
            })),
            Err(e) => {
                warn!(id = %info.id, error = %e, "undecodable message");
                WaEvent::Other("Message".into())
            }
        },
        Event::Receipt(receipt) => WaEvent::Receipt(Receipt {
            chat: Jid::from(&receipt.source.chat),
            sender: Jid::from(&receipt.source.sender),
            message_ids: receipt.message_ids.clone(),
            timestamp: receipt.timestamp.timestamp(),
            receipt_type: receipt_type(&receipt.r#type),
        }),
        Event::HistorySync(history) => {
            match <proto::HistorySync as prost::Message>::decode(history.raw_bytes()) {
                Ok(decoded) => WaEvent::HistorySync(Box::new(decoded)),
                Err(e) => {
                    warn!(error = %e, "undecodable history sync");
                    WaEvent::Other("HistorySync".into())
                }
            }
        }
        Event::Connected(_) => WaEvent::Connected,
        Event::LoggedOut(_) => WaEvent::LoggedOut,
        other => WaEvent::Other(variant_name(other)),
    }
}

fn variant_name(event: &Event) -> String {
    let debug = format!("{event:?}");
    debug
        .split(['(', ' ', '{'])
        .next()
        .unwrap_or_default()
        .to_owned()
}

fn receipt_type(kind: &WireReceiptType) -> ReceiptType {
    match kind {
        WireReceiptType::Delivered => ReceiptType::Delivered,
        WireReceiptType::Sender => ReceiptType::Sender,
        WireReceiptType::Retry => ReceiptType::Retry,
        WireReceiptType::Read => ReceiptType::Read,
        WireReceiptType::ReadSelf => ReceiptType::ReadSelf,
        WireReceiptType::Played => ReceiptType::Played,
        WireReceiptType::PlayedSelf => ReceiptType::PlayedSelf,
        WireReceiptType::Inactive => ReceiptType::Inactive,
        WireReceiptType::ServerError => ReceiptType::ServerError,
        WireReceiptType::EncRekeyRetry => ReceiptType::Other("enc_rekey_retry".into()),
        WireReceiptType::PeerMsg => ReceiptType::Other("peer_msg".into()),
        WireReceiptType::HistorySync => ReceiptType::Other("hist_sync".into()),
        WireReceiptType::Other(name) => ReceiptType::Other(name.clone()),
    }
}

const fn wire_media_type(kind: MediaType) -> WireMediaType {
    match kind {
        MediaType::Image => WireMediaType::Image,
        MediaType::Video => WireMediaType::Video,
        MediaType::Audio => WireMediaType::Audio,
        MediaType::Document => WireMediaType::Document,
        MediaType::History => WireMediaType::History,
        MediaType::AppState => WireMediaType::AppState,
        MediaType::LinkThumbnail => WireMediaType::LinkThumbnail,
    }
}

const fn platform(kind: PairClientType) -> CompanionWebClientType {
    match kind {
        PairClientType::Chrome => CompanionWebClientType::Chrome,
        PairClientType::Edge => CompanionWebClientType::Edge,
        PairClientType::Firefox => CompanionWebClientType::Firefox,
        PairClientType::Ie => CompanionWebClientType::Ie,
        PairClientType::Opera => CompanionWebClientType::Opera,
        PairClientType::Safari => CompanionWebClientType::Safari,
        PairClientType::Electron => CompanionWebClientType::Electron,
        PairClientType::Uwp => CompanionWebClientType::Uwp,
        PairClientType::Unknown | PairClientType::OtherWebClient => {
            CompanionWebClientType::OtherWebClient
        }
    }
}

fn wire_jid(jid: &Jid) -> BackendResult<WireJid> {
    WireJid::try_from(jid).map_err(|e| BackendError::Other(e.to_string()))
}

struct NativeClient {
    client: Arc<Client>,
    /// Built but not yet started; taken by the first `connect`.
    bot: Mutex<Option<Bot>>,
    /// Keeps the run loop alive; dropping it aborts the loop.
    run: Mutex<Option<BotHandle>>,
    shared: Arc<Shared>,
}

impl NativeClient {
    async fn open(store: &StoreConfig) -> BackendResult<Self> {
        let uri = store.uri();
        // A fresh store handle binds to device 1, the first device row.
        let backend = SqliteStore::new(&uri)
            .await
            .map_err(|e| BackendError::Store(e.to_string()))?;

        let shared = Arc::new(Shared::default());
        let events = Arc::clone(&shared);
        let bot = Bot::builder()
            .with_backend(Arc::new(backend))
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_runtime(TokioRuntime)
            .on_event(move |event, _client| {
                let events = Arc::clone(&events);
                async move { events.dispatch(&event) }
            })
            .build()
            .await
            .map_err(|e| BackendError::Store(e.to_string()))?;

        let client = bot.client();
        let own = client.get_pn().await.map(Jid::from);
        info!(store = %uri, paired = own.is_some(), "session store opened");
        *shared.own.write().unwrap_or_else(PoisonError::into_inner) = own;

        Ok(Self {
            client,
            bot: Mutex::new(Some(bot)),
            run: Mutex::new(None),
            shared,
        })
    }

    fn lookup(&self, jid: &Jid) -> Option<wacore::types::LidPnEntry> {
        let wire = WireJid::try_from(&jid.to_non_ad()).ok()?;
        match block_on(self.client.get_lid_pn_entry(&wire)) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(jid = %jid, error = %e, "alias lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl WaClient for NativeClient {
    fn own_id(&self) -> Option<Jid> {
        self.shared
            .own
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn qr_channel(&self) -> BackendResult<mpsc::Receiver<QrItem>> {
        Ok(self.shared.open_qr())
    }

    async fn connect(&self) -> BackendResult<()> {
        let bot = self.bot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut bot) = bot {
            let handle = bot
                .run()
                .await
                .map_err(|e| BackendError::Network(format!("{e:#}")))?;
            *self.run.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        } else {
            let client = Arc::clone(&self.client);
            tokio::spawn(async move { client.run().await });
        }
        self.client
            .wait_for_socket(SOCKET_TIMEOUT)
            .await
            .map_err(|e| BackendError::Network(format!("{e:#}")))
    }

    fn disconnect(&self) {
        let client = Arc::clone(&self.client);
        block_on(async move { client.disconnect().await });
        drop(self.run.lock().unwrap_or_else(PoisonError::into_inner).take());
    }

    fn add_event_handler(&self, handler: EventHandler) {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    async fn pair_phone(&self, phone: &str, config: &PairingConfig) -> BackendResult<String> {
        self.client
            .wait_for_socket(SOCKET_TIMEOUT)
            .await
            .map_err(|_| BackendError::NotConnected)?;
        self.client
            .set_device_props(DevicePropsOverride::new().with_os(config.client_display_name.clone()))
            .await;
        let options = PairCodeOptions {
            phone_number: phone.to_owned(),
            show_push_notification: config.show_push_notification,
            custom_code: None,
            platform_id: Some(platform(config.client_type)),
        };
        self.client
            .pair_with_code(options)
            .await
            .map_err(|e| BackendError::Other(e.to_string()))
    }

    async fn send_message(
        &self,
        to: &Jid,
        message: proto::Message,
    ) -> BackendResult<SendResponse> {
        let to = wire_jid(to)?;
        let message: wa::Message =
            recode(&message).map_err(|e| BackendError::Other(e.to_string()))?;
        let sent = self
            .client
            .send_message(to, message)
            .await
            .map_err(|e| BackendError::Network(format!("{e:#}")))?;
        Ok(SendResponse {
            id: sent.message_id,
            timestamp: wacore::time::now_secs(),
        })
    }

    async fn upload(&self, data: Vec<u8>, media_type: MediaType) -> BackendResult<UploadResponse> {
        let uploaded = self
            .client
            .upload(data, wire_media_type(media_type), UploadOptions::new())
            .await
            .map_err(|e| BackendError::Media(format!("{e:#}")))?;
        Ok(UploadResponse {
            media_key: uploaded.media_key.to_vec(),
            file_enc_sha256: uploaded.file_enc_sha256.to_vec(),
            file_sha256: uploaded.file_sha256.to_vec(),
            url: uploaded.url,
            direct_path: uploaded.direct_path,
            file_length: uploaded.file_length,
        })
    }

    async fn download_media_with_path(
        &self,
        request: DownloadRequest<'_>,
    ) -> BackendResult<Vec<u8>> {
        self.client
            .download_from_params(
                request.direct_path,
                request.media_key,
                request.sha256,
                request.enc_sha256,
                u64::try_from(request.size).unwrap_or_default(),
                wire_media_type(request.media_type),
            )
            .await
            .map_err(|e| BackendError::Media(format!("{e:#}")))
    }

    fn pn_for_lid(&self, lid: &Jid) -> Option<Jid> {
        if !lid.is_hidden_user() {
            return None;
        }
        self.lookup(lid)
            .map(|entry| Jid::new(entry.phone_number, DEFAULT_USER_SERVER))
    }

    fn lid_for_pn(&self, pn: &Jid) -> Option<Jid> {
        if pn.server != DEFAULT_USER_SERVER {
            return None;
        }
        self.lookup(pn)
            .map(|entry| Jid::new(entry.lid, HIDDEN_USER_SERVER))
    }

    async fn contacts(&self) -> BackendResult<Vec<(Jid, ContactInfo)>> {
        Ok(self.shared.contacts())
    }

    async fn joined_groups(&self) -> BackendResult<Vec<GroupInfo>> {
        let groups = self
            .client
            .groups()
            .get_participating()
            .await
            .map_err(|e| BackendError::Network(format!("{e:#}")))?;
        let mut groups: Vec<GroupInfo> = groups
            .into_values()
            .map(|meta| GroupInfo {
                jid: Jid::from(meta.id),
                name: meta.subject,
            })
            .collect();
        groups.sort_by(|a, b| a.jid.cmp(&b.jid));
        Ok(groups)
    }
}
