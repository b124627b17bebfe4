//! In-memory protocol client for tests.
//!
//! [`MemoryClient`] serves media blobs by direct path, records everything
//! sent or requested, and delivers events synchronously to its handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::backend::{
    BackendError, BackendResult, Connector, ContactInfo, DownloadRequest, EventHandler, GroupInfo,
    QrItem, SendResponse, UploadResponse, WaClient, WaEvent,
};
use crate::config::{PairingConfig, StoreConfig};
use crate::descriptor::MediaType;
use crate::jid::Jid;
use crate::proto;

/// Timestamp reported for the first send; later sends count up from it.
pub const SEND_TIMESTAMP: i64 = 1_700_000_000;

/// An owned copy of a [`DownloadRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDownload {
    /// Requested path.
    pub direct_path: String,
    /// Requested key domain.
    pub media_type: MediaType,
    /// Requested MMS type.
    pub mms_type: String,
    /// Requested size.
    pub size: i64,
}

/// A message handed to [`WaClient::send_message`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSend {
    /// Recipient.
    pub to: Jid,
    /// Message as sent.
    pub message: proto::Message,
}

#[derive(Default)]
struct State {
    own_id: Option<Jid>,
    /// Identity assumed once QR pairing succeeds.
    paired_id: Option<Jid>,
    qr_codes: Vec<String>,
    qr_tx: Option<mpsc::Sender<QrItem>>,
    connects: usize,
    connected: bool,
    handlers: Vec<EventHandler>,
    media: HashMap<String, Vec<u8>>,
    downloads: Vec<RecordedDownload>,
    uploads: Vec<(MediaType, Vec<u8>)>,
    sends: Vec<RecordedSend>,
    pair_requests: Vec<String>,
    lid_by_pn: HashMap<Jid, Jid>,
    contacts: Vec<(Jid, ContactInfo)>,
    groups: Vec<GroupInfo>,
}

/// A [`WaClient`] that keeps all state in memory.
#[derive(Default)]
pub struct MemoryClient {
    state: Mutex<State>,
}

impl std::fmt::Debug for MemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryClient").finish_non_exhaustive()
    }
}

impl MemoryClient {
    /// Unpaired client with no state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Set the paired identity, `None` for unpaired.
    pub fn set_own_id(&self, jid: Option<Jid>) {
        self.state().own_id = jid;
    }

    /// Codes to emit on the QR channel; pairing then succeeds as `paired_id`.
    pub fn script_qr(&self, codes: &[&str], paired_id: Jid) {
        let mut st = self.state();
        st.qr_codes = codes.iter().map(|c| (*c).to_owned()).collect();
        st.paired_id = Some(paired_id);
    }

    /// Serve `data` for downloads of `direct_path`.
    pub fn put_media(&self, direct_path: &str, data: Vec<u8>) {
        self.state().media.insert(direct_path.to_owned(), data);
    }

    /// Record a phone-number to lid mapping, usable both ways.
    pub fn set_lid_mapping(&self, pn: Jid, lid: Jid) {
        self.state().lid_by_pn.insert(pn, lid);
    }

    /// Add a contact to the store.
    pub fn add_contact(&self, jid: Jid, info: ContactInfo) {
        self.state().contacts.push((jid, info));
    }

    /// Add a joined group.
    pub fn add_group(&self, jid: Jid, name: &str) {
        self.state().groups.push(GroupInfo {
            jid,
            name: name.to_owned(),
        });
    }

    /// Deliver an event to every handler on the calling thread.
    pub fn emit(&self, event: WaEvent) {
        let handlers = self.state().handlers.clone();
        for handler in handlers {
            handler(event.clone());
        }
    }

    /// Number of registered event handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.state().handlers.len()
    }

    /// Number of `connect` calls.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.state().connects
    }

    /// Connected and not since disconnected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Downloads requested so far.
    #[must_use]
    pub fn download_requests(&self) -> Vec<RecordedDownload> {
        self.state().downloads.clone()
    }

    /// Uploads received so far.
    #[must_use]
    pub fn uploads(&self) -> Vec<(MediaType, Vec<u8>)> {
        self.state().uploads.clone()
    }

    /// Messages sent so far.
    #[must_use]
    pub fn sends(&self) -> Vec<RecordedSend> {
        self.state().sends.clone()
    }

    /// Phone numbers pairing was requested for.
    #[must_use]
    pub fn pair_requests(&self) -> Vec<String> {
        self.state().pair_requests.clone()
    }
}

#[async_trait]
impl WaClient for MemoryClient {
    fn own_id(&self) -> Option<Jid> {
        self.state().own_id.clone()
    }

    async fn qr_channel(&self) -> BackendResult<mpsc::Receiver<QrItem>> {
        let mut st = self.state();
        let (tx, rx) = mpsc::channel(st.qr_codes.len() + 1);
        st.qr_tx = Some(tx);
        Ok(rx)
    }

    async fn connect(&self) -> BackendResult<()> {
        let mut st = self.state();
        st.connects += 1;
        st.connected = true;
        if let Some(tx) = st.qr_tx.take() {
            for code in &st.qr_codes {
                tx.try_send(QrItem::Code(code.clone()))
                    .map_err(|e| BackendError::Other(e.to_string()))?;
            }
            tx.try_send(QrItem::Success)
                .map_err(|e| BackendError::Other(e.to_string()))?;
            let paired = st.paired_id.clone();
            st.own_id = paired;
        }
        Ok(())
    }

    fn disconnect(&self) {
        self.state().connected = false;
    }

    fn add_event_handler(&self, handler: EventHandler) {
        self.state().handlers.push(handler);
    }

    async fn pair_phone(&self, phone: &str, _config: &PairingConfig) -> BackendResult<String> {
        if phone.is_empty() || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(BackendError::Other(format!("invalid phone number {phone:?}")));
        }
        self.state().pair_requests.push(phone.to_owned());
        Ok("ABCD-1234".to_owned())
    }

    async fn send_message(
        &self,
        to: &Jid,
        message: proto::Message,
    ) -> BackendResult<SendResponse> {
        let mut st = self.state();
        if !st.connected {
            return Err(BackendError::NotConnected);
        }
        st.sends.push(RecordedSend {
            to: to.clone(),
            message,
        });
        let n = st.sends.len();
        Ok(SendResponse {
            id: format!("MEM{n:04}"),
            timestamp: SEND_TIMESTAMP + i64::try_from(n).unwrap_or(0),
        })
    }

    async fn upload(&self, data: Vec<u8>, media_type: MediaType) -> BackendResult<UploadResponse> {
        let mut st = self.state();
        let n = st.uploads.len();
        let direct_path = format!("/mem/{}/{n}", media_type.mms_type());
        let file_length = u64::try_from(data.len()).unwrap_or(u64::MAX);
        st.media.insert(direct_path.clone(), data.clone());
        st.uploads.push((media_type, data));
        Ok(UploadResponse {
            url: format!("https://mmg.invalid{direct_path}"),
            direct_path,
            media_key: vec![7; 32],
            file_enc_sha256: vec![8; 32],
            file_sha256: vec![9; 32],
            file_length,
        })
    }

    async fn download_media_with_path(
        &self,
        request: DownloadRequest<'_>,
    ) -> BackendResult<Vec<u8>> {
        let mut st = self.state();
        st.downloads.push(RecordedDownload {
            direct_path: request.direct_path.to_owned(),
            media_type: request.media_type,
            mms_type: request.mms_type.to_owned(),
            size: request.size,
        });
        st.media
            .get(request.direct_path)
            .cloned()
            .ok_or_else(|| BackendError::Media(format!("404 for {}", request.direct_path)))
    }

    fn pn_for_lid(&self, lid: &Jid) -> Option<Jid> {
        self.state()
            .lid_by_pn
            .iter()
            .find(|(_, l)| *l == lid)
            .map(|(pn, _)| pn.clone())
    }

    fn lid_for_pn(&self, pn: &Jid) -> Option<Jid> {
        self.state().lid_by_pn.get(pn).cloned()
    }

    async fn contacts(&self) -> BackendResult<Vec<(Jid, ContactInfo)>> {
        Ok(self.state().contacts.clone())
    }

    async fn joined_groups(&self) -> BackendResult<Vec<GroupInfo>> {
        Ok(self.state().groups.clone())
    }
}

/// Hands out one shared [`MemoryClient`] and records the store it was asked for.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    client: Arc<MemoryClient>,
    opened: Mutex<Vec<String>>,
}

impl MemoryConnector {
    /// Connector that always hands out `client`.
    #[must_use]
    pub fn new(client: Arc<MemoryClient>) -> Self {
        Self {
            client,
            opened: Mutex::default(),
        }
    }

    /// Store URIs passed to [`Connector::open`], in call order.
    #[must_use]
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Connector for MemoryConnector {
    fn open(&self, store: &StoreConfig) -> BackendResult<Arc<dyn WaClient>> {
        self.opened
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(store.uri());
        Ok(self.client.clone())
    }
}

/// Records every event as `(host level, line)`.
#[derive(Debug, Clone, Default)]
struct CaptureLayer(Arc<Mutex<Vec<(u8, String)>>>);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = crate::log::host_level(*event.metadata().level());
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((level, crate::log::render(event)));
    }
}

/// Run `f` with a thread-local subscriber and return the lines it logged,
/// with host levels (0 = error, 1 = warn, 2 = info, 3 = debug).
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<(u8, String)>) {
    let layer = CaptureLayer::default();
    let lines = layer.0.clone();
    let out = tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), f);
    let lines = lines
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone();
    (out, lines)
}
