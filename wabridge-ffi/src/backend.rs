//! Seam to the wrapped protocol client.
//!
//! Authentication, end-to-end encryption, media cryptography and the session
//! store all live behind [`WaClient`]. With the `native` feature the crate
//! ships a connector over the `whatsapp-rust` stack, used whenever nothing
//! else was installed with [`install_connector`].

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::{PairingConfig, StoreConfig};
use crate::descriptor::MediaType;
use crate::jid::Jid;
use crate::proto;

/// Errors reported by the protocol client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The session database could not be opened or read.
    #[error("session store: {0}")]
    Store(String),
    /// The transport is down.
    #[error("client is not connected")]
    NotConnected,
    /// No paired session.
    #[error("not logged in")]
    NotLoggedIn,
    /// Request failed on the wire.
    #[error("network: {0}")]
    Network(String),
    /// Upload, download or decryption of a payload failed.
    #[error("media: {0}")]
    Media(String),
    /// Anything else the library reported.
    #[error("{0}")]
    Other(String),
}

/// Result alias for [`WaClient`] calls.
pub type BackendResult<T> = Result<T, BackendError>;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Metadata the library attaches to a live message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageSource {
    /// Stanza id.
    pub id: String,
    /// Raw chat identifier.
    pub chat: Jid,
    /// Raw sender identifier, device-qualified.
    pub sender: Jid,
    /// Sent by this account, possibly from another device.
    pub is_from_me: bool,
    /// Whether `chat` is a group.
    pub is_group: bool,
    /// Unix seconds.
    pub timestamp: i64,
    /// Display name the sender advertised.
    pub push_name: String,
}

/// A live incoming (or own-device) message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Addressing and timing.
    pub info: MessageSource,
    /// Decrypted content.
    pub message: proto::Message,
}

/// Receipt type as reported by the library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ReceiptType {
    Delivered,
    Sender,
    Retry,
    Read,
    ReadSelf,
    Played,
    PlayedSelf,
    Inactive,
    ServerError,
    Other(String),
}

/// Delivery or read acknowledgement for one or more messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Chat the messages belong to.
    pub chat: Jid,
    /// Who sent the receipt.
    pub sender: Jid,
    /// Acknowledged stanza ids.
    pub message_ids: Vec<String>,
    /// Unix seconds.
    pub timestamp: i64,
    /// What is being acknowledged.
    pub receipt_type: ReceiptType,
}

/// App-state patch collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PatchName {
    CriticalBlock,
    CriticalUnblockLow,
    RegularHigh,
    Regular,
    RegularLow,
}

impl PatchName {
    /// Collection name as used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CriticalBlock => "critical_block",
            Self::CriticalUnblockLow => "critical_unblock_low",
            Self::RegularHigh => "regular_high",
            Self::Regular => "regular",
            Self::RegularLow => "regular_low",
        }
    }
}

/// Everything the library's event bus can deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum WaEvent {
    /// A live message.
    Message(Box<MessageEvent>),
    /// A delivery or read receipt.
    Receipt(Receipt),
    /// An app-state collection finished syncing.
    AppStateSyncComplete {
        /// The collection.
        name: PatchName,
    },
    /// A batch of archived conversations.
    HistorySync(Box<proto::HistorySync>),
    /// The session is online.
    Connected,
    /// The phone unlinked this device.
    LoggedOut,
    /// Any variant the adapter does not handle, by name.
    Other(String),
}

impl WaEvent {
    /// Short variant name for logs.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Message(_) => "Message",
            Self::Receipt(_) => "Receipt",
            Self::AppStateSyncComplete { .. } => "AppStateSyncComplete",
            Self::HistorySync(_) => "HistorySync",
            Self::Connected => "Connected",
            Self::LoggedOut => "LoggedOut",
            Self::Other(name) => name,
        }
    }
}

/// Event subscriber. Invoked on library-owned threads.
pub type EventHandler = Arc<dyn Fn(WaEvent) + Send + Sync>;

/// An item on the QR pairing channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrItem {
    /// A code to render; codes rotate until one is scanned.
    Code(String),
    /// The phone accepted a code; the channel closes after this.
    Success,
    /// No code was scanned in time.
    Timeout,
    /// Pairing was rejected.
    Error(String),
}

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResponse {
    /// Message id assigned by the library.
    pub id: String,
    /// Server timestamp, Unix seconds.
    pub timestamp: i64,
}

/// Coordinates of an uploaded payload, ready to be put in a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadResponse {
    /// Full download URL.
    pub url: String,
    /// Path on the media servers.
    pub direct_path: String,
    /// Key the payload was encrypted with.
    pub media_key: Vec<u8>,
    /// SHA-256 of the encrypted payload.
    pub file_enc_sha256: Vec<u8>,
    /// SHA-256 of the plaintext payload.
    pub file_sha256: Vec<u8>,
    /// Plaintext size in bytes.
    pub file_length: u64,
}

/// Coordinates for fetching and decrypting a media payload.
#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest<'a> {
    /// Path on the media servers.
    pub direct_path: &'a str,
    /// SHA-256 of the encrypted payload.
    pub enc_sha256: &'a [u8],
    /// SHA-256 of the plaintext payload.
    pub sha256: &'a [u8],
    /// Encryption key.
    pub media_key: &'a [u8],
    /// Plaintext size in bytes, `-1` when unknown.
    pub size: i64,
    /// Key-derivation domain.
    pub media_type: MediaType,
    /// Media server routing hint derived from the type.
    pub mms_type: &'a str,
}

/// Stored contact details.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactInfo {
    /// Whether the store has a record at all.
    pub found: bool,
    /// Given name from the phone's address book.
    pub first_name: String,
    /// Full name from the phone's address book.
    pub full_name: String,
    /// Name the contact advertises.
    pub push_name: String,
    /// Verified business name.
    pub business_name: String,
}

/// A group this account belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    /// Group identifier.
    pub jid: Jid,
    /// Subject.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Client traits
// ---------------------------------------------------------------------------

/// A protocol client bound to one device of the session store.
#[async_trait]
pub trait WaClient: Send + Sync {
    /// Own full identifier, `None` until paired.
    fn own_id(&self) -> Option<Jid>;

    /// Open the QR pairing channel. Must be called before [`Self::connect`].
    async fn qr_channel(&self) -> BackendResult<mpsc::Receiver<QrItem>>;

    /// Bring the transport up. Returns once the socket is ready.
    async fn connect(&self) -> BackendResult<()>;

    /// Tear the transport down.
    fn disconnect(&self);

    /// Subscribe to the event bus. Handlers are never removed.
    fn add_event_handler(&self, handler: EventHandler);

    /// Request a code for entering on the phone; returns the code.
    async fn pair_phone(&self, phone: &str, config: &PairingConfig) -> BackendResult<String>;

    /// Encrypt and send one message.
    async fn send_message(&self, to: &Jid, message: proto::Message)
    -> BackendResult<SendResponse>;

    /// Encrypt and upload a payload.
    async fn upload(&self, data: Vec<u8>, media_type: MediaType) -> BackendResult<UploadResponse>;

    /// Fetch and decrypt a payload by direct path.
    async fn download_media_with_path(
        &self,
        request: DownloadRequest<'_>,
    ) -> BackendResult<Vec<u8>>;

    /// Primary-number identifier for an alias, when the mapping is known.
    fn pn_for_lid(&self, lid: &Jid) -> Option<Jid>;

    /// Alias for a primary-number identifier, when the mapping is known.
    fn lid_for_pn(&self, pn: &Jid) -> Option<Jid>;

    /// Every contact the store knows about.
    async fn contacts(&self) -> BackendResult<Vec<(Jid, ContactInfo)>>;

    /// Groups this account participates in.
    async fn joined_groups(&self) -> BackendResult<Vec<GroupInfo>>;
}

/// Opens the session store and builds a client for its first device.
pub trait Connector: Send + Sync {
    /// # Errors
    ///
    /// Fails when the store cannot be opened or holds no usable device.
    fn open(&self, store: &StoreConfig) -> BackendResult<Arc<dyn WaClient>>;
}

static CONNECTOR: RwLock<Option<Arc<dyn Connector>>> = RwLock::new(None);

/// Install the connector used by [`crate::client::wa_new_client`].
/// Replaces any previously installed connector.
pub fn install_connector(connector: Arc<dyn Connector>) {
    let mut slot = CONNECTOR.write().unwrap_or_else(std::sync::PoisonError::into_inner);
    *slot = Some(connector);
}

/// The installed connector, else the built-in one.
pub(crate) fn connector() -> Option<Arc<dyn Connector>> {
    CONNECTOR
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
        .or_else(default_connector)
}

#[cfg(feature = "native")]
fn default_connector() -> Option<Arc<dyn Connector>> {
    Some(Arc::new(crate::native::NativeConnector))
}

#[cfg(not(feature = "native"))]
const fn default_connector() -> Option<Arc<dyn Connector>> {
    None
}
