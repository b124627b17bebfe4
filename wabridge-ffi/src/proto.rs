//! Subset of the protocol's end-to-end message and history-sync schemas.
//!
//! Field tags follow the wire schema so a backend can decode raw payloads
//! straight into these types. Only the fields the adapter reads or writes
//! are declared; unknown fields are skipped by `prost`.

use prost::Message as ProstMessage;

/// Reply/quote context attached to most message variants.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct ContextInfo {
    /// Stanza id of the quoted message.
    #[prost(string, optional, tag = "1")]
    pub stanza_id: Option<String>,
    /// Sender of the quoted message.
    #[prost(string, optional, tag = "2")]
    pub participant: Option<String>,
    /// Copy of the quoted message.
    #[prost(message, optional, boxed, tag = "3")]
    pub quoted_message: Option<Box<Message>>,
    /// Chat of the quoted message, when it differs from the current one.
    #[prost(string, optional, tag = "4")]
    pub remote_jid: Option<String>,
}

/// A plain conversation message, or the container of one media variant.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct Message {
    /// Plain text body.
    #[prost(string, optional, tag = "1")]
    pub conversation: Option<String>,
    /// Image variant.
    #[prost(message, optional, tag = "3")]
    pub image_message: Option<ImageMessage>,
    /// Text with reply context or link preview.
    #[prost(message, optional, tag = "6")]
    pub extended_text_message: Option<ExtendedTextMessage>,
    /// Document variant.
    #[prost(message, optional, tag = "7")]
    pub document_message: Option<DocumentMessage>,
    /// Audio or voice note variant.
    #[prost(message, optional, tag = "8")]
    pub audio_message: Option<AudioMessage>,
    /// Video variant.
    #[prost(message, optional, tag = "9")]
    pub video_message: Option<VideoMessage>,
    /// Sticker variant.
    #[prost(message, optional, tag = "26")]
    pub sticker_message: Option<StickerMessage>,
}

/// Text with formatting, link preview or reply context.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct ExtendedTextMessage {
    /// Text body.
    #[prost(string, optional, tag = "1")]
    pub text: Option<String>,
    /// Reply context.
    #[prost(message, optional, tag = "17")]
    pub context_info: Option<ContextInfo>,
}

/// Image payload coordinates.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct ImageMessage {
    /// Legacy download URL.
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    /// MIME type of the payload.
    #[prost(string, optional, tag = "2")]
    pub mimetype: Option<String>,
    /// Caption, possibly empty.
    #[prost(string, optional, tag = "3")]
    pub caption: Option<String>,
    /// SHA-256 of the plaintext payload.
    #[prost(bytes = "vec", optional, tag = "4")]
    pub file_sha256: Option<Vec<u8>>,
    /// Plaintext size in bytes.
    #[prost(uint64, optional, tag = "5")]
    pub file_length: Option<u64>,
    /// Height in pixels.
    #[prost(uint32, optional, tag = "6")]
    pub height: Option<u32>,
    /// Width in pixels.
    #[prost(uint32, optional, tag = "7")]
    pub width: Option<u32>,
    /// Key the payload is encrypted with.
    #[prost(bytes = "vec", optional, tag = "8")]
    pub media_key: Option<Vec<u8>>,
    /// SHA-256 of the encrypted payload.
    #[prost(bytes = "vec", optional, tag = "9")]
    pub file_enc_sha256: Option<Vec<u8>>,
    /// Path on the media servers.
    #[prost(string, optional, tag = "11")]
    pub direct_path: Option<String>,
    /// Reply context.
    #[prost(message, optional, tag = "17")]
    pub context_info: Option<ContextInfo>,
}

/// Document payload coordinates.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct DocumentMessage {
    /// Legacy download URL.
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    /// MIME type of the payload.
    #[prost(string, optional, tag = "2")]
    pub mimetype: Option<String>,
    /// Document title.
    #[prost(string, optional, tag = "3")]
    pub title: Option<String>,
    /// SHA-256 of the plaintext payload.
    #[prost(bytes = "vec", optional, tag = "4")]
    pub file_sha256: Option<Vec<u8>>,
    /// Plaintext size in bytes.
    #[prost(uint64, optional, tag = "5")]
    pub file_length: Option<u64>,
    /// Number of pages.
    #[prost(uint32, optional, tag = "6")]
    pub page_count: Option<u32>,
    /// Key the payload is encrypted with.
    #[prost(bytes = "vec", optional, tag = "7")]
    pub media_key: Option<Vec<u8>>,
    /// Original file name.
    #[prost(string, optional, tag = "8")]
    pub file_name: Option<String>,
    /// SHA-256 of the encrypted payload.
    #[prost(bytes = "vec", optional, tag = "9")]
    pub file_enc_sha256: Option<Vec<u8>>,
    /// Path on the media servers.
    #[prost(string, optional, tag = "10")]
    pub direct_path: Option<String>,
    /// Reply context.
    #[prost(message, optional, tag = "17")]
    pub context_info: Option<ContextInfo>,
    /// Caption, possibly empty.
    #[prost(string, optional, tag = "20")]
    pub caption: Option<String>,
}

/// Audio payload coordinates.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct AudioMessage {
    /// Legacy download URL.
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    /// MIME type of the payload.
    #[prost(string, optional, tag = "2")]
    pub mimetype: Option<String>,
    /// SHA-256 of the plaintext payload.
    #[prost(bytes = "vec", optional, tag = "3")]
    pub file_sha256: Option<Vec<u8>>,
    /// Plaintext size in bytes.
    #[prost(uint64, optional, tag = "4")]
    pub file_length: Option<u64>,
    /// Duration.
    #[prost(uint32, optional, tag = "5")]
    pub seconds: Option<u32>,
    /// Push-to-talk (voice note).
    #[prost(bool, optional, tag = "6")]
    pub ptt: Option<bool>,
    /// Key the payload is encrypted with.
    #[prost(bytes = "vec", optional, tag = "7")]
    pub media_key: Option<Vec<u8>>,
    /// SHA-256 of the encrypted payload.
    #[prost(bytes = "vec", optional, tag = "8")]
    pub file_enc_sha256: Option<Vec<u8>>,
    /// Path on the media servers.
    #[prost(string, optional, tag = "9")]
    pub direct_path: Option<String>,
    /// Reply context.
    #[prost(message, optional, tag = "17")]
    pub context_info: Option<ContextInfo>,
}

/// Video payload coordinates.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct VideoMessage {
    /// Legacy download URL.
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    /// MIME type of the payload.
    #[prost(string, optional, tag = "2")]
    pub mimetype: Option<String>,
    /// SHA-256 of the plaintext payload.
    #[prost(bytes = "vec", optional, tag = "3")]
    pub file_sha256: Option<Vec<u8>>,
    /// Plaintext size in bytes.
    #[prost(uint64, optional, tag = "4")]
    pub file_length: Option<u64>,
    /// Duration.
    #[prost(uint32, optional, tag = "5")]
    pub seconds: Option<u32>,
    /// Key the payload is encrypted with.
    #[prost(bytes = "vec", optional, tag = "6")]
    pub media_key: Option<Vec<u8>>,
    /// Caption, possibly empty.
    #[prost(string, optional, tag = "7")]
    pub caption: Option<String>,
    /// Play as a looping animation.
    #[prost(bool, optional, tag = "8")]
    pub gif_playback: Option<bool>,
    /// Height in pixels.
    #[prost(uint32, optional, tag = "9")]
    pub height: Option<u32>,
    /// Width in pixels.
    #[prost(uint32, optional, tag = "10")]
    pub width: Option<u32>,
    /// SHA-256 of the encrypted payload.
    #[prost(bytes = "vec", optional, tag = "11")]
    pub file_enc_sha256: Option<Vec<u8>>,
    /// Path on the media servers.
    #[prost(string, optional, tag = "13")]
    pub direct_path: Option<String>,
    /// Reply context.
    #[prost(message, optional, tag = "17")]
    pub context_info: Option<ContextInfo>,
}

/// Sticker payload coordinates.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct StickerMessage {
    /// Legacy download URL.
    #[prost(string, optional, tag = "1")]
    pub url: Option<String>,
    /// SHA-256 of the plaintext payload.
    #[prost(bytes = "vec", optional, tag = "2")]
    pub file_sha256: Option<Vec<u8>>,
    /// SHA-256 of the encrypted payload.
    #[prost(bytes = "vec", optional, tag = "3")]
    pub file_enc_sha256: Option<Vec<u8>>,
    /// Key the payload is encrypted with.
    #[prost(bytes = "vec", optional, tag = "4")]
    pub media_key: Option<Vec<u8>>,
    /// MIME type of the payload.
    #[prost(string, optional, tag = "5")]
    pub mimetype: Option<String>,
    /// Height in pixels.
    #[prost(uint32, optional, tag = "6")]
    pub height: Option<u32>,
    /// Width in pixels.
    #[prost(uint32, optional, tag = "7")]
    pub width: Option<u32>,
    /// Path on the media servers.
    #[prost(string, optional, tag = "8")]
    pub direct_path: Option<String>,
    /// Plaintext size in bytes.
    #[prost(uint64, optional, tag = "9")]
    pub file_length: Option<u64>,
    /// Reply context.
    #[prost(message, optional, tag = "17")]
    pub context_info: Option<ContextInfo>,
}

// ---------------------------------------------------------------------------
// History sync
// ---------------------------------------------------------------------------

/// Kind of a history-sync batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, prost::Enumeration)]
#[repr(i32)]
#[allow(missing_docs)]
pub enum HistorySyncType {
    InitialBootstrap = 0,
    InitialStatusV3 = 1,
    Full = 2,
    Recent = 3,
    PushName = 4,
    NonBlockingData = 5,
    OnDemand = 6,
    NoHistory = 7,
    MessageAccessStatus = 8,
}

/// One server-initiated batch of archived conversations.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct HistorySync {
    /// Batch kind, see [`HistorySyncType`].
    #[prost(enumeration = "HistorySyncType", optional, tag = "1")]
    pub sync_type: Option<i32>,
    /// Archived chats in this batch.
    #[prost(message, repeated, tag = "2")]
    pub conversations: Vec<Conversation>,
    /// Position of this chunk in a multi-chunk transfer.
    #[prost(uint32, optional, tag = "5")]
    pub chunk_order: Option<u32>,
    /// Overall sync progress, 0-100.
    #[prost(uint32, optional, tag = "6")]
    pub progress: Option<u32>,
    /// Display names the phone knows for contacts.
    #[prost(message, repeated, tag = "7")]
    pub pushnames: Vec<Pushname>,
}

/// A contact's advertised display name.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct Pushname {
    /// Contact identifier, full string form.
    #[prost(string, optional, tag = "1")]
    pub id: Option<String>,
    /// The name itself.
    #[prost(string, optional, tag = "2")]
    pub pushname: Option<String>,
}

/// An archived chat.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct Conversation {
    /// Chat identifier, full string form.
    #[prost(string, tag = "1")]
    pub id: String,
    /// Archived messages, in the order the server presents them.
    #[prost(message, repeated, tag = "2")]
    pub messages: Vec<HistorySyncMsg>,
    /// Display name of the chat, when known.
    #[prost(string, optional, tag = "13")]
    pub name: Option<String>,
}

/// Wrapper around one archived message.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct HistorySyncMsg {
    /// The archived message.
    #[prost(message, optional, tag = "1")]
    pub message: Option<WebMessageInfo>,
    /// Server ordering key.
    #[prost(uint64, optional, tag = "2")]
    pub msg_order_id: Option<u64>,
}

/// Archived message record.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct WebMessageInfo {
    /// Addressing of the message.
    #[prost(message, optional, tag = "1")]
    pub key: Option<MessageKey>,
    /// Message content.
    #[prost(message, optional, tag = "2")]
    pub message: Option<Message>,
    /// Unix seconds.
    #[prost(uint64, optional, tag = "3")]
    pub message_timestamp: Option<u64>,
    /// Sender within a group, when the key omits it.
    #[prost(string, optional, tag = "5")]
    pub participant: Option<String>,
    /// Display name the sender advertised.
    #[prost(string, optional, tag = "19")]
    pub push_name: Option<String>,
}

/// Addressing of a stored message.
#[derive(Clone, PartialEq, ProstMessage)]
pub struct MessageKey {
    /// Chat identifier.
    #[prost(string, optional, tag = "1")]
    pub remote_jid: Option<String>,
    /// Whether the local account sent the message.
    #[prost(bool, optional, tag = "2")]
    pub from_me: Option<bool>,
    /// Stanza id.
    #[prost(string, optional, tag = "3")]
    pub id: Option<String>,
    /// Sender within a group.
    #[prost(string, optional, tag = "4")]
    pub participant: Option<String>,
}
