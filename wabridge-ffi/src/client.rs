//! ABI facade: client lifecycle, callbacks, sending, contacts, downloads.

use std::ffi::{c_char, c_void};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{error, info, warn};

use crate::backend::{ContactInfo, QrItem, UploadResponse, WaClient, connector};
use crate::config::{FileKind, PairingConfig, StoreConfig};
use crate::descriptor::MediaType;
use crate::download::{FileStatus, download};
use crate::error::{Error, OrFatal, Result};
use crate::ffi::{
    CContact, ContactList, EventCallback, LogHandler, MessageHandlerCallback, MessageType,
    QrCallback, block_on, c_str_to_option, c_str_to_string, free_c_string_array, string_vec_to_c,
    to_c_string, wa_free_string,
};
use crate::host::{self, HostSink};
use crate::jid::Jid;
use crate::normalize::display_name;
use crate::project::{MessageInfo, project};
use crate::proto;
use crate::pump::{Pump, Sink};

static CLIENT: RwLock<Option<Arc<dyn WaClient>>> = RwLock::new(None);

fn set_client(client: Option<Arc<dyn WaClient>>) {
    *CLIENT.write().unwrap_or_else(std::sync::PoisonError::into_inner) = client;
}

fn try_client() -> Option<Arc<dyn WaClient>> {
    CLIENT
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
}

fn client() -> Arc<dyn WaClient> {
    try_client().ok_or(Error::NoClient).or_fatal("client")
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Open (or create) the session store at `db_path` and build the process-wide
/// client for its first device. Aborts if the store cannot be opened.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_new_client(db_path: *const c_char) {
    let db_path = unsafe { c_str_to_string(db_path, "db_path") }.or_fatal("wa_new_client");
    let store = StoreConfig::new(db_path);
    store.ensure_parent().or_fatal("creating session store directory");
    let connector = connector().ok_or(Error::NoConnector).or_fatal("wa_new_client");
    let client = connector.open(&store).or_fatal("opening session store");
    info!(store = %store.uri(), paired = client.own_id().is_some(), "client created");
    set_client(Some(client));
}

/// Register the log sink. Installs the global log subscriber if
/// `wa_init_logger` has not already done so.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_set_log_handler(cb: Option<LogHandler>, user_data: *mut c_void) {
    host::set_log_handler(cb, user_data);
    crate::log::install(None);
}

/// Register the non-message event callback. Pass `None` to unregister.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_set_event_handler(cb: Option<EventCallback>, user_data: *mut c_void) {
    host::set_event_handler(cb, user_data);
}

/// Register the message callback. Pass `None` to unregister.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_set_message_handler(
    cb: Option<MessageHandlerCallback>,
    user_data: *mut c_void,
) {
    host::set_message_handler(cb, user_data);
}

/// Connect, pairing by QR code first if the store holds no session.
///
/// Blocks until pairing completes or the existing session is resumed.
/// Returns `true` when an existing session was resumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_connect(qr_cb: Option<QrCallback>, user_data: *mut c_void) -> bool {
    let client = client();
    let user_data = user_data as usize;
    let on_code = move |code: &str| match (qr_cb, std::ffi::CString::new(code)) {
        (Some(cb), Ok(code)) => unsafe { cb(code.as_ptr(), user_data as *mut c_void) },
        (None, _) => warn!("QR code received but no QR callback given"),
        (_, Err(e)) => warn!(error = %e, "unusable QR code"),
    };
    block_on(connect(&client, HostSink, on_code)).or_fatal("wa_connect")
}

pub(crate) async fn connect<S: Sink + 'static>(
    client: &Arc<dyn WaClient>,
    sink: S,
    on_code: impl Fn(&str),
) -> Result<bool> {
    let resumed = if client.own_id().is_some() {
        client.connect().await?;
        true
    } else {
        let mut qr = client.qr_channel().await?;
        client.connect().await?;
        while let Some(item) = qr.recv().await {
            match item {
                QrItem::Code(code) => on_code(&code),
                QrItem::Success => info!("pairing succeeded"),
                QrItem::Timeout => warn!("pairing timed out"),
                QrItem::Error(e) => error!(error = %e, "pairing failed"),
            }
        }
        false
    };
    Pump::register(client, sink);
    info!(resumed, "connected");
    Ok(resumed)
}

/// Request a code for linking by phone number. Returns a string the caller
/// frees with [`wa_free_string`], or null on failure.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_pair_phone(phone: *const c_char) -> *mut c_char {
    let result = unsafe { c_str_to_string(phone, "phone") }.and_then(|phone| {
        let client = try_client().ok_or(Error::NoClient)?;
        Ok(block_on(client.pair_phone(&phone, &PairingConfig::default()))?)
    });
    match result {
        Ok(code) => to_c_string(&code),
        Err(e) => {
            error!(error = %e, "phone pairing failed");
            std::ptr::null_mut()
        }
    }
}

/// Tear down the transport. Callbacks already in flight may still complete.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_disconnect() {
    match try_client() {
        Some(client) => {
            client.disconnect();
            info!("disconnected");
        }
        None => warn!("disconnect without a client"),
    }
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outgoing {
    Text(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Quote {
    pub id: String,
    pub sender: Option<Jid>,
}

impl Quote {
    fn context(&self) -> proto::ContextInfo {
        proto::ContextInfo {
            stanza_id: Some(self.id.clone()),
            participant: self.sender.as_ref().map(Jid::canonical),
            ..Default::default()
        }
    }
}

/// Send a text (`message_type` 0) or a local file (`message_type` 1) to `jid`.
///
/// `quote_id` and `quote_sender` may be null. The sent message is echoed to
/// the message handler with `is_sync = false`. Aborts on malformed input or
/// when the library fails to send.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_send_message(
    jid: *const c_char,
    message_type: u8,
    content: *const c_char,
    quote_id: *const c_char,
    quote_sender: *const c_char,
) {
    let to: Jid = unsafe { c_str_to_string(jid, "jid") }
        .and_then(|s| Ok(s.parse::<Jid>()?))
        .or_fatal("wa_send_message: destination");
    let content = unsafe { c_str_to_string(content, "content") }.or_fatal("wa_send_message");
    let outgoing = match MessageType::from_u8(message_type) {
        Some(MessageType::Text) => Outgoing::Text(content),
        Some(MessageType::File) => Outgoing::File(PathBuf::from(content)),
        None => crate::error::fatal(
            "wa_send_message",
            &Error::UnknownMessageType(message_type),
        ),
    };
    let quote_id = unsafe { c_str_to_option(quote_id, "quote_id") }.or_fatal("wa_send_message");
    let quote_sender = unsafe { c_str_to_option(quote_sender, "quote_sender") }
        .and_then(|s| Ok(s.map(|s| s.parse::<Jid>()).transpose()?))
        .or_fatal("wa_send_message: quote sender");
    let quote = quote_id.map(|id| Quote {
        id,
        sender: quote_sender,
    });

    let client = client();
    block_on(send(client.as_ref(), &HostSink, &to, outgoing, quote.as_ref()))
        .or_fatal("wa_send_message");
}

pub(crate) async fn send<S: Sink>(
    client: &dyn WaClient,
    sink: &S,
    to: &Jid,
    outgoing: Outgoing,
    quote: Option<&Quote>,
) -> Result<()> {
    let own = client
        .own_id()
        .ok_or(crate::backend::BackendError::NotLoggedIn)?
        .to_non_ad();
    let context = quote.map(Quote::context);

    let message = match outgoing {
        Outgoing::Text(text) => text_message(text, context),
        Outgoing::File(path) => {
            let data = tokio::fs::read(&path).await?;
            let kind = FileKind::for_path(&path);
            let upload = client.upload(data, media_type_for(kind)).await?;
            file_message(kind, &path, upload, context)
        }
    };

    let resp = client.send_message(to, message.clone()).await?;
    info!(id = %resp.id, to = %to.canonical(), "message sent");

    let info = MessageInfo {
        id: resp.id,
        chat: to.to_non_ad(),
        sender: own,
        timestamp: resp.timestamp,
        is_from_me: true,
        quote_id: None,
    };
    for msg in project(&info, &message) {
        sink.message(msg, false);
    }
    Ok(())
}

fn text_message(text: String, context: Option<proto::ContextInfo>) -> proto::Message {
    match context {
        Some(ctx) => proto::Message {
            extended_text_message: Some(proto::ExtendedTextMessage {
                text: Some(text),
                context_info: Some(ctx),
            }),
            ..Default::default()
        },
        None => proto::Message {
            conversation: Some(text),
            ..Default::default()
        },
    }
}

const fn media_type_for(kind: FileKind) -> MediaType {
    match kind {
        FileKind::Image | FileKind::Sticker => MediaType::Image,
        FileKind::Video => MediaType::Video,
        FileKind::Audio => MediaType::Audio,
        FileKind::Document => MediaType::Document,
    }
}

fn file_message(
    kind: FileKind,
    path: &Path,
    up: UploadResponse,
    context_info: Option<proto::ContextInfo>,
) -> proto::Message {
    let mimetype = Some(
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_owned(),
    );
    let UploadResponse {
        url,
        direct_path,
        media_key,
        file_enc_sha256,
        file_sha256,
        file_length,
    } = up;
    let (url, direct_path, media_key) = (Some(url), Some(direct_path), Some(media_key));
    let (file_enc_sha256, file_sha256, file_length) =
        (Some(file_enc_sha256), Some(file_sha256), Some(file_length));

    match kind {
        FileKind::Image | FileKind::Sticker => proto::Message {
            image_message: Some(proto::ImageMessage {
                url,
                mimetype,
                file_sha256,
                file_length,
                media_key,
                file_enc_sha256,
                direct_path,
                context_info,
                ..Default::default()
            }),
            ..Default::default()
        },
        FileKind::Video => proto::Message {
            video_message: Some(proto::VideoMessage {
                url,
                mimetype,
                file_sha256,
                file_length,
                media_key,
                file_enc_sha256,
                direct_path,
                context_info,
                ..Default::default()
            }),
            ..Default::default()
        },
        FileKind::Audio => proto::Message {
            audio_message: Some(proto::AudioMessage {
                url,
                mimetype,
                file_sha256,
                file_length,
                media_key,
                file_enc_sha256,
                direct_path,
                context_info,
                ..Default::default()
            }),
            ..Default::default()
        },
        FileKind::Document => proto::Message {
            document_message: Some(proto::DocumentMessage {
                url,
                mimetype,
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned()),
                file_sha256,
                file_length,
                media_key,
                file_enc_sha256,
                direct_path,
                context_info,
                ..Default::default()
            }),
            ..Default::default()
        },
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// Enumerate named contacts (plus an alias-keyed copy of each primary-number
/// contact) and joined groups. Free the result with [`wa_free_contacts`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_get_contacts() -> ContactList {
    let client = client();
    match block_on(contacts(client.as_ref())) {
        Ok(entries) => contact_list(entries),
        Err(e) => {
            error!(error = %e, "listing contacts failed");
            contact_list(Vec::new())
        }
    }
}

pub(crate) async fn contacts(client: &dyn WaClient) -> Result<Vec<(Jid, ContactInfo)>> {
    let mut out = Vec::new();
    for (jid, contact) in client.contacts().await? {
        if display_name(&contact).is_empty() {
            continue;
        }
        let alias = (!jid.is_hidden_user())
            .then(|| client.lid_for_pn(&jid))
            .flatten();
        if let Some(alias) = alias {
            out.push((alias, contact.clone()));
        }
        out.push((jid, contact));
    }
    for group in client.joined_groups().await? {
        out.push((
            group.jid,
            ContactInfo {
                found: true,
                full_name: group.name,
                ..Default::default()
            },
        ));
    }
    Ok(out)
}

fn contact_list(entries: Vec<(Jid, ContactInfo)>) -> ContactList {
    let (jids, contacts): (Vec<String>, Vec<CContact>) = entries
        .into_iter()
        .map(|(jid, c)| {
            (
                jid.canonical(),
                CContact {
                    found: c.found,
                    first_name: to_c_string(&c.first_name),
                    full_name: to_c_string(&c.full_name),
                    push_name: to_c_string(&c.push_name),
                    business_name: to_c_string(&c.business_name),
                },
            )
        })
        .unzip();
    let size = u32::try_from(jids.len()).or_fatal("contact count");
    let (jids, _) = string_vec_to_c(&jids);
    let contacts = Box::into_raw(contacts.into_boxed_slice()).cast::<CContact>();
    ContactList {
        jids,
        contacts,
        size,
    }
}

/// Free a list returned by [`wa_get_contacts`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_free_contacts(list: ContactList) {
    let len = list.size as usize;
    unsafe { free_c_string_array(list.jids, len) };
    if list.contacts.is_null() {
        return;
    }
    let contacts =
        unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(list.contacts, len)) };
    for c in contacts.iter() {
        unsafe {
            wa_free_string(c.first_name);
            wa_free_string(c.full_name);
            wa_free_string(c.push_name);
            wa_free_string(c.business_name);
        }
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// Download the payload described by `file_id` under `base_path`.
/// Returns 0 when the file is present afterwards, 1 on any failure.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_download_file(file_id: *const c_char, base_path: *const c_char) -> u8 {
    let args = unsafe {
        c_str_to_string(file_id, "file_id")
            .and_then(|id| Ok((id, c_str_to_string(base_path, "base_path")?)))
    };
    let status = match (args, try_client()) {
        (Ok((file_id, base)), Some(client)) => {
            block_on(download(client.as_ref(), &file_id, Path::new(&base)))
        }
        (Err(e), _) => {
            warn!(error = %e, "bad download arguments");
            FileStatus::Failed
        }
        (_, None) => {
            warn!(error = %Error::NoClient, "download without a client");
            FileStatus::Failed
        }
    };
    status as u8
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};
    use std::sync::Mutex;

    use super::*;
    use crate::backend::install_connector;
    use crate::descriptor::MediaDescriptor;
    use crate::ffi::{CFileMessage, CMessage, CTextMessage, wa_free_message};
    use crate::project::{MessageContent, ProjectedMessage};
    use crate::pump::BridgeEvent;
    use crate::testing::{MemoryClient, MemoryConnector, SEND_TIMESTAMP};

    /// Serializes tests that touch the process-wide client and callbacks.
    static FACADE: Mutex<()> = Mutex::new(());

    fn jid(s: &str) -> Jid {
        s.parse().unwrap()
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(ProjectedMessage, bool)>>);

    impl Sink for Recorder {
        fn message(&self, message: ProjectedMessage, is_sync: bool) {
            self.0.lock().unwrap().push((message, is_sync));
        }

        fn event(&self, _event: BridgeEvent) {}
    }

    fn paired() -> Arc<MemoryClient> {
        let client = Arc::new(MemoryClient::new());
        client.set_own_id(Some(jid("10000:5@s.whatsapp.net")));
        client
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connect_resumes_existing_session() {
        let mem = paired();
        let client: Arc<dyn WaClient> = mem.clone();
        let codes = Mutex::new(Vec::new());

        let resumed = connect(&client, Recorder::default(), |c| {
            codes.lock().unwrap().push(c.to_owned());
        })
        .await
        .unwrap();

        assert!(resumed);
        assert!(codes.lock().unwrap().is_empty());
        assert_eq!(mem.connects(), 1);
        assert_eq!(mem.handler_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connect_forwards_qr_codes_then_registers() {
        let mem = Arc::new(MemoryClient::new());
        mem.script_qr(&["code-1", "code-2"], jid("10000:5@s.whatsapp.net"));
        let client: Arc<dyn WaClient> = mem.clone();
        let codes = Mutex::new(Vec::new());

        let resumed = connect(&client, Recorder::default(), |c| {
            codes.lock().unwrap().push(c.to_owned());
        })
        .await
        .unwrap();

        assert!(!resumed);
        assert_eq!(*codes.lock().unwrap(), ["code-1", "code-2"]);
        assert_eq!(mem.handler_count(), 1);
        assert!(mem.own_id().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_text_echoes_once() {
        let mem = paired();
        let client: Arc<dyn WaClient> = mem.clone();
        connect(&client, Recorder::default(), |_| {}).await.unwrap();
        let sink = Recorder::default();

        send(
            mem.as_ref(),
            &sink,
            &jid("67890@s.whatsapp.net"),
            Outgoing::Text("hello".into()),
            None,
        )
        .await
        .unwrap();

        let sent = mem.sends();
        assert_eq!(sent[0].message.conversation.as_deref(), Some("hello"));
        let echoed = sink.0.lock().unwrap();
        assert_eq!(echoed.len(), 1);
        let (msg, is_sync) = &echoed[0];
        assert!(!is_sync);
        assert!(msg.info.is_from_me);
        assert_eq!(msg.info.id, "MEM0001");
        assert_eq!(msg.info.timestamp, SEND_TIMESTAMP + 1);
        assert_eq!(msg.info.sender.canonical(), "10000@s.whatsapp.net");
        assert_eq!(msg.info.chat.canonical(), "67890@s.whatsapp.net");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn quoted_text_becomes_extended() {
        let mem = paired();
        let client: Arc<dyn WaClient> = mem.clone();
        connect(&client, Recorder::default(), |_| {}).await.unwrap();
        let sink = Recorder::default();
        let quote = Quote {
            id: "ORIG".into(),
            sender: Some(jid("67890:2@s.whatsapp.net")),
        };

        send(
            mem.as_ref(),
            &sink,
            &jid("67890@s.whatsapp.net"),
            Outgoing::Text("reply".into()),
            Some(&quote),
        )
        .await
        .unwrap();

        let sent = mem.sends();
        let ext = sent[0].message.extended_text_message.as_ref().unwrap();
        let ctx = ext.context_info.as_ref().unwrap();
        assert_eq!(ctx.stanza_id(), "ORIG");
        assert_eq!(ctx.participant(), "67890@s.whatsapp.net");
        assert_eq!(sink.0.lock().unwrap()[0].0.info.quote_id.as_deref(), Some("ORIG"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_file_uploads_and_echoes_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        let mem = paired();
        let client: Arc<dyn WaClient> = mem.clone();
        connect(&client, Recorder::default(), |_| {}).await.unwrap();
        let sink = Recorder::default();

        send(
            mem.as_ref(),
            &sink,
            &jid("67890@s.whatsapp.net"),
            Outgoing::File(path),
            None,
        )
        .await
        .unwrap();

        assert_eq!(mem.uploads()[0].0, MediaType::Document);
        let doc = mem.sends()[0].message.document_message.clone().unwrap();
        assert_eq!(doc.file_name(), "report.pdf");
        assert_eq!(doc.mimetype(), "application/pdf");

        let echoed = sink.0.lock().unwrap();
        let MessageContent::File(file) = &echoed[0].0.content else {
            panic!("expected file echo");
        };
        assert_eq!(file.kind, FileKind::Document);
        assert_eq!(file.path, "docs/MEM0001-report.pdf");
        let desc = MediaDescriptor::decode(&file.file_id).unwrap();
        assert_eq!(desc.direct_path, "/mem/document/0");
        assert_eq!(desc.size, 8);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_fails_when_not_connected() {
        let mem = paired();
        let err = send(
            mem.as_ref(),
            &Recorder::default(),
            &jid("67890@s.whatsapp.net"),
            Outgoing::Text("x".into()),
            None,
        )
        .await;
        assert!(err.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn contacts_with_aliases_and_groups() {
        let mem = paired();
        let named = ContactInfo {
            found: true,
            push_name: "al".into(),
            ..Default::default()
        };
        mem.add_contact(jid("67890@s.whatsapp.net"), named.clone());
        mem.add_contact(jid("11111@s.whatsapp.net"), ContactInfo::default());
        mem.set_lid_mapping(jid("67890@s.whatsapp.net"), jid("555@lid"));
        mem.add_group(jid("120363@g.us"), "Team");

        let list = contacts(mem.as_ref()).await.unwrap();

        let ids: Vec<_> = list.iter().map(|(j, _)| j.canonical()).collect();
        assert_eq!(ids, ["555@lid", "67890@s.whatsapp.net", "120363@g.us"]);
        assert_eq!(list[0].1, named);
        assert_eq!(list[2].1.full_name, "Team");
    }

    // ---- C surface ------------------------------------------------------

    #[derive(Default)]
    struct Host {
        messages: Mutex<Vec<(String, u8, bool)>>,
        codes: Mutex<Vec<String>>,
    }

    unsafe extern "C" fn on_message(msg: *mut CMessage, is_sync: bool, user_data: *mut c_void) {
        let host = unsafe { &*user_data.cast::<Host>() };
        let m = unsafe { &*msg };
        let id = unsafe { CStr::from_ptr(m.info.id) }.to_str().unwrap().to_owned();
        let body = match MessageType::from_u8(m.message_type).unwrap() {
            MessageType::Text => unsafe { (*m.message.cast::<CTextMessage>()).text },
            MessageType::File => unsafe { (*m.message.cast::<CFileMessage>()).path },
        };
        assert!(!body.is_null());
        host.messages.lock().unwrap().push((id, m.message_type, is_sync));
        unsafe { wa_free_message(msg) };
    }

    unsafe extern "C" fn on_qr(code: *const c_char, user_data: *mut c_void) {
        let host = unsafe { &*user_data.cast::<Host>() };
        let code = unsafe { CStr::from_ptr(code) }.to_str().unwrap().to_owned();
        host.codes.lock().unwrap().push(code);
    }

    fn install(mem: &Arc<MemoryClient>) -> Arc<MemoryConnector> {
        let connector = Arc::new(MemoryConnector::new(mem.clone()));
        install_connector(connector.clone());
        connector
    }

    #[test]
    fn facade_end_to_end() {
        let _guard = FACADE.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("store/session.db");
        let mem = Arc::new(MemoryClient::new());
        mem.script_qr(&["qr-A"], jid("10000:5@s.whatsapp.net"));
        let connector = install(&mem);
        let host = Host::default();
        let host_ptr = (&raw const host).cast_mut().cast::<c_void>();

        let db_c = CString::new(db.to_str().unwrap()).unwrap();
        unsafe {
            wa_new_client(db_c.as_ptr());
            wa_set_message_handler(Some(on_message), host_ptr);
            assert!(!wa_connect(Some(on_qr), host_ptr));
        }
        assert!(db.parent().unwrap().is_dir());
        assert_eq!(connector.opened()[0], format!("file:{}?_foreign_keys=on", db.display()));
        assert_eq!(*host.codes.lock().unwrap(), ["qr-A"]);

        let to = CString::new("67890@s.whatsapp.net").unwrap();
        let text = CString::new("hi").unwrap();
        unsafe {
            wa_send_message(
                to.as_ptr(),
                MessageType::Text as u8,
                text.as_ptr(),
                std::ptr::null(),
                std::ptr::null(),
            );
        }
        assert_eq!(
            *host.messages.lock().unwrap(),
            [("MEM0001".to_owned(), MessageType::Text as u8, false)]
        );

        let phone = CString::new("15551234567").unwrap();
        let code = unsafe { wa_pair_phone(phone.as_ptr()) };
        assert_eq!(unsafe { CStr::from_ptr(code) }.to_str().unwrap(), "ABCD-1234");
        unsafe { wa_free_string(code) };
        let bad = CString::new("not-a-number").unwrap();
        assert!(unsafe { wa_pair_phone(bad.as_ptr()) }.is_null());

        unsafe {
            wa_set_message_handler(None, std::ptr::null_mut());
            wa_disconnect();
        }
        assert!(!mem.is_connected());
    }

    #[test]
    fn facade_contacts_and_download() {
        let _guard = FACADE.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let mem = paired();
        mem.add_contact(
            jid("67890@s.whatsapp.net"),
            ContactInfo {
                found: true,
                full_name: "Alice Q".into(),
                ..Default::default()
            },
        );
        mem.put_media("/v/t62/blob", b"payload".to_vec());
        install(&mem);
        let db_c = CString::new(dir.path().join("s.db").to_str().unwrap()).unwrap();
        unsafe { wa_new_client(db_c.as_ptr()) };

        let list = unsafe { wa_get_contacts() };
        assert_eq!(list.size, 1);
        unsafe {
            let jid = CStr::from_ptr(*list.jids).to_str().unwrap();
            assert_eq!(jid, "67890@s.whatsapp.net");
            let c = &*list.contacts;
            assert!(c.found);
            assert_eq!(CStr::from_ptr(c.full_name).to_str().unwrap(), "Alice Q");
            wa_free_contacts(list);
        }

        let desc = MediaDescriptor {
            version: crate::descriptor::DESCRIPTOR_VERSION,
            direct_path: "/v/t62/blob".into(),
            target_path: "auds/X.ogg".into(),
            media_key: vec![1; 32],
            media_type: MediaType::Audio,
            size: 7,
            file_enc_sha256: vec![2; 32],
            file_sha256: vec![3; 32],
        };
        let file_id = CString::new(desc.encode()).unwrap();
        let base = CString::new(dir.path().join("media").to_str().unwrap()).unwrap();
        let status = unsafe { wa_download_file(file_id.as_ptr(), base.as_ptr()) };
        assert_eq!(status, FileStatus::Downloaded as u8);
        assert_eq!(
            std::fs::read(dir.path().join("media/auds/X.ogg")).unwrap(),
            b"payload"
        );

        let garbage = CString::new("not json").unwrap();
        let status = unsafe { wa_download_file(garbage.as_ptr(), base.as_ptr()) };
        assert_eq!(status, FileStatus::Failed as u8);
        assert_eq!(
            unsafe { wa_download_file(std::ptr::null(), base.as_ptr()) },
            FileStatus::Failed as u8
        );
    }

    #[test]
    fn empty_contact_list_frees_cleanly() {
        let list = contact_list(Vec::new());
        assert_eq!(list.size, 0);
        unsafe { wa_free_contacts(list) };
    }
}
