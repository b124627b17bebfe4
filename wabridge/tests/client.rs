//! End-to-end tests of the SDK over the adapter and an in-memory protocol client.

use std::sync::{Arc, Mutex, MutexGuard};

use wabridge::{Client, Contact, Event, FileKind, Jid, MessageContent, Quote, ReceiptKind};
use wabridge_ffi::backend::{
    ContactInfo, MessageEvent, MessageSource, Receipt, ReceiptType, WaEvent, install_connector,
};
use wabridge_ffi::proto;
use wabridge_ffi::testing::{MemoryClient, MemoryConnector};

/// The adapter holds one client per process.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn wa_jid(s: &str) -> wabridge_ffi::jid::Jid {
    s.parse().unwrap()
}

fn setup(mem: &Arc<MemoryClient>) -> (tempfile::TempDir, Client) {
    install_connector(Arc::new(MemoryConnector::new(mem.clone())));
    let dir = tempfile::tempdir().unwrap();
    let client = Client::new(dir.path().join("session.db")).unwrap();
    (dir, client)
}

#[test]
fn qr_pairing_then_send_echo() {
    let _guard = serial();
    let mem = Arc::new(MemoryClient::new());
    mem.script_qr(&["qr-1", "qr-2"], wa_jid("10000:9@s.whatsapp.net"));
    let (_dir, client) = setup(&mem);
    let messages = client.messages();

    let mut codes = Vec::new();
    let resumed = client.connect(|code| codes.push(code.to_owned()));

    assert!(!resumed);
    assert_eq!(codes, ["qr-1", "qr-2"]);

    let alice = Jid::from("67890@s.whatsapp.net");
    client
        .send_text(
            &alice,
            "see above",
            Some(Quote {
                id: "ORIG",
                sender: Some(&alice),
            }),
        )
        .unwrap();

    let (msg, is_sync) = messages.try_recv().unwrap();
    assert!(!is_sync);
    assert!(msg.info.is_from_me);
    assert_eq!(msg.info.chat, alice);
    assert_eq!(msg.info.sender, Jid::from("10000@s.whatsapp.net"));
    assert_eq!(msg.info.quote_id.as_deref(), Some("ORIG"));
    assert_eq!(msg.content, MessageContent::Text("see above".into()));
    assert!(messages.try_recv().is_err());

    client.disconnect();
}

#[test]
fn live_events_reach_handlers() {
    let _guard = serial();
    let mem = Arc::new(MemoryClient::new());
    mem.set_own_id(Some(wa_jid("10000:9@s.whatsapp.net")));
    let (dir, client) = setup(&mem);
    let messages = client.messages();
    let events = client.events();

    assert!(client.connect(|_| panic!("no QR expected for a stored session")));

    mem.emit(WaEvent::Receipt(Receipt {
        chat: wa_jid("67890@s.whatsapp.net"),
        sender: wa_jid("67890@s.whatsapp.net"),
        message_ids: vec!["A".into()],
        timestamp: 0,
        receipt_type: ReceiptType::ReadSelf,
    }));
    assert_eq!(
        events.try_recv().unwrap(),
        Event::Receipt {
            kind: ReceiptKind::ReadSelf,
            chat: Jid::from("67890@s.whatsapp.net"),
            message_ids: vec!["A".into()],
        }
    );

    mem.put_media("/v/t62/photo", b"jpeg bytes".to_vec());
    mem.emit(WaEvent::Message(Box::new(MessageEvent {
        info: MessageSource {
            id: "PIC1".into(),
            chat: wa_jid("67890@s.whatsapp.net"),
            sender: wa_jid("67890@s.whatsapp.net"),
            timestamp: 1_700_000_100,
            ..Default::default()
        },
        message: proto::Message {
            image_message: Some(proto::ImageMessage {
                mimetype: Some("image/jpeg".into()),
                caption: Some(String::new()),
                direct_path: Some("/v/t62/photo".into()),
                media_key: Some(vec![1; 32]),
                file_enc_sha256: Some(vec![2; 32]),
                file_sha256: Some(vec![3; 32]),
                file_length: Some(10),
                ..Default::default()
            }),
            ..Default::default()
        },
    })));

    let (msg, is_sync) = messages.try_recv().unwrap();
    assert!(!is_sync);
    let MessageContent::File(file) = msg.content else {
        panic!("expected a file message");
    };
    assert_eq!(file.kind, FileKind::Image);
    assert_eq!(file.path, "imgs/PIC1.jpg");
    assert_eq!(file.caption, None);

    let base = dir.path().join("media");
    client.download_file(&file.file_id, &base).unwrap();
    assert_eq!(std::fs::read(base.join(&file.path)).unwrap(), b"jpeg bytes");
    // Second call is served from disk.
    client.download_file(&file.file_id, &base).unwrap();
    assert_eq!(mem.download_requests().len(), 1);

    assert!(client.download_file("{}", &base).is_err());
}

#[test]
fn contacts_and_phone_pairing() {
    let _guard = serial();
    let mem = Arc::new(MemoryClient::new());
    mem.add_contact(
        wa_jid("67890@s.whatsapp.net"),
        ContactInfo {
            found: true,
            business_name: "ACME".into(),
            ..Default::default()
        },
    );
    mem.add_contact(wa_jid("11111@s.whatsapp.net"), ContactInfo::default());
    mem.set_lid_mapping(wa_jid("67890@s.whatsapp.net"), wa_jid("555@lid"));
    mem.add_group(wa_jid("120363@g.us"), "Team");
    let (_dir, client) = setup(&mem);

    let contacts = client.contacts().unwrap();
    let names: Vec<(String, String)> = contacts
        .iter()
        .map(|(jid, c)| (jid.to_string(), c.display_name()))
        .collect();
    assert_eq!(
        names,
        [
            ("555@lid".to_owned(), "+ ACME".to_owned()),
            ("67890@s.whatsapp.net".to_owned(), "+ ACME".to_owned()),
            ("120363@g.us".to_owned(), "Team".to_owned()),
        ]
    );
    assert_eq!(
        contacts[2].1,
        Contact {
            found: true,
            full_name: "Team".into(),
            ..Default::default()
        }
    );

    assert_eq!(client.pair_phone("15551234567").unwrap(), "ABCD-1234");
    assert!(client.pair_phone("+1 555").is_err());
    assert_eq!(mem.pair_requests(), ["15551234567"]);
}
