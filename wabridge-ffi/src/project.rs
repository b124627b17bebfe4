//! Message projector: rich protocol messages to flat host records.
//!
//! One projected record is produced per recognised variant present in the
//! protocol message, in declaration order: conversation, extended text,
//! image, video, audio, document, sticker. Everything else is dropped.

use tracing::warn;

use crate::config::FileKind;
use crate::descriptor::{Downloadable, file_id_for};
use crate::jid::Jid;
use crate::proto;

/// Normalized metadata of a projected message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageInfo {
    /// Protocol-assigned message id.
    pub id: String,
    /// Conversation, normalized to the phone-number form when known.
    pub chat: Jid,
    /// Author, normalized the same way.
    pub sender: Jid,
    /// Unix seconds.
    pub timestamp: i64,
    /// Sent by the local user.
    pub is_from_me: bool,
    /// Stanza id of the replied-to message.
    pub quote_id: Option<String>,
}

/// A media payload reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMessage {
    /// Payload kind.
    pub kind: FileKind,
    /// Where the payload will live, relative to the host's media base.
    pub path: String,
    /// Media descriptor, see [`crate::descriptor`].
    pub file_id: String,
    /// `None` for both a missing and an empty caption.
    pub caption: Option<String>,
}

/// What a message carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Plain or extended text.
    Text(String),
    /// A media payload.
    File(FileMessage),
}

/// A message reduced to what the host consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedMessage {
    /// Metadata.
    pub info: MessageInfo,
    /// Payload.
    pub content: MessageContent,
}

/// Project every recognised variant of `msg`.
#[must_use]
pub fn project(info: &MessageInfo, msg: &proto::Message) -> Vec<ProjectedMessage> {
    let mut out = Vec::new();

    if let Some(text) = &msg.conversation {
        out.push(ProjectedMessage {
            info: info.clone(),
            content: MessageContent::Text(text.clone()),
        });
    }
    if let Some(ext) = &msg.extended_text_message {
        out.push(ProjectedMessage {
            info: with_quote(info, ext.context_info.as_ref()),
            content: MessageContent::Text(ext.text().to_owned()),
        });
    }
    if let Some(m) = &msg.image_message {
        out.extend(media(
            info,
            FileKind::Image,
            m,
            m.mimetype(),
            Some(m.caption()),
            None,
            m.context_info.as_ref(),
        ));
    }
    if let Some(m) = &msg.video_message {
        out.extend(media(
            info,
            FileKind::Video,
            m,
            m.mimetype(),
            Some(m.caption()),
            None,
            m.context_info.as_ref(),
        ));
    }
    if let Some(m) = &msg.audio_message {
        out.extend(media(
            info,
            FileKind::Audio,
            m,
            m.mimetype(),
            None,
            None,
            m.context_info.as_ref(),
        ));
    }
    if let Some(m) = &msg.document_message {
        out.extend(media(
            info,
            FileKind::Document,
            m,
            m.mimetype(),
            Some(m.caption()),
            Some(m.file_name()),
            m.context_info.as_ref(),
        ));
    }
    if let Some(m) = &msg.sticker_message {
        out.extend(media(
            info,
            FileKind::Sticker,
            m,
            m.mimetype(),
            None,
            None,
            m.context_info.as_ref(),
        ));
    }

    out
}

fn media(
    info: &MessageInfo,
    kind: FileKind,
    msg: &dyn Downloadable,
    mimetype: &str,
    caption: Option<&str>,
    file_name: Option<&str>,
    context: Option<&proto::ContextInfo>,
) -> Option<ProjectedMessage> {
    let ext = ext_for(mimetype, kind.default_ext());
    let path = local_path(kind, &info.id, &ext, file_name);
    let file_id = file_id_for(msg, &path);
    if file_id.is_empty() {
        warn!(id = %info.id, ?kind, "dropping media message without a downloadable type");
        return None;
    }
    Some(ProjectedMessage {
        info: with_quote(info, context),
        content: MessageContent::File(FileMessage {
            kind,
            path,
            file_id,
            caption: caption.filter(|c| !c.is_empty()).map(str::to_owned),
        }),
    })
}

fn with_quote(info: &MessageInfo, context: Option<&proto::ContextInfo>) -> MessageInfo {
    let mut info = info.clone();
    if let Some(id) = context.map(proto::ContextInfo::stanza_id).filter(|id| !id.is_empty()) {
        info.quote_id = Some(id.to_owned());
    }
    info
}

/// File extension (with dot) for a mime type.
///
/// `.jpg` wins over `.jpeg`, which wins over any other candidate; otherwise
/// the first registered extension is used. Falls back to `default`.
#[must_use]
pub fn ext_for(mimetype: &str, default: &str) -> String {
    let essence = mimetype.split(';').next().unwrap_or_default().trim();
    let Some(exts) = mime_guess::get_mime_extensions_str(essence) else {
        return default.to_owned();
    };
    ["jpg", "jpeg"]
        .into_iter()
        .find(|pref| exts.contains(pref))
        .or_else(|| exts.first().copied())
        .map_or_else(|| default.to_owned(), |ext| format!(".{ext}"))
}

/// `<kind-dir>/<id><ext>`, or `<kind-dir>/<id>-<file name>` for named documents.
#[must_use]
pub fn local_path(kind: FileKind, id: &str, ext: &str, file_name: Option<&str>) -> String {
    match file_name.filter(|n| !n.is_empty()) {
        Some(name) => {
            let name: String = name
                .chars()
                .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
                .collect();
            format!("{}/{id}-{name}", kind.dir())
        }
        None => format!("{}/{id}{ext}", kind.dir()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{MediaDescriptor, MediaType};

    fn info() -> MessageInfo {
        MessageInfo {
            id: "ABC".into(),
            chat: "67890@s.whatsapp.net".parse().unwrap(),
            sender: "67890@s.whatsapp.net".parse().unwrap(),
            timestamp: 1_700_000_000,
            is_from_me: false,
            quote_id: None,
        }
    }

    fn image(caption: Option<&str>) -> proto::ImageMessage {
        proto::ImageMessage {
            mimetype: Some("image/jpeg".into()),
            caption: caption.map(Into::into),
            direct_path: Some("/v/t62/abc".into()),
            media_key: Some(vec![1; 32]),
            file_enc_sha256: Some(vec![2; 32]),
            file_sha256: Some(vec![3; 32]),
            file_length: Some(12345),
            ..Default::default()
        }
    }

    #[test]
    fn extension_selection() {
        assert_eq!(ext_for("image/jpeg", ".jpg"), ".jpg");
        assert_eq!(ext_for("video/mp4", ".mp4"), ".mp4");
        assert_eq!(ext_for("application/unknown", ".bin"), ".bin");
        assert_eq!(ext_for("", ".webp"), ".webp");
    }

    #[test]
    fn plain_conversation() {
        let msg = proto::Message {
            conversation: Some("hello".into()),
            ..Default::default()
        };
        let out = project(&info(), &msg);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, MessageContent::Text("hello".into()));
        assert_eq!(out[0].info.quote_id, None);
    }

    #[test]
    fn extended_text_lifts_quote() {
        let msg = proto::Message {
            extended_text_message: Some(proto::ExtendedTextMessage {
                text: Some("reply".into()),
                context_info: Some(proto::ContextInfo {
                    stanza_id: Some("QUOTED".into()),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        };
        let out = project(&info(), &msg);
        assert_eq!(out[0].content, MessageContent::Text("reply".into()));
        assert_eq!(out[0].info.quote_id.as_deref(), Some("QUOTED"));
    }

    #[test]
    fn image_projection() {
        let msg = proto::Message {
            image_message: Some(image(Some("look"))),
            ..Default::default()
        };
        let out = project(&info(), &msg);
        let MessageContent::File(file) = &out[0].content else {
            panic!("expected file");
        };
        assert_eq!(file.kind, FileKind::Image);
        assert_eq!(file.path, "imgs/ABC.jpg");
        assert_eq!(file.caption.as_deref(), Some("look"));
        let d = MediaDescriptor::decode(&file.file_id).unwrap();
        assert_eq!(d.target_path, "imgs/ABC.jpg");
        assert_eq!(d.media_type, MediaType::Image);
        assert_eq!(d.size, 12345);
    }

    #[test]
    fn empty_caption_is_absent() {
        for caption in [Some(""), None] {
            let msg = proto::Message {
                image_message: Some(image(caption)),
                ..Default::default()
            };
            let MessageContent::File(file) = &project(&info(), &msg)[0].content else {
                panic!("expected file");
            };
            assert_eq!(file.caption, None);
        }
    }

    #[test]
    fn document_keeps_file_name() {
        let msg = proto::Message {
            document_message: Some(proto::DocumentMessage {
                mimetype: Some("application/pdf".into()),
                file_name: Some("q3/report.pdf".into()),
                direct_path: Some("/d".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let MessageContent::File(file) = &project(&info(), &msg)[0].content else {
            panic!("expected file");
        };
        assert_eq!(file.kind, FileKind::Document);
        assert_eq!(file.path, "docs/ABC-q3_report.pdf");
    }

    #[test]
    fn sticker_and_audio_defaults() {
        let msg = proto::Message {
            audio_message: Some(proto::AudioMessage {
                mimetype: Some("application/x-nothing".into()),
                ..Default::default()
            }),
            sticker_message: Some(proto::StickerMessage::default()),
            ..Default::default()
        };
        let out = project(&info(), &msg);
        assert_eq!(out.len(), 2);
        let paths: Vec<_> = out
            .iter()
            .map(|m| match &m.content {
                MessageContent::File(f) => f.path.clone(),
                MessageContent::Text(_) => unreachable!(),
            })
            .collect();
        assert_eq!(paths, ["auds/ABC.ogg", "stickers/ABC.webp"]);
    }

    #[test]
    fn multiple_variants_in_declaration_order() {
        let mut video = proto::VideoMessage {
            mimetype: Some("video/mp4".into()),
            context_info: Some(proto::ContextInfo {
                stanza_id: Some("Q".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        video.caption = Some(String::new());
        let msg = proto::Message {
            video_message: Some(video),
            conversation: Some("first".into()),
            image_message: Some(image(None)),
            ..Default::default()
        };
        let out = project(&info(), &msg);
        assert_eq!(out.len(), 3);
        assert!(matches!(out[0].content, MessageContent::Text(_)));
        assert!(matches!(&out[1].content, MessageContent::File(f) if f.kind == FileKind::Image));
        assert!(matches!(&out[2].content, MessageContent::File(f) if f.kind == FileKind::Video));
        assert_eq!(out[1].info.quote_id, None);
        assert_eq!(out[2].info.quote_id.as_deref(), Some("Q"));
    }

    #[test]
    fn unknown_variants_dropped() {
        assert!(project(&info(), &proto::Message::default()).is_empty());
    }
}
