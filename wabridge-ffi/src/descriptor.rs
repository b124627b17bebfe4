//! Media descriptor codec ("file id").
//!
//! A descriptor is a self-contained JSON record carrying everything needed to
//! fetch and decrypt a media payload later, possibly after a restart. Keys
//! carry type-tag suffixes (`MediaKey_arraybyte`, `Size_int`, ...) so host
//! decoders in any language can read them without a schema. Byte fields are
//! standard base64.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::proto;

/// Current descriptor layout. Bump on any field change.
pub const DESCRIPTOR_VERSION: i64 = 1;

/// Errors from [`MediaDescriptor::decode`].
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// The descriptor is not valid JSON or misses a field.
    #[error("malformed descriptor: {0}")]
    Json(#[from] serde_json::Error),
    /// Written by a different descriptor layout.
    #[error("descriptor version {found} does not match {expected}")]
    VersionMismatch { found: i64, expected: i64 },
    /// The media type string is not one this adapter knows.
    #[error("unknown media type {0:?}")]
    UnknownMediaType(String),
}

/// Key-derivation domain of a media payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Image payload.
    Image,
    /// Video payload.
    Video,
    /// Audio payload.
    Audio,
    /// Document payload.
    Document,
    /// History sync blob.
    History,
    /// App-state patch blob.
    AppState,
    /// Link preview thumbnail.
    LinkThumbnail,
}

impl MediaType {
    /// HKDF info string, also the descriptor's wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "WhatsApp Image Keys",
            Self::Video => "WhatsApp Video Keys",
            Self::Audio => "WhatsApp Audio Keys",
            Self::Document => "WhatsApp Document Keys",
            Self::History => "WhatsApp History Keys",
            Self::AppState => "WhatsApp App State Keys",
            Self::LinkThumbnail => "WhatsApp Link Thumbnail Keys",
        }
    }

    /// MMS sub-type the media servers expect for this payload type.
    #[must_use]
    pub const fn mms_type(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::History => "md-msg-hist",
            Self::AppState => "md-app-state",
            Self::LinkThumbnail => "thumbnail-link",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "WhatsApp Image Keys" => Self::Image,
            "WhatsApp Video Keys" => Self::Video,
            "WhatsApp Audio Keys" => Self::Audio,
            "WhatsApp Document Keys" => Self::Document,
            "WhatsApp History Keys" => Self::History,
            "WhatsApp App State Keys" => Self::AppState,
            "WhatsApp Link Thumbnail Keys" => Self::LinkThumbnail,
            other => return Err(DescriptorError::UnknownMediaType(other.to_owned())),
        })
    }
}

/// Decoded media descriptor.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    /// Layout version, see [`DESCRIPTOR_VERSION`].
    pub version: i64,
    /// Path on the media servers.
    pub direct_path: String,
    /// Path relative to the host's media base directory.
    pub target_path: String,
    /// Key the payload was encrypted with.
    pub media_key: Vec<u8>,
    /// Key-derivation domain.
    pub media_type: MediaType,
    /// Plaintext size in bytes, or -1 when the sender did not report it.
    pub size: i64,
    /// SHA-256 of the encrypted payload.
    pub file_enc_sha256: Vec<u8>,
    /// SHA-256 of the plaintext payload.
    pub file_sha256: Vec<u8>,
}

impl fmt::Debug for MediaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDescriptor")
            .field("version", &self.version)
            .field("direct_path", &self.direct_path)
            .field("target_path", &self.target_path)
            .field("media_type", &self.media_type)
            .field("size", &self.size)
            .field("file_sha256", &hex::encode(&self.file_sha256))
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize)]
struct Wire {
    #[serde(rename = "Version_int")]
    version: i64,
    #[serde(rename = "DirectPath_string", default)]
    direct_path: String,
    #[serde(rename = "TargetPath_string", default)]
    target_path: String,
    #[serde(rename = "MediaKey_arraybyte", with = "b64", default)]
    media_key: Vec<u8>,
    #[serde(rename = "MediaType_MediaType")]
    media_type: String,
    #[serde(rename = "Size_int", default)]
    size: i64,
    #[serde(rename = "FileEncSha256_arraybyte", with = "b64", default)]
    file_enc_sha256: Vec<u8>,
    #[serde(rename = "FileSha256_arraybyte", with = "b64", default)]
    file_sha256: Vec<u8>,
}

mod b64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    /// `null` decodes as empty: nil slices are encoded that way by some producers.
    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

impl MediaDescriptor {
    /// Build a descriptor for a downloadable message.
    ///
    /// Returns `None` when the message has no recognised media type; callers
    /// treat that as "drop the message".
    #[must_use]
    pub fn from_downloadable(msg: &dyn Downloadable, target_path: &str) -> Option<Self> {
        let media_type = msg.media_type()?;
        let fields = msg.media_fields();
        Some(Self {
            version: DESCRIPTOR_VERSION,
            direct_path: fields.direct_path.to_owned(),
            target_path: target_path.to_owned(),
            media_key: fields.media_key.to_vec(),
            media_type,
            size: fields.size.map_or(-1, |s| i64::try_from(s).unwrap_or(i64::MAX)),
            file_enc_sha256: fields.file_enc_sha256.to_vec(),
            file_sha256: fields.file_sha256.to_vec(),
        })
    }

    /// Serialize to the portable string form.
    #[must_use]
    pub fn encode(&self) -> String {
        let wire = Wire {
            version: self.version,
            direct_path: self.direct_path.clone(),
            target_path: self.target_path.clone(),
            media_key: self.media_key.clone(),
            media_type: self.media_type.as_str().to_owned(),
            size: self.size,
            file_enc_sha256: self.file_enc_sha256.clone(),
            file_sha256: self.file_sha256.clone(),
        };
        // Plain strings, integers and byte strings always serialize.
        serde_json::to_string(&wire).unwrap_or_default()
    }

    /// Parse a descriptor string. Fails closed on any version other than
    /// [`DESCRIPTOR_VERSION`].
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] on malformed JSON, a version mismatch or an
    /// unknown media type.
    pub fn decode(file_id: &str) -> Result<Self, DescriptorError> {
        let wire: Wire = serde_json::from_str(file_id)?;
        if wire.version != DESCRIPTOR_VERSION {
            return Err(DescriptorError::VersionMismatch {
                found: wire.version,
                expected: DESCRIPTOR_VERSION,
            });
        }
        Ok(Self {
            version: wire.version,
            direct_path: wire.direct_path,
            target_path: wire.target_path,
            media_key: wire.media_key,
            media_type: wire.media_type.parse()?,
            size: wire.size,
            file_enc_sha256: wire.file_enc_sha256,
            file_sha256: wire.file_sha256,
        })
    }
}

/// Encode a descriptor for `msg`, or an empty string when it cannot be downloaded.
#[must_use]
pub fn file_id_for(msg: &dyn Downloadable, target_path: &str) -> String {
    MediaDescriptor::from_downloadable(msg, target_path)
        .map(|d| d.encode())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Downloadable messages
// ---------------------------------------------------------------------------

/// Borrowed download coordinates of a media message.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaFields<'a> {
    /// Path on the media servers.
    pub direct_path: &'a str,
    /// Encryption key.
    pub media_key: &'a [u8],
    /// SHA-256 of the encrypted payload.
    pub file_enc_sha256: &'a [u8],
    /// SHA-256 of the plaintext payload.
    pub file_sha256: &'a [u8],
    /// Plaintext size, when the sender reported it.
    pub size: Option<u64>,
}

/// A message whose payload lives on the media servers.
pub trait Downloadable {
    /// Payload type, or `None` if the variant is not downloadable.
    fn media_type(&self) -> Option<MediaType>;
    /// Coordinates for [`crate::backend::WaClient::download_media_with_path`].
    fn media_fields(&self) -> MediaFields<'_>;
}

macro_rules! downloadable {
    ($($ty:ty => $media:expr),* $(,)?) => {
        $(
            impl Downloadable for $ty {
                fn media_type(&self) -> Option<MediaType> {
                    Some($media)
                }

                fn media_fields(&self) -> MediaFields<'_> {
                    MediaFields {
                        direct_path: self.direct_path(),
                        media_key: self.media_key(),
                        file_enc_sha256: self.file_enc_sha256(),
                        file_sha256: self.file_sha256(),
                        size: self.file_length,
                    }
                }
            }
        )*
    };
}

downloadable! {
    proto::ImageMessage => MediaType::Image,
    proto::VideoMessage => MediaType::Video,
    proto::AudioMessage => MediaType::Audio,
    proto::DocumentMessage => MediaType::Document,
    // Stickers share the image key domain.
    proto::StickerMessage => MediaType::Image,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MediaDescriptor {
        MediaDescriptor {
            version: DESCRIPTOR_VERSION,
            direct_path: "/v/t62.7118-24/12345_67890.enc".into(),
            target_path: "imgs/ABC.jpg".into(),
            media_key: (0u8..32).collect(),
            media_type: MediaType::Image,
            size: 12345,
            file_enc_sha256: vec![0xAB; 32],
            file_sha256: vec![0xCD; 32],
        }
    }

    #[test]
    fn round_trip() {
        let d = sample();
        let encoded = d.encode();
        assert_eq!(MediaDescriptor::decode(&encoded).unwrap(), d);
    }

    #[test]
    fn wire_keys_carry_type_tags() {
        let json: serde_json::Value = serde_json::from_str(&sample().encode()).unwrap();
        assert_eq!(json["Version_int"], 1);
        assert_eq!(json["Size_int"], 12345);
        assert_eq!(json["MediaType_MediaType"], "WhatsApp Image Keys");
        assert_eq!(json["TargetPath_string"], "imgs/ABC.jpg");
        assert_eq!(
            json["MediaKey_arraybyte"],
            "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8="
        );
    }

    #[test]
    fn version_mismatch_fails_closed() {
        let mut json: serde_json::Value = serde_json::from_str(&sample().encode()).unwrap();
        for v in [0, 2, -1, 99] {
            json["Version_int"] = v.into();
            let err = MediaDescriptor::decode(&json.to_string()).unwrap_err();
            assert!(matches!(err, DescriptorError::VersionMismatch { found, .. } if found == v));
        }
    }

    #[test]
    fn null_byte_fields_decode_empty() {
        let s = r#"{"Version_int":1,"DirectPath_string":"/p","TargetPath_string":"auds/x.ogg",
            "MediaKey_arraybyte":null,"MediaType_MediaType":"WhatsApp Audio Keys","Size_int":-1,
            "FileEncSha256_arraybyte":null,"FileSha256_arraybyte":null}"#;
        let d = MediaDescriptor::decode(s).unwrap();
        assert!(d.media_key.is_empty());
        assert_eq!(d.media_type, MediaType::Audio);
        assert_eq!(d.size, -1);
    }

    #[test]
    fn unknown_media_type_rejected() {
        let s = sample().encode().replace("WhatsApp Image Keys", "WhatsApp Bogus Keys");
        assert!(matches!(
            MediaDescriptor::decode(&s),
            Err(DescriptorError::UnknownMediaType(_))
        ));
        assert!(MediaDescriptor::decode("not json").is_err());
    }

    #[test]
    fn mms_types() {
        assert_eq!(MediaType::Image.mms_type(), "image");
        assert_eq!(MediaType::History.mms_type(), "md-msg-hist");
        assert_eq!(MediaType::LinkThumbnail.mms_type(), "thumbnail-link");
        assert_eq!(MediaType::AppState.mms_type(), "md-app-state");
    }

    struct NotDownloadable;

    impl Downloadable for NotDownloadable {
        fn media_type(&self) -> Option<MediaType> {
            None
        }
        fn media_fields(&self) -> MediaFields<'_> {
            MediaFields::default()
        }
    }

    #[test]
    fn empty_media_type_yields_empty_file_id() {
        assert!(file_id_for(&NotDownloadable, "x/y").is_empty());
    }

    #[test]
    fn sticker_uses_image_keys_and_missing_size_is_negative() {
        let sticker = proto::StickerMessage {
            direct_path: Some("/s".into()),
            media_key: Some(vec![7; 32]),
            ..Default::default()
        };
        let d = MediaDescriptor::from_downloadable(&sticker, "stickers/1.webp").unwrap();
        assert_eq!(d.media_type, MediaType::Image);
        assert_eq!(d.size, -1);
        assert_eq!(d.media_key, vec![7; 32]);
    }
}
