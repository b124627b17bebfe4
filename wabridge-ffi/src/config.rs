//! Fixed configuration: session store location, media layout, pairing identity.

use std::path::{Path, PathBuf};

/// Environment variable consulted by [`crate::log::wa_init_logger`] when no level is passed.
pub const LOG_ENV: &str = "WABRIDGE_LOG";

/// Default log filter for the stderr logger.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Location of the protocol client's session database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path of the SQLite database file.
    pub db_path: PathBuf,
}

impl StoreConfig {
    /// Store at `db_path`; nothing is touched until the client opens it.
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// SQLite URI with foreign keys enforced.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("file:{}?_foreign_keys=on", self.db_path.display())
    }

    /// Create the directory that will hold the database, if any.
    ///
    /// # Errors
    ///
    /// Propagates the filesystem error.
    pub fn ensure_parent(&self) -> std::io::Result<()> {
        match self.db_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }
}

/// Media payload kind, as exposed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FileKind {
    /// Photo.
    Image = 0,
    /// Video clip.
    Video = 1,
    /// Voice note or audio file.
    Audio = 2,
    /// Any other file.
    Document = 3,
    /// Sticker image.
    Sticker = 4,
}

impl FileKind {
    /// Directory under the media base path.
    #[must_use]
    pub const fn dir(self) -> &'static str {
        match self {
            Self::Image => "imgs",
            Self::Video => "vids",
            Self::Audio => "auds",
            Self::Document => "docs",
            Self::Sticker => "stickers",
        }
    }

    /// Extension used when the mime type gives none.
    #[must_use]
    pub const fn default_ext(self) -> &'static str {
        match self {
            Self::Image => ".jpg",
            Self::Video => ".mp4",
            Self::Audio => ".ogg",
            Self::Document => ".bin",
            Self::Sticker => ".webp",
        }
    }

    /// Classify a local file for sending by its guessed mime type.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        match mime.type_().as_str() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::Document,
        }
    }
}

/// Identity announced when requesting a phone pairing code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingConfig {
    /// Ask the phone to show a notification for the code.
    pub show_push_notification: bool,
    /// Browser family reported to the phone.
    pub client_type: PairClientType,
    /// Name shown in the phone's linked device list.
    pub client_display_name: String,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            show_push_notification: true,
            client_type: PairClientType::Chrome,
            client_display_name: "Chrome (Linux)".into(),
        }
    }
}

/// Browser the linked device claims to be during phone pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairClientType {
    /// Not reported.
    Unknown,
    /// Google Chrome.
    Chrome,
    /// Microsoft Edge.
    Edge,
    /// Mozilla Firefox.
    Firefox,
    /// Internet Explorer.
    Ie,
    /// Opera.
    Opera,
    /// Safari.
    Safari,
    /// Desktop app on Electron.
    Electron,
    /// Windows store app.
    Uwp,
    /// Any other web client.
    OtherWebClient,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_uri() {
        let cfg = StoreConfig::new("/tmp/wa/session.db");
        assert_eq!(cfg.uri(), "file:/tmp/wa/session.db?_foreign_keys=on");
    }

    #[test]
    fn ensure_parent_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StoreConfig::new(dir.path().join("a/b/session.db"));
        cfg.ensure_parent().unwrap();
        assert!(dir.path().join("a/b").is_dir());
        StoreConfig::new("session.db").ensure_parent().unwrap();
    }

    #[test]
    fn kind_for_path() {
        assert_eq!(FileKind::for_path(Path::new("a/photo.PNG")), FileKind::Image);
        assert_eq!(FileKind::for_path(Path::new("clip.mp4")), FileKind::Video);
        assert_eq!(FileKind::for_path(Path::new("note.mp3")), FileKind::Audio);
        assert_eq!(FileKind::for_path(Path::new("report.pdf")), FileKind::Document);
        assert_eq!(FileKind::for_path(Path::new("noext")), FileKind::Document);
    }
}
