//! Download engine: media descriptor + base path -> payload on disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::backend::{DownloadRequest, WaClient};
use crate::descriptor::MediaDescriptor;
use crate::error::{Error, Result};

/// Outcome reported to the host. The host gets no finer granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FileStatus {
    /// The payload is at its final path.
    Downloaded = 0,
    /// Nothing was written.
    Failed = 1,
}

/// Fetch the payload described by `file_id` into `base_path`.
///
/// Returns [`FileStatus::Downloaded`] without any network I/O when the
/// target file already exists.
pub async fn download(client: &dyn WaClient, file_id: &str, base_path: &Path) -> FileStatus {
    match fetch(client, file_id, base_path).await {
        Ok(path) => {
            debug!(path = %path.display(), "media available");
            FileStatus::Downloaded
        }
        Err(e) => {
            warn!(error = %e, "media download failed");
            FileStatus::Failed
        }
    }
}

async fn fetch(client: &dyn WaClient, file_id: &str, base_path: &Path) -> Result<PathBuf> {
    let desc = MediaDescriptor::decode(file_id)?;
    let final_path = base_path.join(&desc.target_path);
    if final_path.exists() {
        return Ok(final_path);
    }

    let data = client
        .download_media_with_path(DownloadRequest {
            direct_path: &desc.direct_path,
            enc_sha256: &desc.file_enc_sha256,
            sha256: &desc.file_sha256,
            media_key: &desc.media_key,
            size: desc.size,
            media_type: desc.media_type,
            mms_type: desc.media_type.mms_type(),
        })
        .await?;

    write_atomic(&final_path, &data)?;
    Ok(final_path)
}

/// Write through a temporary sibling and rename into place, so a failed
/// write never leaves a file at `path`.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::InvalidArgument(format!("no parent directory: {}", path.display())))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
