//! Reading files to send and saving files received

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{ProtocolError, Result};

/// A file ready to go into a file frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Final path component of the source file
    pub filename: String,
    /// File contents
    pub contents: Bytes,
}

/// Read a file from disk for sending
///
/// Empty files are rejected: a file frame with a name must carry content.
pub async fn read_attachment(path: impl AsRef<Path>) -> Result<Attachment> {
    let path = path.as_ref();
    let filename = final_component(path).ok_or(ProtocolError::InvalidFile)?;

    let contents = tokio::fs::read(path).await?;
    if contents.is_empty() {
        return Err(ProtocolError::InvalidFile.into());
    }

    Ok(Attachment {
        filename,
        contents: Bytes::from(contents),
    })
}

/// Write received contents into `dir`
///
/// Only the last component of `filename` is used, so a peer cannot write
/// outside `dir`.
pub async fn save_attachment(
    dir: impl AsRef<Path>,
    filename: &str,
    contents: &[u8],
) -> Result<PathBuf> {
    let name = final_component(Path::new(filename)).ok_or(ProtocolError::InvalidFile)?;

    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;

    let target = dir.join(name);
    tokio::fs::write(&target, contents).await?;

    tracing::debug!(path = %target.display(), size = contents.len(), "Saved attachment");
    Ok(target)
}

fn final_component(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
}
