//! # File Fetcher
//!
//! Streams a remote file into a local directory. The body is copied in fixed-size
//! chunks into a temporary file next to the destination which is then renamed
//! over `dest_dir/<filename>`, so an interrupted transfer never leaves a
//! truncated file under the final name. Existing files are overwritten.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{IoResultExt, Result, UpdaterError};
use crate::progress::{DownloadProgress, ProgressCallback};
use crate::remote::RemoteArtifact;

const CHUNK_SIZE: usize = 8192;

/// A file fetched to local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub path: PathBuf,
    pub size: u64,
}

impl LocalArtifact {
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Builds the blocking HTTP client shared by all requests.
/// Redirects are followed (the label database URL relies on it).
pub fn http_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Downloads `artifact` into `dest_dir`.
pub fn fetch(
    client: &Client,
    artifact: &RemoteArtifact,
    dest_dir: &Path,
    mut progress: Option<&mut ProgressCallback<'_>>,
) -> Result<LocalArtifact> {
    info!(url = %artifact.url, "downloading {}", artifact.filename);
    let mut resp = client.get(&artifact.url).send()?;
    let status = resp.status();
    if !status.is_success() {
        return Err(UpdaterError::Network {
            url: artifact.url.clone(),
            status: Some(status.as_u16()),
            message: format!("server answered {}", status),
        });
    }
    let total = resp.content_length();

    let mut tmp = NamedTempFile::new_in(dest_dir).at(dest_dir)?;
    let start = Instant::now();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut received: u64 = 0;
    loop {
        let n = resp.read(&mut buf).map_err(|e| UpdaterError::Network {
            url: artifact.url.clone(),
            status: Some(status.as_u16()),
            message: format!("connection dropped: {}", e),
        })?;
        if n == 0 {
            break;
        }
        tmp.write_all(&buf[..n]).at(tmp.path())?;
        received += n as u64;
        if let Some(cb) = progress.as_deref_mut() {
            cb(&DownloadProgress {
                url: artifact.url.clone(),
                filename: artifact.filename.clone(),
                received,
                total,
                elapsed: start.elapsed(),
            });
        }
    }
    tmp.flush().at(tmp.path())?;

    let dest = dest_dir.join(&artifact.filename);
    tmp.persist(&dest).map_err(|e| UpdaterError::io(e.error, &dest))?;
    info!(path = %dest.display(), bytes = received, "downloaded");
    Ok(LocalArtifact { path: dest, size: received })
}
