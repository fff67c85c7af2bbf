use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for all operations in the `a3d_updater` crate.
#[derive(Debug, Error)]
pub enum UpdaterError {
    /// A request failed at the transport level or returned a non-success status.
    #[error("network error for '{url}': {message}")]
    Network {
        url: String,
        /// HTTP status code, when the server answered at all.
        status: Option<u16>,
        message: String,
    },

    /// The firmware page no longer contains the expected download link.
    /// Carries the page so the operator can check it by hand.
    #[error("could not find the firmware download link, check manually at {page}")]
    NotFound { page: String },

    /// The selected volume root is missing or not writable.
    #[error("invalid target '{}': {reason}", .path.display())]
    InvalidTarget { path: PathBuf, reason: String },

    /// A URL could not be parsed or does not end in a usable file name.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A destructive operation was not confirmed.
    #[error("operation cancelled")]
    Cancelled,

    /// An I/O error occurred while reading or writing a file.
    /// Includes the path where the error happened.
    #[error("{}", io_message(.path, .source))]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// An error from the `zip` crate while reading or writing a backup.
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An error while walking a directory tree.
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, UpdaterError>;

fn io_message(path: &std::path::Path, source: &std::io::Error) -> String {
    if path.as_os_str().is_empty() {
        format!("I/O error: {}", source)
    } else {
        format!("I/O error on path '{}': {}", path.display(), source)
    }
}

impl UpdaterError {
    /// Wraps an I/O error together with the path it happened on.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        UpdaterError::Io { source, path: path.into() }
    }

    pub(crate) fn invalid_target(path: impl Into<PathBuf>, reason: &str) -> Self {
        UpdaterError::InvalidTarget { path: path.into(), reason: reason.to_string() }
    }
}

// Generic IO error conversion that doesn't require a path
impl From<std::io::Error> for UpdaterError {
    fn from(err: std::io::Error) -> Self {
        UpdaterError::Io { source: err, path: PathBuf::new() }
    }
}

impl From<reqwest::Error> for UpdaterError {
    fn from(err: reqwest::Error) -> Self {
        UpdaterError::Network {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for UpdaterError {
    fn from(err: url::ParseError) -> Self {
        UpdaterError::InvalidUrl(err.to_string())
    }
}

/// Extension for attaching a path to `std::io::Result`.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &std::path::Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| UpdaterError::io(e, path))
    }
}
