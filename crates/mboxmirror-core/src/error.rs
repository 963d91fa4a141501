//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a mirror run.
///
/// Per-message rejections (stale, duplicate) and unparseable dates are not
/// errors; they never show up here.
#[derive(Debug, Error)]
pub enum Error {
    /// IMAP operation failed.
    #[error("IMAP error: {0}")]
    Imap(#[from] mboxmirror_imap::Error),

    /// I/O error, including archive writes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The identifier sidecar could not be read or written.
    #[error("identifier file {}: {source}", path.display())]
    SidecarIo {
        /// Sidecar location.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },

    /// The identifier sidecar is not valid.
    #[error("identifier file {} is corrupt: {source}", path.display())]
    SidecarFormat {
        /// Sidecar location.
        path: PathBuf,
        /// Underlying failure.
        source: serde_yaml::Error,
    },

    /// A message carries no usable `Message-ID` header, so it cannot be
    /// deduplicated.
    #[error("message has no Message-ID header: {preview}")]
    MissingMessageId {
        /// The first header lines of the offending message.
        preview: String,
    },

    /// Invalid configuration or credentials file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The fetch worker terminated abnormally.
    #[error("fetch worker crashed: {0}")]
    WorkerPanicked(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
