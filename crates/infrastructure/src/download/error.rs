//! Download errors

use application::ApplicationError;
use thiserror::Error;

use crate::retry::Retryable;

/// Errors raised while fetching a file
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Server answered with a non-success status
    #[error("HTTP {status} while downloading")]
    Http { status: u16 },

    /// Redirect response without a usable Location header
    #[error("Redirect (HTTP {status}) without a Location header")]
    Redirect { status: u16 },

    /// Redirect chain longer than allowed
    #[error("More than {0} redirects")]
    TooManyRedirects(usize),

    /// Downloaded bytes do not hash to the pinned digest
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Connection, TLS or body-stream failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Attempt exceeded its deadline
    #[error("Download timed out after {0}s")]
    Timeout(u64),

    /// Writing or hashing the destination failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Retryable for DownloadError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status } => *status >= 500 || *status == 408 || *status == 429,
            Self::ChecksumMismatch { .. } | Self::Transport(_) | Self::Timeout(_) | Self::Io(_) => {
                true
            },
            Self::Redirect { .. } | Self::TooManyRedirects(_) => false,
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<DownloadError> for ApplicationError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::Redirect { .. } | DownloadError::TooManyRedirects(_) => {
                Self::Redirect(err.to_string())
            },
            other => Self::Download(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        assert!(DownloadError::Http { status: 503 }.is_retryable());
        assert!(DownloadError::Http { status: 429 }.is_retryable());
        assert!(!DownloadError::Http { status: 404 }.is_retryable());
    }

    #[test]
    fn checksum_mismatch_is_retryable() {
        let err = DownloadError::ChecksumMismatch {
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn redirect_errors_map_to_redirect() {
        let app: ApplicationError = DownloadError::Redirect { status: 302 }.into();
        assert!(matches!(app, ApplicationError::Redirect(_)));

        let app: ApplicationError = DownloadError::Http { status: 500 }.into();
        assert!(matches!(app, ApplicationError::Download(ref m) if m.contains("500")));
    }
}
