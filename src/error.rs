use packed_struct::PackingError;
use thiserror::Error;

/// When things go awry
#[derive(Debug, Error)]
pub enum TriDnsError {
    /// A malformed message; the reason string is for the logs, the
    /// message itself gets dropped.
    #[error("format error: {0}")]
    Format(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to pack header bytes: {0}")]
    BytePacking(String),
    /// Something failed in the start up of the platform
    #[error("startup error: {0}")]
    Startup(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("TLS material error: {0}")]
    Tls(String),
    #[error("QUIC error: {0}")]
    Quic(String),
    /// The per-server upstream read timeout elapsed
    #[error("upstream timed out")]
    UpstreamTimeout,
    /// Failed to send something across a tokio channel
    #[error("channel send error: {0}")]
    Send(String),
}

impl TriDnsError {
    pub fn format(reason: impl Into<String>) -> Self {
        TriDnsError::Format(reason.into())
    }
}

impl From<PackingError> for TriDnsError {
    fn from(error: PackingError) -> Self {
        TriDnsError::BytePacking(error.to_string())
    }
}

impl From<TriDnsError> for std::io::Error {
    fn from(error: TriDnsError) -> Self {
        match error {
            TriDnsError::Io(err) => err,
            other => std::io::Error::other(other.to_string()),
        }
    }
}
