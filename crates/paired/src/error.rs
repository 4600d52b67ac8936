use std::io;
use std::time::Duration;

use thiserror::Error;

/// Whether the transmitter should retry after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Recoverable,
    Fatal,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid local address {0:?}")]
    InvalidAddress(String),

    #[error("bind failed: {0}")]
    Bind(#[source] io::Error),

    #[error("no peer connected within {0:?}")]
    AcceptTimeout(Duration),

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

impl TransportError {
    /// Address problems are configuration errors and never go away by
    /// retrying. Everything else is treated as a transient link failure.
    pub fn severity(&self) -> Severity {
        match self {
            TransportError::InvalidAddress(_) => Severity::Fatal,
            TransportError::Bind(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::AddrNotAvailable | io::ErrorKind::InvalidInput
                ) =>
            {
                Severity::Fatal
            }
            _ => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
