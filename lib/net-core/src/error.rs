// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("handle is not in the right state for this call")]
    InvalidState,
    #[error("DNS resolution failed for {0}")]
    ResolveFailed(String),
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),
    #[error("operation timed out")]
    Timeout,
    #[error("TLS error: {0}")]
    Tls(#[source] rustls::Error),
    #[error("failed to load TLS material: {0}")]
    TlsMaterial(String),
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
    #[error("connection closed by peer")]
    Closed,
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut {
            Error::Timeout
        } else if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Closed
        } else {
            Error::Io(e)
        }
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Error::Tls(e)
    }
}
