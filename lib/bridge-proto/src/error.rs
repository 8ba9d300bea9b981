// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Bridging error kinds, mirroring the `MS_BR_ERR_*` codes of the original
/// firmware so callers can match on kind the way the C code switched on its
/// negative error codes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument")]
    InvalidArg,
    #[error("handler is not ready (not initialized, or already deinitialized)")]
    InvalidState,
    #[error("invalid size (payload too large, or a length field didn't fit)")]
    InvalidSize,
    #[error("no free mailbox slot")]
    NoMem,
    #[error("no matching entry found")]
    NotFound,
    #[error("timed out waiting for a correlated response")]
    Timeout,
    #[error("CRC check failed")]
    CrcCheck,
    #[error("underlying send function failed")]
    Failed,
    #[error("unrecognised command code {0}")]
    UnknownCommand(u16),
}

pub type Result<T> = core::result::Result<T, Error>;
