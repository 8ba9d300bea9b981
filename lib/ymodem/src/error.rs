// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("timed out waiting for a byte")]
    Timeout,
    #[error("the peer cancelled the transfer")]
    Cancelled,
    #[error("too many consecutive bad packets")]
    PacketError,
    #[error("file operation failed")]
    FileError,
}

pub type Result<T> = core::result::Result<T, Error>;
