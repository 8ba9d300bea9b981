// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Most power operations on the original hardware are fire-and-forget GPIO
/// writes and cannot fail observably (spec §4.2 "Failure semantics"); this
/// enum only covers the few calls that do have a meaningful failure mode.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument")]
    InvalidArg,
    #[error("standby entry returned without sleeping; caller should retry")]
    StandbyEntryFailed,
}

pub type Result<T> = core::result::Result<T, Error>;
