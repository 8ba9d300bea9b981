// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Outcome reported to the caller's callback at every notable event, not
/// just on final success/failure -- matches `generic_ymodem.h`'s
/// `YmodemStatus` being delivered from multiple points in both the sender
/// and receiver loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YmodemStatus {
    Success,
    CancelReceived,
    SendTimeout,
    ReceiveTimeout,
    Complete,
    PacketError,
    FileError,
}
