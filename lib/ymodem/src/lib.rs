// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! YMODEM-1K file transfer engine (spec §4.3), grounded in
//! `examples/original_source/Custom/Common/Utils/generic_ymodem.h` for the
//! callback/HAL shape and in spec.md for the protocol state machines
//! themselves (the matching `.c` file in the retrieval pack was empty).

mod error;
mod io;
mod packet;
mod receiver;
mod sender;
mod status;

pub use error::{Error, Result};
pub use io::{ByteChannel, FileOpener, YmodemFile};
pub use packet::{build_end_packet, build_packet, read_packet, Packet, ReadOutcome, ACK, CAN, C as CTRL_C, EOT, NAK, SOH, STX};
pub use receiver::{YmodemReceiver, RECEIVE_GLOBAL_TIMEOUT_MS, REOPEN_EVERY_N_WRITES};
pub use sender::YmodemSender;
pub use status::YmodemStatus;
