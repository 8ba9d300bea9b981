// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Framed request/response and event/ack protocol bridging the Wake MCU and
//! Main MCU over a single UART, per spec §3/§4.1. Grounded in
//! `examples/oxidecomputer-hubris/lib/host-sp-messages` for the overall
//! shape of a framed byte-stream protocol crate, and in
//! `examples/original_source/WakeCore/Custom/Components/ms_bridging/` for
//! the wire format and mailbox semantics.

mod codec;
mod commands;
mod error;
mod frame;
mod handler;
mod wellknown;

pub use codec::Decoder;
pub use commands::{BridgeTime, PirConfig, PowerCtrl, PowerMode, RtcAlarm, Version};
pub use error::{Error, Result};
pub use frame::{crc16, Command, Frame, FrameType, HEADER_LEN, MAX_FRAME_SIZE, MAX_PAYLOAD, SOF};
pub use handler::{
    BridgeEvent, BridgeHandler, FrameSink, ACK_TIMEOUT_MS, FRAME_SEND_TIMEOUT_MS, MAX_RETRIES,
    N_FRAME_SLOTS, WAIT_ACK_DELAY_MS,
};
