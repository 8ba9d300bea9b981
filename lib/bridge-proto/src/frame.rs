// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::{Error, Result};
use crc::{Crc, CRC_16_CCITT_FALSE};

/// Start-of-frame marker.
pub const SOF: u8 = 0xBD;

/// Bytes making up the fixed header: sof(1) + id(2) + len(2) + type(2) + cmd(2) + crc(2).
pub const HEADER_LEN: usize = 11;

/// Largest payload a single frame may carry.
pub const MAX_PAYLOAD: usize = 512;

/// Largest frame (header + payload + payload CRC) the decoder will accept
/// before it gives up and resynchronises. Computed up front so a corrupted
/// `len` field is clamped *before* any allocation is attempted.
pub const MAX_FRAME_SIZE: usize = HEADER_LEN + MAX_PAYLOAD + 2;

const CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_CCITT_FALSE);

pub fn crc16(data: &[u8]) -> u16 {
    CCITT.checksum(data)
}

/// Frame type, matching `ms_bridging_frame_type_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FrameType {
    Request = 0,
    Response = 1,
    Event = 2,
    EventAck = 3,
}

impl FrameType {
    pub fn from_u16(v: u16) -> Result<Self> {
        Ok(match v {
            0 => FrameType::Request,
            1 => FrameType::Response,
            2 => FrameType::Event,
            3 => FrameType::EventAck,
            _ => return Err(Error::InvalidSize),
        })
    }
}

/// Well-known bridging commands (§6). Payload layouts live in `commands.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    KeepAlive = 0,
    GetTime = 1,
    SetTime = 2,
    PwrCtrl = 3,
    PwrStatus = 4,
    WkupFlag = 5,
    KeyValue = 6,
    PirValue = 7,
    ClearFlag = 8,
    RstN6 = 9,
    PirCfg = 10,
    UsbVinValue = 11,
    GetVersion = 12,
}

impl Command {
    pub fn from_u16(v: u16) -> Result<Self> {
        Ok(match v {
            0 => Command::KeepAlive,
            1 => Command::GetTime,
            2 => Command::SetTime,
            3 => Command::PwrCtrl,
            4 => Command::PwrStatus,
            5 => Command::WkupFlag,
            6 => Command::KeyValue,
            7 => Command::PirValue,
            8 => Command::ClearFlag,
            9 => Command::RstN6,
            10 => Command::PirCfg,
            11 => Command::UsbVinValue,
            12 => Command::GetVersion,
            other => return Err(Error::UnknownCommand(other)),
        })
    }
}

/// A decoded (or about-to-be-encoded) bridging frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: u16,
    pub frame_type: FrameType,
    /// Raw command code. Kept separate from `Command` so an unrecognised
    /// code can still be routed/acked without failing to decode the frame.
    pub cmd_raw: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn cmd(&self) -> Result<Command> {
        Command::from_u16(self.cmd_raw)
    }

    /// Serialise this frame to the little-endian wire format described in
    /// spec §6: sof | id | len | type | cmd | header-crc | payload | payload-crc?
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(Error::InvalidSize);
        }
        let len = self.payload.len() as u16;
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len() + 2);
        out.push(SOF);
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(self.frame_type as u16).to_le_bytes());
        out.extend_from_slice(&self.cmd_raw.to_le_bytes());
        let header_crc = crc16(&out[..HEADER_LEN - 2]);
        out.extend_from_slice(&header_crc.to_le_bytes());
        if !self.payload.is_empty() {
            out.extend_from_slice(&self.payload);
            let payload_crc = crc16(&self.payload);
            out.extend_from_slice(&payload_crc.to_le_bytes());
        }
        Ok(out)
    }
}
