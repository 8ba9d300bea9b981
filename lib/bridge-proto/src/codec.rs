// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::frame::{crc16, Frame, FrameType, HEADER_LEN, MAX_PAYLOAD, SOF};

/// Incremental byte-stream decoder.
///
/// Fed one byte (or a slice) at a time -- possibly from interrupt context in
/// the original firmware, here possibly from a dedicated reader thread -- it
/// drives the small state machine described in spec §4.1: wait for the SOF
/// byte, accumulate the rest of the header, validate the header CRC, then
/// (if `len > 0`) accumulate `len + 2` payload bytes and validate the
/// payload CRC. A bad CRC or an oversized `len` drops the in-progress frame
/// and resynchronises at the next byte; it never panics or allocates more
/// than `MAX_PAYLOAD` bytes.
#[derive(Debug)]
pub struct Decoder {
    state: State,
}

#[derive(Debug)]
enum State {
    WaitSof,
    Header { buf: Vec<u8> },
    Payload { header: PartialHeader, buf: Vec<u8> },
}

#[derive(Debug, Clone, Copy)]
struct PartialHeader {
    id: u16,
    len: u16,
    frame_type_raw: u16,
    cmd: u16,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Decoder { state: State::WaitSof }
    }

    /// Discard any partially-accumulated frame and start looking for SOF
    /// again. Used both internally on a CRC failure and externally by a
    /// caller that knows the channel was disturbed (e.g. after a UART
    /// framing error).
    pub fn resync(&mut self) {
        self.state = State::WaitSof;
    }

    /// Feed a single byte, returning a decoded frame if this byte completed one.
    pub fn push_byte(&mut self, byte: u8) -> Option<Frame> {
        match &mut self.state {
            State::WaitSof => {
                if byte == SOF {
                    self.state = State::Header { buf: vec![byte] };
                }
                None
            }
            State::Header { buf } => {
                buf.push(byte);
                if buf.len() < HEADER_LEN {
                    return None;
                }
                let header_crc = u16::from_le_bytes([buf[9], buf[10]]);
                if crc16(&buf[..HEADER_LEN - 2]) != header_crc {
                    log::warn!("bridge: header CRC mismatch, resyncing");
                    self.resync();
                    return None;
                }
                let id = u16::from_le_bytes([buf[1], buf[2]]);
                let len = u16::from_le_bytes([buf[3], buf[4]]);
                let frame_type_raw = u16::from_le_bytes([buf[5], buf[6]]);
                let cmd = u16::from_le_bytes([buf[7], buf[8]]);

                // Clamp against MAX_PAYLOAD *before* allocating -- a
                // corrupted `len` must never drive a large allocation.
                if len as usize > MAX_PAYLOAD {
                    log::warn!("bridge: oversized len {len}, resyncing");
                    self.resync();
                    return None;
                }

                let header = PartialHeader { id, len, frame_type_raw, cmd };
                if len == 0 {
                    self.state = State::WaitSof;
                    return Some(finish_frame(header, Vec::new()));
                }
                self.state = State::Payload { header, buf: Vec::with_capacity(len as usize + 2) };
                None
            }
            State::Payload { header, buf } => {
                buf.push(byte);
                let want = header.len as usize + 2;
                if buf.len() < want {
                    return None;
                }
                let header = *header;
                let mut buf = std::mem::take(buf);
                self.state = State::WaitSof;

                let payload_crc = u16::from_le_bytes([buf[buf.len() - 2], buf[buf.len() - 1]]);
                buf.truncate(header.len as usize);
                if crc16(&buf) != payload_crc {
                    log::warn!("bridge: payload CRC mismatch, dropping frame");
                    return None;
                }
                Some(finish_frame(header, buf))
            }
        }
    }

    /// Feed a slice of bytes, returning every frame it completed (in order).
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut out = Vec::new();
        for &b in bytes {
            if let Some(frame) = self.push_byte(b) {
                out.push(frame);
            }
        }
        out
    }
}

fn finish_frame(header: PartialHeader, payload: Vec<u8>) -> Frame {
    // An unrecognised type value is folded into `Request` by construction
    // (the type field is only 2 bits of information in practice, 0..=3);
    // `FrameType::from_u16` cannot fail for values this decoder lets
    // through because `push_byte` only ever records what it read, not a
    // re-derived value. We still guard defensively.
    let frame_type = FrameType::from_u16(header.frame_type_raw).unwrap_or(FrameType::Request);
    Frame { id: header.id, frame_type, cmd_raw: header.cmd, payload }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Command;

    fn build(id: u16, ty: FrameType, cmd: u16, payload: &[u8]) -> Vec<u8> {
        Frame { id, frame_type: ty, cmd_raw: cmd, payload: payload.to_vec() }.encode().unwrap()
    }

    #[test]
    fn round_trips_payload_free_frame() {
        let bytes = build(7, FrameType::Request, Command::KeepAlive as u16, &[]);
        let mut dec = Decoder::new();
        let frames = dec.push_bytes(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id, 7);
        assert_eq!(frames[0].payload, Vec::<u8>::new());
    }

    #[test]
    fn round_trips_frame_with_payload() {
        let bytes = build(42, FrameType::Response, Command::GetTime as u16, b"hello!");
        let mut dec = Decoder::new();
        let frames = dec.push_bytes(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, b"hello!");
    }

    #[test]
    fn bit_flip_in_payload_drops_only_that_frame() {
        let mut bytes = build(1, FrameType::Event, Command::PirValue as u16, b"abcd");
        let good = build(2, FrameType::Event, Command::PirValue as u16, b"wxyz");
        let flip_at = HEADER_LEN + 1;
        bytes[flip_at] ^= 0xFF;
        bytes.extend_from_slice(&good);

        let mut dec = Decoder::new();
        let frames = dec.push_bytes(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id, 2);
        assert_eq!(frames[0].payload, b"wxyz");
    }

    #[test]
    fn bit_flip_in_header_resyncs_at_next_sof() {
        let mut bytes = build(3, FrameType::Request, Command::KeepAlive as u16, &[]);
        bytes[2] ^= 0xFF; // corrupt the id, which the header CRC covers
        let good = build(4, FrameType::Request, Command::KeepAlive as u16, &[]);
        bytes.extend_from_slice(&good);

        let mut dec = Decoder::new();
        let frames = dec.push_bytes(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id, 4);
    }

    #[test]
    fn oversized_len_is_clamped_before_allocation() {
        // Hand-build a header claiming a payload far larger than MAX_PAYLOAD.
        let mut buf = vec![SOF];
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&u16::MAX.to_le_bytes());
        buf.extend_from_slice(&(FrameType::Request as u16).to_le_bytes());
        buf.extend_from_slice(&(Command::KeepAlive as u16).to_le_bytes());
        let crc = crc16(&buf[..HEADER_LEN - 2]);
        buf.extend_from_slice(&crc.to_le_bytes());
        let good = build(5, FrameType::Request, Command::KeepAlive as u16, &[]);
        buf.extend_from_slice(&good);

        let mut dec = Decoder::new();
        let frames = dec.push_bytes(&buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id, 5);
    }
}
