// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use crc::{Crc, CRC_16_XMODEM};

use crate::error::{Error, Result};
use crate::io::ByteChannel;

pub const SOH: u8 = 0x01;
pub const STX: u8 = 0x02;
pub const EOT: u8 = 0x04;
pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;
pub const CAN: u8 = 0x18;
pub const C: u8 = b'C';
pub const PAD: u8 = 0x1A;

pub const DATA_SIZE_SHORT: usize = 128;
pub const DATA_SIZE_LONG: usize = 1024;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// A received data or header packet: sequence number plus its payload
/// (always exactly 128 or 1024 bytes -- padding included; trimming trailing
/// pad bytes is the caller's job, since only the header packet's embedded
/// size field tells you how much of the last packet is real data).
#[derive(Debug, Clone)]
pub struct Packet {
    pub seq: u8,
    pub data: Vec<u8>,
}

/// Build a data (or header) packet ready to push onto the wire.
pub fn build_packet(seq: u8, data: &[u8]) -> Vec<u8> {
    let (type_byte, size) = if data.len() > DATA_SIZE_SHORT { (STX, DATA_SIZE_LONG) } else { (SOH, DATA_SIZE_SHORT) };
    let mut padded = data.to_vec();
    padded.resize(size, PAD);

    let mut out = Vec::with_capacity(3 + size + 2);
    out.push(type_byte);
    out.push(seq);
    out.push(!seq);
    out.extend_from_slice(&padded);
    out.extend_from_slice(&crc16(&padded).to_be_bytes());
    out
}

/// The all-zero end-of-batch packet (spec §4.3 "final end-packet").
pub fn build_end_packet() -> Vec<u8> {
    build_packet(0, &[0u8; DATA_SIZE_SHORT])
}

/// Outcome of [`read_packet`].
pub enum ReadOutcome {
    Packet(Packet),
    Eot,
    Cancel,
}

/// Reads bytes up to the first valid type byte (SOH/STX/EOT/CAN), discarding
/// anything else (spec §4.3 "out-of-sync bytes ... silently discarded"),
/// then reads the full packet body and validates it.
pub fn read_packet(channel: &mut dyn ByteChannel, timeout: Duration) -> Result<ReadOutcome> {
    let type_byte = loop {
        let b = channel.read_byte(timeout)?;
        if b == SOH || b == STX || b == EOT || b == CAN {
            break b;
        }
    };

    if type_byte == EOT {
        return Ok(ReadOutcome::Eot);
    }
    if type_byte == CAN {
        return Ok(ReadOutcome::Cancel);
    }

    let size = if type_byte == STX { DATA_SIZE_LONG } else { DATA_SIZE_SHORT };
    let seq = channel.read_byte(timeout)?;
    let seq_complement = channel.read_byte(timeout)?;
    if seq_complement != !seq {
        return Err(Error::PacketError);
    }

    let mut data = vec![0u8; size];
    for byte in data.iter_mut() {
        *byte = channel.read_byte(timeout)?;
    }

    let hi = channel.read_byte(timeout)?;
    let lo = channel.read_byte(timeout)?;
    let received_crc = u16::from_be_bytes([hi, lo]);
    if crc16(&data) != received_crc {
        return Err(Error::PacketError);
    }

    Ok(ReadOutcome::Packet(Packet { seq, data }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct BufChannel(VecDeque<u8>);
    impl ByteChannel for BufChannel {
        fn write_byte(&mut self, byte: u8) {
            self.0.push_back(byte);
        }
        fn read_byte(&mut self, _timeout: Duration) -> Result<u8> {
            self.0.pop_front().ok_or(Error::Timeout)
        }
    }

    #[test]
    fn round_trips_a_short_packet() {
        let wire = build_packet(3, b"hello");
        let mut chan = BufChannel(wire.into_iter().collect());
        match read_packet(&mut chan, Duration::from_millis(10)).unwrap() {
            ReadOutcome::Packet(p) => {
                assert_eq!(p.seq, 3);
                assert_eq!(&p.data[..5], b"hello");
                assert_eq!(p.data.len(), DATA_SIZE_SHORT);
            }
            _ => panic!("expected a packet"),
        }
    }

    #[test]
    fn garbage_before_soh_is_discarded() {
        let mut wire = vec![0xFF, 0x00, 0x7E];
        wire.extend(build_packet(0, b"x"));
        let mut chan = BufChannel(wire.into_iter().collect());
        assert!(matches!(read_packet(&mut chan, Duration::from_millis(10)).unwrap(), ReadOutcome::Packet(_)));
    }

    #[test]
    fn bad_crc_is_rejected() {
        let mut wire = build_packet(0, b"hello");
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;
        let mut chan = BufChannel(wire.into_iter().collect());
        assert_eq!(read_packet(&mut chan, Duration::from_millis(10)).unwrap_err(), Error::PacketError);
    }
}
