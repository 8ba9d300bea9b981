// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::io::{ByteChannel, FileOpener, YmodemFile};
use crate::packet::{read_packet, ACK, C, NAK, PAD};
use crate::status::YmodemStatus;

/// How many times the receiver sends the initial `C`.
pub const INITIAL_C_RETRIES: u32 = 10;
/// Interval between those `C` bytes.
pub const INITIAL_C_INTERVAL_MS: u64 = 1_500;
/// Per-packet read timeout once the transfer is underway.
pub const PACKET_TIMEOUT_MS: u64 = 3_000;
/// Consecutive bad packets before the receive is aborted as fatal.
pub const MAX_CONSECUTIVE_BAD_PACKETS: u32 = 10;
/// Consecutive packet-read timeouts before the receive is aborted as fatal.
pub const MAX_CONSECUTIVE_TIMEOUTS: u32 = 5;
/// Overall budget for one receive session, independent of per-packet
/// timeouts (spec §9 "blanket receive watchdog").
pub const RECEIVE_GLOBAL_TIMEOUT_MS: u64 = 10_000;
/// Re-open the destination file every this many writes (filesystem quirk,
/// spec §4.3).
pub const REOPEN_EVERY_N_WRITES: u32 = 32;

/// Receives a single file via YMODEM-1K (spec §4.3 "Receiver state
/// machine").
pub struct YmodemReceiver<'a> {
    channel: &'a mut dyn ByteChannel,
    opener: &'a dyn FileOpener,
}

impl<'a> YmodemReceiver<'a> {
    pub fn new(channel: &'a mut dyn ByteChannel, opener: &'a dyn FileOpener) -> Self {
        YmodemReceiver { channel, opener }
    }

    pub fn receive_file(&mut self, mut on_status: impl FnMut(YmodemStatus)) -> Result<String> {
        let session_deadline = Instant::now() + Duration::from_millis(RECEIVE_GLOBAL_TIMEOUT_MS);

        let header = match self.send_c_until_packet() {
            Ok(p) => p,
            Err(e) => {
                on_status(YmodemStatus::ReceiveTimeout);
                return Err(e);
            }
        };
        let (filename, size_hint) = parse_header(&header.data);
        self.channel.write_byte(ACK);

        let mut file = self.opener.create(&filename).map_err(|_| {
            on_status(YmodemStatus::FileError);
            Error::FileError
        })?;

        self.channel.write_byte(C);

        let mut expected_seq: u8 = 1;
        let mut received: u32 = 0;
        let mut writes_since_reopen: u32 = 0;
        let mut bad_packets = 0u32;
        let mut timeouts = 0u32;
        let mut file_done = size_hint.is_some_and(|s| s == 0);

        loop {
            if Instant::now() >= session_deadline {
                on_status(YmodemStatus::ReceiveTimeout);
                return Err(Error::Timeout);
            }

            match read_packet(self.channel, Duration::from_millis(PACKET_TIMEOUT_MS)) {
                Ok(crate::packet::ReadOutcome::Eot) => {
                    self.channel.write_byte(ACK);
                    self.channel.write_byte(C);
                    match read_packet(self.channel, Duration::from_millis(PACKET_TIMEOUT_MS)) {
                        Ok(crate::packet::ReadOutcome::Packet(end)) if end.seq == 0 => {
                            self.channel.write_byte(ACK);
                            file.flush().map_err(|_| Error::FileError)?;
                            on_status(YmodemStatus::Complete);
                            return Ok(filename);
                        }
                        _ => {
                            on_status(YmodemStatus::PacketError);
                            return Err(Error::PacketError);
                        }
                    }
                }
                Ok(crate::packet::ReadOutcome::Cancel) => {
                    on_status(YmodemStatus::CancelReceived);
                    return Err(Error::Cancelled);
                }
                Ok(crate::packet::ReadOutcome::Packet(packet)) => {
                    timeouts = 0;
                    if packet.seq == expected_seq {
                        bad_packets = 0;
                        let to_write = trim_trailing_pad(&packet.data, size_hint, received);
                        file.write_all(to_write).map_err(|_| Error::FileError)?;
                        received += to_write.len() as u32;
                        expected_seq = expected_seq.wrapping_add(1);
                        writes_since_reopen += 1;

                        if writes_since_reopen >= REOPEN_EVERY_N_WRITES {
                            let offset = file.tell().map_err(|_| Error::FileError)?;
                            file = self.opener.reopen_for_append(&filename).map_err(|_| {
                                on_status(YmodemStatus::FileError);
                                Error::FileError
                            })?;
                            file.seek_from_start(offset).map_err(|_| Error::FileError)?;
                            writes_since_reopen = 0;
                        }

                        if let Some(size) = size_hint {
                            if !file_done && received >= size {
                                file_done = true;
                                log::debug!("ymodem: received declared size, now expecting EOT");
                            }
                        }
                        self.channel.write_byte(ACK);
                    } else if packet.seq == expected_seq.wrapping_sub(1) {
                        // duplicate of the last packet: ack without writing
                        self.channel.write_byte(ACK);
                    } else {
                        bad_packets += 1;
                        self.channel.write_byte(NAK);
                        if bad_packets >= MAX_CONSECUTIVE_BAD_PACKETS {
                            on_status(YmodemStatus::PacketError);
                            return Err(Error::PacketError);
                        }
                    }
                }
                Err(Error::Timeout) => {
                    timeouts += 1;
                    self.channel.write_byte(NAK);
                    if timeouts >= MAX_CONSECUTIVE_TIMEOUTS {
                        on_status(YmodemStatus::ReceiveTimeout);
                        return Err(Error::Timeout);
                    }
                }
                Err(_) => {
                    bad_packets += 1;
                    self.channel.write_byte(NAK);
                    if bad_packets >= MAX_CONSECUTIVE_BAD_PACKETS {
                        on_status(YmodemStatus::PacketError);
                        return Err(Error::PacketError);
                    }
                }
            }
        }
    }

    fn send_c_until_packet(&mut self) -> Result<crate::packet::Packet> {
        for _ in 0..INITIAL_C_RETRIES {
            self.channel.write_byte(C);
            match read_packet(self.channel, Duration::from_millis(INITIAL_C_INTERVAL_MS)) {
                Ok(crate::packet::ReadOutcome::Packet(p)) => return Ok(p),
                Ok(crate::packet::ReadOutcome::Cancel) => return Err(Error::Cancelled),
                _ => continue,
            }
        }
        Err(Error::Timeout)
    }
}

/// Header packet payload is `filename \0 size_decimal_ascii \0 <pad>`. An
/// unparsable size is treated as unknown (spec §4.3), not a fatal error.
fn parse_header(data: &[u8]) -> (String, Option<u32>) {
    let mut fields = data.splitn(3, |&b| b == 0);
    let filename = fields.next().unwrap_or(&[]);
    let size_field = fields.next().unwrap_or(&[]);
    let filename = String::from_utf8_lossy(filename).into_owned();
    let size_str = String::from_utf8_lossy(size_field);
    let size = size_str.trim().parse::<u32>().ok();
    (filename, size)
}

/// Trims the padding (`0x1A`) tail from what's almost certainly the final
/// packet, using the header's declared size when available; unknown size
/// keeps the full padded block (matches the original's "unknown size"
/// fallback of trusting EOT instead).
fn trim_trailing_pad(data: &[u8], size_hint: Option<u32>, already_received: u32) -> &[u8] {
    match size_hint {
        Some(total) if already_received < total => {
            let remaining = (total - already_received) as usize;
            if remaining < data.len() {
                &data[..remaining]
            } else {
                data
            }
        }
        _ => data,
    }
}

#[allow(dead_code)]
fn is_pad(b: u8) -> bool {
    b == PAD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::build_packet;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedChannel {
        inbox: VecDeque<u8>,
    }
    impl ByteChannel for ScriptedChannel {
        fn write_byte(&mut self, _byte: u8) {}
        fn read_byte(&mut self, _timeout: Duration) -> Result<u8> {
            self.inbox.pop_front().ok_or(Error::Timeout)
        }
    }

    struct MemFile(Arc<Mutex<Vec<u8>>>);
    impl YmodemFile for MemFile {
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
            unreachable!("receiver never reads its own output file")
        }
        fn write_all(&mut self, buf: &[u8]) -> Result<()> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(())
        }
        fn seek_from_start(&mut self, _pos: u64) -> Result<()> {
            Ok(())
        }
        fn tell(&mut self) -> Result<u64> {
            Ok(self.0.lock().unwrap().len() as u64)
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct MemOpener(Arc<Mutex<Vec<u8>>>);
    impl FileOpener for MemOpener {
        fn open_read(&self, _filename: &str) -> Result<Box<dyn YmodemFile>> {
            Ok(Box::new(MemFile(self.0.clone())))
        }
        fn create(&self, _filename: &str) -> Result<Box<dyn YmodemFile>> {
            Ok(Box::new(MemFile(self.0.clone())))
        }
        fn reopen_for_append(&self, _filename: &str) -> Result<Box<dyn YmodemFile>> {
            Ok(Box::new(MemFile(self.0.clone())))
        }
    }

    fn header_packet(filename: &str, size: u32) -> Vec<u8> {
        let mut data = format!("{filename}\0{size}\0").into_bytes();
        data.resize(128, 0);
        build_packet(0, &data)
    }

    #[test]
    fn receives_a_small_file_end_to_end() {
        let mut inbox = Vec::new();
        inbox.extend(header_packet("blob.bin", 5));
        inbox.extend(build_packet(1, b"hello"));
        inbox.push(crate::packet::EOT);
        inbox.extend(build_packet(0, &[0u8; 128])); // end-of-batch

        let mut chan = ScriptedChannel { inbox: inbox.into() };
        let storage = Arc::new(Mutex::new(Vec::new()));
        let opener = MemOpener(storage.clone());
        let mut receiver = YmodemReceiver::new(&mut chan, &opener);
        let name = receiver.receive_file(|_| {}).unwrap();
        assert_eq!(name, "blob.bin");
        assert_eq!(&storage.lock().unwrap()[..], b"hello");
    }

    #[test]
    fn duplicate_packet_is_acked_without_rewriting() {
        let mut inbox = Vec::new();
        inbox.extend(header_packet("f", 5));
        inbox.extend(build_packet(1, b"hello"));
        inbox.extend(build_packet(1, b"hello")); // peer didn't see our ACK, resent seq 1
        inbox.push(crate::packet::EOT);
        inbox.extend(build_packet(0, &[0u8; 128]));

        let mut chan = ScriptedChannel { inbox: inbox.into() };
        let storage = Arc::new(Mutex::new(Vec::new()));
        let opener = MemOpener(storage.clone());
        let mut receiver = YmodemReceiver::new(&mut chan, &opener);
        receiver.receive_file(|_| {}).unwrap();
        assert_eq!(&storage.lock().unwrap()[..], b"hello");
    }
}
