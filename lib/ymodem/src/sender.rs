// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::io::{ByteChannel, YmodemFile};
use crate::packet::{build_end_packet, build_packet, ACK, C, CAN, DATA_SIZE_LONG, NAK};
use crate::status::YmodemStatus;

/// Total budget for the initial "wait for peer to request a transfer" phase.
pub const INITIAL_C_TOTAL_MS: u64 = 15_000;
/// How often the sender nudges the peer with a `C` byte during that phase.
pub const INITIAL_C_INTERVAL_MS: u64 = 3_000;
/// Budget for the second `C`, sent by the receiver once it has ACKed the
/// header packet and is ready for data.
pub const SECOND_C_TIMEOUT_MS: u64 = 5_000;
pub const HEADER_ACK_RETRIES: u32 = 5;
pub const DATA_NAK_RETRIES: u32 = 5;
/// Per-packet ACK/NAK wait. Not pinned by a specific value in the source
/// material; chosen to match the cadence of the handshake phases above
/// (see DESIGN.md).
pub const PACKET_ACK_TIMEOUT_MS: u64 = 3_000;

/// Sends a single file to a YMODEM-1K receiver (spec §4.3 "Sender state
/// machine"). Holds no state across calls -- one `YmodemSender` per transfer.
pub struct YmodemSender<'a> {
    channel: &'a mut dyn ByteChannel,
}

impl<'a> YmodemSender<'a> {
    pub fn new(channel: &'a mut dyn ByteChannel) -> Self {
        YmodemSender { channel }
    }

    pub fn send_file(
        &mut self,
        filename: &str,
        file_size: u32,
        file: &mut dyn YmodemFile,
        mut on_status: impl FnMut(YmodemStatus),
    ) -> Result<()> {
        if let Err(e) = self.wait_for_initial_c() {
            on_status(match e {
                Error::Cancelled => YmodemStatus::CancelReceived,
                _ => YmodemStatus::SendTimeout,
            });
            return Err(e);
        }

        let mut header = format!("{filename}\0{file_size}\0").into_bytes();
        header.resize(128, 0);
        self.send_with_retries(0, &header, HEADER_ACK_RETRIES, &mut on_status)?;

        if self.wait_for_byte(C, Duration::from_millis(SECOND_C_TIMEOUT_MS)).is_err() {
            on_status(YmodemStatus::SendTimeout);
            return Err(Error::Timeout);
        }

        let mut seq: u8 = 1;
        let mut sent = 0u32;
        let mut buf = [0u8; DATA_SIZE_LONG];
        loop {
            let n = file.read(&mut buf).map_err(|_| Error::FileError)?;
            if n == 0 {
                break;
            }
            self.send_with_retries(seq, &buf[..n], DATA_NAK_RETRIES, &mut on_status)?;
            seq = seq.wrapping_add(1);
            sent += n as u32;
            if sent >= file_size {
                break;
            }
        }

        self.send_eot(&mut on_status)?;
        self.channel.write_all(&build_end_packet());
        on_status(YmodemStatus::Success);
        Ok(())
    }

    fn wait_for_initial_c(&mut self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(INITIAL_C_TOTAL_MS);
        loop {
            self.channel.write_byte(C);
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }
            let slice = remaining.min(Duration::from_millis(INITIAL_C_INTERVAL_MS));
            match self.channel.read_byte(slice) {
                Ok(C) => return Ok(()),
                Ok(CAN) => return Err(Error::Cancelled),
                _ => continue,
            }
        }
    }

    fn wait_for_byte(&mut self, want: u8, timeout: Duration) -> Result<()> {
        match self.channel.read_byte(timeout) {
            Ok(b) if b == want => Ok(()),
            Ok(CAN) => Err(Error::Cancelled),
            _ => Err(Error::Timeout),
        }
    }

    /// Sends one packet, retrying from the start of the packet (not a raw
    /// resend of the same bytes -- the caller passes fresh `data` each
    /// time) on NAK or ACK timeout, up to `max_retries` times. A `C`
    /// received mid-stream means the peer reset; spec §4.3 says this also
    /// resets the retry counter and re-sends the current packet.
    fn send_with_retries(
        &mut self,
        seq: u8,
        data: &[u8],
        max_retries: u32,
        on_status: &mut impl FnMut(YmodemStatus),
    ) -> Result<()> {
        let wire = build_packet(seq, data);
        let mut retries_left = max_retries;
        loop {
            self.channel.write_all(&wire);
            match self.channel.read_byte(Duration::from_millis(PACKET_ACK_TIMEOUT_MS)) {
                Ok(ACK) => return Ok(()),
                Ok(C) => {
                    retries_left = max_retries;
                    continue;
                }
                Ok(CAN) => {
                    on_status(YmodemStatus::CancelReceived);
                    return Err(Error::Cancelled);
                }
                Ok(NAK) | Err(_) => {
                    if retries_left == 0 {
                        on_status(YmodemStatus::PacketError);
                        return Err(Error::PacketError);
                    }
                    retries_left -= 1;
                    continue;
                }
                _ => continue,
            }
        }
    }

    fn send_eot(&mut self, on_status: &mut impl FnMut(YmodemStatus)) -> Result<()> {
        self.channel.write_byte(crate::packet::EOT);
        match self.channel.read_byte(Duration::from_millis(PACKET_ACK_TIMEOUT_MS)) {
            Ok(ACK) => Ok(()),
            _ => {
                // resend once on timeout, per spec §4.3
                self.channel.write_byte(crate::packet::EOT);
                match self.channel.read_byte(Duration::from_millis(PACKET_ACK_TIMEOUT_MS)) {
                    Ok(ACK) => Ok(()),
                    _ => {
                        on_status(YmodemStatus::SendTimeout);
                        Err(Error::Timeout)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedChannel {
        inbox: VecDeque<u8>,
        outbox: Arc<Mutex<Vec<u8>>>,
    }
    impl ByteChannel for ScriptedChannel {
        fn write_byte(&mut self, byte: u8) {
            self.outbox.lock().unwrap().push(byte);
        }
        fn read_byte(&mut self, _timeout: Duration) -> Result<u8> {
            self.inbox.pop_front().ok_or(Error::Timeout)
        }
    }

    struct MemFile<'a> {
        data: &'a [u8],
        pos: usize,
    }
    impl<'a> YmodemFile for MemFile<'a> {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = (self.data.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
        fn write_all(&mut self, _buf: &[u8]) -> Result<()> {
            unreachable!("sender never writes")
        }
        fn seek_from_start(&mut self, pos: u64) -> Result<()> {
            self.pos = pos as usize;
            Ok(())
        }
        fn tell(&mut self) -> Result<u64> {
            Ok(self.pos as u64)
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn happy_path_sends_header_data_and_eot() {
        // C, ACK(header), C(second), ACK(data), ACK(EOT)
        let inbox: VecDeque<u8> = vec![C, ACK, C, ACK, ACK].into();
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let mut chan = ScriptedChannel { inbox, outbox: outbox.clone() };
        let mut file = MemFile { data: b"hello world", pos: 0 };
        let mut statuses = Vec::new();
        let mut sender = YmodemSender::new(&mut chan);
        let result = sender.send_file("blob.bin", 11, &mut file, |s| statuses.push(s));
        assert!(result.is_ok());
        assert_eq!(statuses, vec![YmodemStatus::Success]);
    }

    #[test]
    fn nak_triggers_a_retransmit_not_a_failure() {
        let inbox: VecDeque<u8> = vec![C, NAK, ACK, C, ACK, ACK].into();
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let mut chan = ScriptedChannel { inbox, outbox };
        let mut file = MemFile { data: b"x", pos: 0 };
        let mut sender = YmodemSender::new(&mut chan);
        assert!(sender.send_file("f", 1, &mut file, |_| {}).is_ok());
    }
}
