// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! UART adapters for the two independent byte-channel consumers this image
//! drives: the bridging link to the Wake MCU ([`bridge_proto::FrameSink`])
//! and, on demand, a YMODEM transfer over a (possibly different) serial
//! port ([`ymodem::ByteChannel`]) -- spec §9 "YMODEM ... is independent of
//! the bridging protocol".

use std::io::{Read, Write};
use std::sync::Mutex;
use std::time::Duration;

use bridge_proto::{Error as BridgeError, FrameSink, Result as BridgeResult};
use ymodem::{ByteChannel, Error as YmodemError, Result as YmodemResult};

pub struct SerialFrameSink {
    port: Mutex<Box<dyn serialport::SerialPort>>,
}

impl SerialFrameSink {
    pub fn new(port: Box<dyn serialport::SerialPort>) -> Self {
        SerialFrameSink { port: Mutex::new(port) }
    }
}

impl FrameSink for SerialFrameSink {
    fn send(&self, bytes: &[u8], timeout: Duration) -> BridgeResult<()> {
        let mut port = self.port.lock().unwrap();
        port.set_timeout(timeout).map_err(|_| BridgeError::Failed)?;
        port.write_all(bytes).map_err(|_| BridgeError::Failed)?;
        port.flush().map_err(|_| BridgeError::Failed)
    }
}

/// A plain serial port as a YMODEM byte channel. One byte at a time, as the
/// original's `UART_TxFunc`/`UART_RxFunc` callbacks did.
pub struct SerialByteChannel {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialByteChannel {
    pub fn new(port: Box<dyn serialport::SerialPort>) -> Self {
        SerialByteChannel { port }
    }
}

impl ByteChannel for SerialByteChannel {
    fn write_byte(&mut self, byte: u8) {
        let _ = self.port.write_all(&[byte]);
    }

    fn read_byte(&mut self, timeout: Duration) -> YmodemResult<u8> {
        self.port.set_timeout(timeout).map_err(|_| YmodemError::Timeout)?;
        let mut b = [0u8; 1];
        match self.port.read_exact(&mut b) {
            Ok(()) => Ok(b[0]),
            Err(_) => Err(YmodemError::Timeout),
        }
    }
}
