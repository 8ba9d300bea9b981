// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Adapts a `serialport::SerialPort` to [`bridge_proto::FrameSink`]. Writes
//! are serialised behind a mutex since the bridging handler's `request`/
//! `send_event`/`respond`/`event_ack` entry points may be called
//! concurrently from several application threads, but only one frame may be
//! on the wire at a time.

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use bridge_proto::{Error, FrameSink, Result};

pub struct SerialFrameSink {
    port: Mutex<Box<dyn serialport::SerialPort>>,
}

impl SerialFrameSink {
    pub fn new(port: Box<dyn serialport::SerialPort>) -> Self {
        SerialFrameSink { port: Mutex::new(port) }
    }
}

impl FrameSink for SerialFrameSink {
    fn send(&self, bytes: &[u8], timeout: Duration) -> Result<()> {
        let mut port = self.port.lock().unwrap();
        port.set_timeout(timeout).map_err(|_| Error::Failed)?;
        port.write_all(bytes).map_err(|_| Error::Failed)?;
        port.flush().map_err(|_| Error::Failed)
    }
}
