// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use crate::error::{Error, Result};

/// The bare byte channel YMODEM runs over. Mirrors `generic_ymodem.h`'s
/// `UART_TxFunc`/`UART_RxFunc` function pointers.
pub trait ByteChannel: Send {
    fn write_byte(&mut self, byte: u8);
    fn write_all(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }
    /// Read one byte, blocking up to `timeout`. `Err(Error::Timeout)` if
    /// nothing arrived in time.
    fn read_byte(&mut self, timeout: Duration) -> Result<u8>;
}

/// An open file handle, mirroring the original's `file_fwrite`/`file_fread`/
/// `file_fseek`/`file_ftell` function-pointer group.
pub trait YmodemFile: Send {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;
    fn seek_from_start(&mut self, pos: u64) -> Result<()>;
    fn tell(&mut self) -> Result<u64>;
    fn flush(&mut self) -> Result<()>;
}

/// Opens/closes files by name, mirroring `file_fopen`/`file_fclose`. Kept
/// separate from [`YmodemFile`] so the receiver's "close and reopen every 32
/// writes" quirk (spec §4.3) can be expressed as close-then-open-append
/// without the trait needing to know about that policy itself.
pub trait FileOpener: Send + Sync {
    fn open_read(&self, filename: &str) -> Result<Box<dyn YmodemFile>>;
    fn create(&self, filename: &str) -> Result<Box<dyn YmodemFile>>;
    /// Re-open a file previously returned by [`FileOpener::create`] for
    /// continued writing, used by the filesystem-reopen quirk.
    fn reopen_for_append(&self, filename: &str) -> Result<Box<dyn YmodemFile>>;
}
