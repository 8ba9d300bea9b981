// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `main-mcu-fw ymodem-send <port> <file>` / `ymodem-recv <port> <dest-dir>`
//! -- on-demand firmware/asset transfer over a bare UART, independent of
//! the bridging link (spec §1 "YMODEM transfer engine"; §9 "independent of
//! the bridging protocol"). Invoked as a one-shot subcommand rather than a
//! long-running service, matching spec §5 ("YMODEM ... runs in its
//! caller's thread, not a dedicated worker").

use std::time::Duration;

use ymodem::{FileOpener, YmodemReceiver, YmodemSender, YmodemStatus};

use crate::fs::DirFileOpener;
use crate::serial::SerialByteChannel;

fn open_port(path: &str, baud: u32) -> Box<dyn serialport::SerialPort> {
    serialport::new(path, baud).timeout(Duration::from_millis(200)).open().unwrap_or_else(|e| {
        log::error!("ymodem: failed to open {path}: {e}");
        std::process::exit(1);
    })
}

fn log_status(status: YmodemStatus) {
    log::info!("ymodem: {status:?}");
}

pub fn send(port_path: &str, baud: u32, file_path: &str) {
    let port = open_port(port_path, baud);
    let mut channel = SerialByteChannel::new(port);

    let metadata = std::fs::metadata(file_path).unwrap_or_else(|e| {
        log::error!("ymodem: cannot stat {file_path}: {e}");
        std::process::exit(1);
    });
    let file_name = std::path::Path::new(file_path).file_name().and_then(|n| n.to_str()).unwrap_or("file.bin");

    let dir = std::path::Path::new(file_path).parent().unwrap_or(std::path::Path::new("."));
    let opener = DirFileOpener::new(dir);
    let mut file = opener.open_read(file_name).unwrap_or_else(|e| {
        log::error!("ymodem: cannot open {file_path}: {e}");
        std::process::exit(1);
    });

    let mut sender = YmodemSender::new(&mut channel);
    match sender.send_file(file_name, metadata.len() as u32, &mut *file, log_status) {
        Ok(()) => log::info!("ymodem: sent {file_path} ({} bytes)", metadata.len()),
        Err(e) => {
            log::error!("ymodem: send failed: {e}");
            std::process::exit(1);
        }
    }
}

pub fn receive(port_path: &str, baud: u32, dest_dir: &str) {
    let port = open_port(port_path, baud);
    let mut channel = SerialByteChannel::new(port);
    let opener = DirFileOpener::new(dest_dir);

    let mut receiver = YmodemReceiver::new(&mut channel, &opener);
    match receiver.receive_file(log_status) {
        Ok(filename) => log::info!("ymodem: received {filename} into {dest_dir}"),
        Err(e) => {
            log::error!("ymodem: receive failed: {e}");
            std::process::exit(1);
        }
    }
}
