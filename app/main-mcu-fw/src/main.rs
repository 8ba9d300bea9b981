// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Main MCU firmware image: bridging-protocol client talking to the Wake
//! MCU, an MQTT telemetry client, and an on-demand YMODEM transfer
//! subcommand (spec §1). The camera pipeline, HTTP/REST surface, WebSocket
//! video push and Web config UI are out-of-scope external collaborators
//! (spec §1, §6) -- this binary only wires the in-scope core components
//! together.

use std::env;
use std::io::Read;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use bridge_proto::{BridgeEvent, BridgeHandler, FrameSink};

mod config;
mod fs;
mod serial;
mod telemetry;
mod ymodem_cli;

use config::AppConfig;
use serial::SerialFrameSink;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("ymodem-send") => {
            let port = args.get(2).expect("usage: main-mcu-fw ymodem-send <port> <file>");
            let file = args.get(3).expect("usage: main-mcu-fw ymodem-send <port> <file>");
            ymodem_cli::send(port, 115_200, file);
        }
        Some("ymodem-recv") => {
            let port = args.get(2).expect("usage: main-mcu-fw ymodem-recv <port> <dest-dir>");
            let dest = args.get(3).expect("usage: main-mcu-fw ymodem-recv <port> <dest-dir>");
            ymodem_cli::receive(port, 115_200, dest);
        }
        _ => run(),
    }
}

fn run() {
    let config = AppConfig::from_env();

    log::info!("main-mcu-fw: opening bridging UART {} @ {}", config.bridge_port, config.bridge_baud);
    let port = serialport::new(&config.bridge_port, config.bridge_baud)
        .timeout(Duration::from_millis(100))
        .open()
        .unwrap_or_else(|e| {
            log::error!("main-mcu-fw: failed to open {}: {e}", config.bridge_port);
            std::process::exit(1);
        });
    let reader_port = port.try_clone().expect("clone serial handle for reader thread");
    let sink: Box<dyn FrameSink> = Box::new(SerialFrameSink::new(port));

    let bridge = Arc::new(BridgeHandler::new(sink));
    bridge.init();

    let reader_bridge = bridge.clone();
    let _reader = std::thread::spawn(move || read_loop(reader_port, reader_bridge));

    let poll_stop = AtomicBool::new(false);
    let poll_bridge = bridge.clone();
    std::thread::spawn(move || poll_bridge.run(&poll_stop, on_bridge_event));

    log::info!("main-mcu-fw: connecting to MQTT broker {}:{}", config.mqtt.hostname, config.mqtt.port);
    let mqtt = Arc::new(mqtt_client::MqttClient::new(config.mqtt, None).unwrap_or_else(|e| {
        log::error!("main-mcu-fw: failed to construct MQTT client: {e}");
        std::process::exit(1);
    }));
    mqtt.add_event_handler(|event| log::info!("mqtt: {event:?}"));
    let run_mqtt = mqtt.clone();
    std::thread::spawn(move || run_mqtt.run());

    let telemetry_stop = AtomicBool::new(false);
    telemetry::run(
        bridge,
        mqtt,
        config.telemetry_topic,
        Duration::from_secs(config.telemetry_interval_s),
        &telemetry_stop,
    );
}

fn read_loop(mut port: Box<dyn serialport::SerialPort>, bridge: Arc<BridgeHandler>) {
    let mut buf = [0u8; 256];
    loop {
        match port.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => bridge.feed_bytes(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                log::error!("main-mcu-fw: bridging UART read failed: {e}");
                break;
            }
        }
    }
}

/// Handles requests/events the Wake MCU sends unprompted -- e.g. a
/// `KEY_VALUE`/`PIR_VALUE` event fired the moment a button or the PIR
/// trips, ahead of any polling this image does. This image never answers
/// requests itself (it has no power hardware to report on), so an
/// incoming `Request` just gets logged.
fn on_bridge_event(h: &BridgeHandler, event: BridgeEvent) {
    match &event {
        BridgeEvent::Known { frame, cmd } => {
            log::info!("bridge: unsolicited {cmd:?} ({} byte payload)", frame.payload.len());
            if frame.frame_type == bridge_proto::FrameType::Event {
                if let Err(e) = h.event_ack(frame) {
                    log::warn!("bridge: failed to ack event {cmd:?}: {e}");
                }
            }
        }
        BridgeEvent::UnknownCommand(frame) => {
            log::warn!("bridge: unsolicited unknown command {}", frame.cmd_raw);
        }
    }
}
