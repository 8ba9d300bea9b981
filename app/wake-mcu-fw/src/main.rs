// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wake MCU firmware image. Owns the power/wake hardware and answers the
//! Main MCU's bridging requests (spec §6) by driving a [`wake_power::
//! PowerManager`]. Wiring only -- the protocol and power logic live in
//! `bridge-proto`/`wake-power`.

use std::env;
use std::io::Read;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use zerocopy::{FromBytes, IntoBytes};

use bridge_proto::{
    BridgeEvent, BridgeHandler, BridgeTime, Command, Frame, FrameSink, FrameType, PirConfig, PowerCtrl, PowerMode,
    Version,
};
use wake_power::{PowerManager, PowerRail, RtcWakeupConfig, WakeFlags, WakeRequest};

mod backend;
mod clock;
mod serial;

use backend::LoggingPowerBackend;
use clock::SoftwareClock;
use serial::SerialFrameSink;

/// Firmware version reported over `GET_VERSION` (spec §6).
const FW_VERSION: Version = Version { major: 0, minor: 1, patch: 0, build: 0 };

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let port_path = args.get(1).cloned().unwrap_or_else(|| "/dev/ttyS1".to_string());
    let baud_rate: u32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(115_200);

    log::info!("wake-mcu-fw: opening bridging UART {port_path} @ {baud_rate}");
    let port = serialport::new(&port_path, baud_rate)
        .timeout(Duration::from_millis(100))
        .open()
        .unwrap_or_else(|e| {
            log::error!("wake-mcu-fw: failed to open {port_path}: {e}");
            std::process::exit(1);
        });

    let reader_port = port.try_clone().expect("clone serial handle for reader thread");
    let sink: Box<dyn FrameSink> = Box::new(SerialFrameSink::new(port));

    let handler = Arc::new(BridgeHandler::new(sink));
    handler.init();

    let reader_handler = handler.clone();
    let reader = std::thread::spawn(move || read_loop(reader_port, reader_handler));

    let power = Arc::new(PowerManager::new(Box::new(LoggingPowerBackend::default())));
    let clock = Arc::new(SoftwareClock::new());

    let stop = AtomicBool::new(false);
    let dispatch_power = power.clone();
    let dispatch_clock = clock.clone();
    handler.run(&stop, move |h, event| dispatch(h, event, &dispatch_power, &dispatch_clock));

    reader.join().ok();
}

fn read_loop(mut port: Box<dyn serialport::SerialPort>, handler: Arc<BridgeHandler>) {
    let mut buf = [0u8; 256];
    loop {
        match port.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => handler.feed_bytes(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                log::error!("wake-mcu-fw: UART read failed: {e}");
                break;
            }
        }
    }
}

/// Routes one incoming bridging request to the power manager or the
/// software clock and answers it, matching the responder half of spec §4.1.
fn dispatch(h: &BridgeHandler, event: BridgeEvent, power: &Arc<PowerManager>, clock: &Arc<SoftwareClock>) {
    let frame = event.frame().clone();
    let cmd = match &event {
        BridgeEvent::Known { cmd, .. } => *cmd,
        BridgeEvent::UnknownCommand(f) => {
            log::warn!("wake-mcu-fw: unknown bridging command {}", f.cmd_raw);
            return;
        }
    };

    let response = handle_command(cmd, &frame, power, clock);
    if frame.frame_type == FrameType::Request {
        if let Err(e) = h.respond(&frame, &response) {
            log::warn!("wake-mcu-fw: failed to respond to {cmd:?}: {e}");
        }
    } else if let Err(e) = h.event_ack(&frame) {
        log::warn!("wake-mcu-fw: failed to ack event {cmd:?}: {e}");
    }
}

fn handle_command(cmd: Command, frame: &Frame, power: &Arc<PowerManager>, clock: &Arc<SoftwareClock>) -> Vec<u8> {
    match cmd {
        Command::KeepAlive => Vec::new(),
        Command::GetTime => clock.now().as_bytes().to_vec(),
        Command::SetTime => {
            if let Ok(t) = BridgeTime::read_from_bytes(&frame.payload) {
                clock.set(t);
            }
            Vec::new()
        }
        Command::PwrCtrl => {
            if let Ok(ctrl) = PowerCtrl::read_from_bytes(&frame.payload) {
                apply_pwr_ctrl(power, ctrl);
            } else {
                log::warn!("wake-mcu-fw: malformed PWR_CTRL payload ({} bytes)", frame.payload.len());
            }
            Vec::new()
        }
        Command::PwrStatus => power.get().bits().to_le_bytes().to_vec(),
        Command::WkupFlag => power.wake_flags().bits().to_le_bytes().to_vec(),
        Command::ClearFlag => {
            power.clear_wake_flags();
            Vec::new()
        }
        Command::RstN6 => {
            power.n6_restart(900, 1000);
            Vec::new()
        }
        Command::UsbVinValue => (power.usb_vin_active() as u32).to_le_bytes().to_vec(),
        Command::GetVersion => FW_VERSION.as_bytes().to_vec(),
        // KeyValue/PirValue/PirCfg belong to the out-of-scope PirFrontEnd/
        // ConfigStore seams (SPEC_FULL.md §6) -- no board backend is wired
        // here, so these answer with a zeroed placeholder rather than hang
        // the requester.
        Command::KeyValue | Command::PirValue => 0u32.to_le_bytes().to_vec(),
        Command::PirCfg => {
            let _ = PirConfig::read_from_bytes(&frame.payload);
            0u32.to_le_bytes().to_vec()
        }
    }
}

fn apply_pwr_ctrl(power: &Arc<PowerManager>, ctrl: PowerCtrl) {
    let rails = PowerRail::from_bits_truncate(ctrl.switch_bits);
    let req = WakeRequest {
        flags: WakeFlags::from_bits_truncate(ctrl.wakeup_flags),
        rtc: RtcWakeupConfig {
            wakeup_time_s: ctrl.sleep_second,
            alarm_a: Some(ctrl.alarm_a),
            alarm_b: Some(ctrl.alarm_b),
        },
    };

    match ctrl.power_mode {
        m if m == PowerMode::Normal as u8 => power.set(rails),
        m if m == PowerMode::Standby as u8 => enter_standby_with_retry(power, req),
        m if m == PowerMode::Stop2 as u8 => power.enter_stop2(req, rails),
        other => log::warn!("wake-mcu-fw: unknown power_mode {other} in PWR_CTRL"),
    }
}

/// `Ok(())` means `enter_standby` took the ADV_OFFSET short-circuit
/// (already reset the peer, nothing further to do); `Err(StandbyEntryFailed)`
/// means the hardware standby call returned unexpectedly and the caller
/// must re-try (spec.md §4.2 "the caller sees normal return and must
/// re-try").
const STANDBY_ENTRY_RETRIES: u32 = 3;

fn enter_standby_with_retry(power: &Arc<PowerManager>, req: WakeRequest) {
    for attempt in 0..=STANDBY_ENTRY_RETRIES {
        match power.enter_standby(req) {
            Ok(()) => return,
            Err(e) => {
                log::warn!("wake-mcu-fw: standby entry failed (attempt {attempt}): {e}, retrying");
            }
        }
    }
    log::error!("wake-mcu-fw: standby entry failed after {STANDBY_ENTRY_RETRIES} retries, staying awake");
}
