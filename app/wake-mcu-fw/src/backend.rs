// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A [`PowerBackend`] that logs every hardware action instead of driving
//! real GPIOs/RTC registers. The rail-switch and load-switch pins, the RTC
//! wake timer and alarm registers, and the PWR standby/stop2 instructions
//! are all board-specific (spec §1 "out of scope ... only their interfaces
//! to the core are described"); this binary has no board wired, so it logs
//! what a real backend would do -- grounded the way
//! `examples/oxidecomputer-hubris/drv/stm32h7-gpio` logs pin operations
//! behind its `Gpio` API, one call per pin action.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use bridge_proto::RtcAlarm;
use wake_power::{AlarmSlot, PowerBackend, PowerRail, WakeFlags};

#[derive(Default)]
pub struct LoggingPowerBackend {
    rails: AtomicU32,
    backup_register: AtomicU32,
    usb_vin: AtomicBool,
}

impl PowerBackend for LoggingPowerBackend {
    fn set_rail(&self, rail: PowerRail, on: bool) {
        log::info!("pwr: rail {rail:?} -> {}", if on { "on" } else { "off" });
        let mut bits = self.rails.load(Ordering::SeqCst);
        if on {
            bits |= rail.bits();
        } else {
            bits &= !rail.bits();
        }
        self.rails.store(bits, Ordering::SeqCst);
    }

    fn get_rails(&self) -> PowerRail {
        PowerRail::from_bits_truncate(self.rails.load(Ordering::SeqCst))
    }

    fn hi_z_non_kept_rails(&self, kept: PowerRail) {
        log::debug!("pwr: setting non-kept rails (kept={kept:?}) to analog high-impedance");
    }

    fn restore_rail_drive(&self, kept: PowerRail) {
        log::debug!("pwr: restoring push-pull drive on rail pins (kept={kept:?})");
    }

    fn arm_config_key_wakeup(&self) {
        log::debug!("pwr: arming config-key wakeup pin");
    }

    fn arm_pir_wakeup(&self, pir_high: bool, pir_low: bool) {
        log::debug!("pwr: arming PIR wakeup pin (high={pir_high}, low={pir_low})");
    }

    fn program_rtc_wakeup_timer(&self, seconds_minus_advance: u16) {
        log::debug!("pwr: programming RTC wakeup timer for {seconds_minus_advance}s");
    }

    fn disable_rtc_wakeup_timer(&self) {
        log::debug!("pwr: disabling RTC wakeup timer");
    }

    fn program_rtc_alarm(&self, slot: AlarmSlot, alarm: RtcAlarm) {
        log::debug!("pwr: programming RTC alarm {slot:?} ({}:{:02}:{:02})", alarm.hour, alarm.minute, alarm.second);
    }

    fn disable_rtc_alarm(&self, slot: AlarmSlot) {
        log::debug!("pwr: disabling RTC alarm {slot:?}");
    }

    fn write_backup_register(&self, value: u32) {
        self.backup_register.store(value, Ordering::SeqCst);
    }

    fn read_backup_register(&self) -> u32 {
        self.backup_register.load(Ordering::SeqCst)
    }

    fn read_and_clear_reset_cause(&self) -> WakeFlags {
        // No real reset-cause register is wired up; a board implementation
        // reads `RCC_CSR`/`PWR_SR1` here and clears them afterwards.
        WakeFlags::empty()
    }

    fn deinit_bridge_uart(&self) {
        log::debug!("pwr: de-initializing bridging UART ahead of STOP2");
    }

    fn reinit_bridge_uart(&self) {
        log::debug!("pwr: re-initializing bridging UART after STOP2 wake");
    }

    fn enter_standby(&self) {
        log::warn!("pwr: entering STANDBY (simulated -- no real PWR->CR1 write on this binary)");
    }

    fn enter_stop2(&self) {
        log::info!("pwr: entering STOP2 (simulated)");
    }

    fn set_n6_reset_line(&self, asserted: bool) {
        log::info!("pwr: N6 reset line -> {}", if asserted { "asserted (low)" } else { "released (high)" });
    }

    fn usb_vin_active(&self) -> bool {
        self.usb_vin.load(Ordering::SeqCst)
    }
}
