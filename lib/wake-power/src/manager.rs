// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Mutex;
use std::time::Duration;

use bridge_proto::RtcAlarm;

use crate::backend::{AlarmSlot, PowerBackend};
use crate::error::{Error, Result};
use crate::flags::{PowerRail, WakeFlags};

/// Largest value the RTC wake-up timer register can hold (16 bits).
pub const RTC_WAKEUP_MAX_TIME_S: u32 = 0xFFFF;
/// Margin subtracted from a requested wake interval so the application
/// wakes slightly before the caller's deadline.
pub const RTC_WAKEUP_ADV_OFFSET_S: u32 = 1;

/// RTC wake-up configuration for a sleep-entry call, mirroring
/// `pwr_rtc_wakeup_config_t`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtcWakeupConfig {
    pub wakeup_time_s: u32,
    pub alarm_a: Option<RtcAlarm>,
    pub alarm_b: Option<RtcAlarm>,
}

/// Per-call selection of which wake sources should be armed, independent of
/// whichever RTC fields are populated in [`RtcWakeupConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WakeRequest {
    pub flags: WakeFlags,
    pub rtc: RtcWakeupConfig,
}

/// Owns the rail GPIOs, the RTC backup register, and the standby/stop2
/// entry points, per spec §4.2. One instance per board; the hardware access
/// itself lives behind [`PowerBackend`].
pub struct PowerManager {
    backend: Box<dyn PowerBackend>,
    cached_wake_flags: Mutex<Option<WakeFlags>>,
}

impl PowerManager {
    pub fn new(backend: Box<dyn PowerBackend>) -> Self {
        PowerManager { backend, cached_wake_flags: Mutex::new(None) }
    }

    /// `set(rail_mask)`: drive every rail pin according to the mask.
    /// Idempotent -- writing the same mask twice in a row is a no-op at the
    /// GPIO level either way.
    pub fn set(&self, mask: PowerRail) {
        for rail in [PowerRail::THREE_V3, PowerRail::WIFI, PowerRail::AON, PowerRail::N6_MAIN, PowerRail::EXT] {
            self.backend.set_rail(rail, mask.contains(rail));
        }
    }

    pub fn get(&self) -> PowerRail {
        self.backend.get_rails()
    }

    /// Decode the post-wake cause, lazily and cached (spec §4.2 "called
    /// lazily and cached"). The hardware flags are cleared as a side effect
    /// of the first call; later calls serve the cached value.
    pub fn wake_flags(&self) -> WakeFlags {
        let mut cached = self.cached_wake_flags.lock().unwrap();
        if let Some(flags) = *cached {
            return flags;
        }

        let requested = WakeFlags::from_bits_truncate(self.backend.read_backup_register());
        let raw = self.backend.read_and_clear_reset_cause();

        // Bits that are only meaningful if the prior sleep actually asked
        // for them -- a spurious PIR edge after a STANDBY exit for a config
        // key, for instance, should not be reported as a PIR wake.
        let gated = WakeFlags::PIR_HIGH
            | WakeFlags::PIR_LOW
            | WakeFlags::PIR_RISING
            | WakeFlags::PIR_FALLING
            | WakeFlags::RTC_TIMING
            | WakeFlags::RTC_ALARM_A
            | WakeFlags::RTC_ALARM_B;
        let decoded = (raw - gated) | (raw & gated & requested) | WakeFlags::VALID;

        self.backend.write_backup_register(0);
        *cached = Some(decoded);
        decoded
    }

    /// `pwr_clear_wakeup_flags`: drop everything from the cache except the
    /// `VALID` marker, forcing the next read to treat "no wake cause" as an
    /// answered question rather than re-touching hardware.
    pub fn clear_wake_flags(&self) {
        let mut cached = self.cached_wake_flags.lock().unwrap();
        *cached = Some(WakeFlags::VALID);
    }

    fn arm_wake_pins(&self, req: &WakeRequest) {
        if req.flags.contains(WakeFlags::CONFIG_KEY) {
            self.backend.arm_config_key_wakeup();
        }
        let pir_high = req.flags.contains(WakeFlags::PIR_HIGH);
        let pir_low = req.flags.contains(WakeFlags::PIR_LOW);
        if pir_high != pir_low {
            self.backend.arm_pir_wakeup(pir_high, pir_low);
        }
    }

    fn arm_rtc(&self, req: &WakeRequest) {
        if req.flags.contains(WakeFlags::RTC_TIMING) && req.rtc.wakeup_time_s > 0 {
            let clamped = (req.rtc.wakeup_time_s & RTC_WAKEUP_MAX_TIME_S) as u16;
            self.backend.program_rtc_wakeup_timer(clamped.saturating_sub(RTC_WAKEUP_ADV_OFFSET_S as u16));
        } else {
            self.backend.disable_rtc_wakeup_timer();
        }

        match req.rtc.alarm_a {
            Some(alarm) if req.flags.contains(WakeFlags::RTC_ALARM_A) && alarm.is_valid != 0 => {
                self.backend.program_rtc_alarm(AlarmSlot::A, alarm);
            }
            _ => self.backend.disable_rtc_alarm(AlarmSlot::A),
        }
        match req.rtc.alarm_b {
            Some(alarm) if req.flags.contains(WakeFlags::RTC_ALARM_B) && alarm.is_valid != 0 => {
                self.backend.program_rtc_alarm(AlarmSlot::B, alarm);
            }
            _ => self.backend.disable_rtc_alarm(AlarmSlot::B),
        }
    }

    /// Enter STANDBY (spec §4.2). The board-level standby call does not
    /// return once the MCU actually sleeps, so reaching the end of this
    /// function at all means entry failed and `Err(StandbyEntryFailed)` is
    /// returned for the caller to retry (spec.md §4.2 "the caller sees
    /// normal return and must re-try"). `Ok(())` is reserved for the
    /// ADV_OFFSET short-circuit below, which is a deliberate successful
    /// action (reset the peer now), not a failure to sleep.
    ///
    /// A requested wake interval at or below `RTC_WAKEUP_ADV_OFFSET_S`
    /// short-circuits to a peer reset instead of sleeping at all --
    /// preserved from `pwr_enter_standby`'s `wakeup_time_s <= ADV_OFFSET_S`
    /// branch (spec §9 design note: "values below the margin short-circuit
    /// to reboot peer now").
    pub fn enter_standby(&self, req: WakeRequest) -> Result<()> {
        if req.flags.contains(WakeFlags::RTC_TIMING) && req.rtc.wakeup_time_s > 0 && req.rtc.wakeup_time_s <= RTC_WAKEUP_ADV_OFFSET_S {
            self.n6_restart(900, 1000);
            let mut cached = self.cached_wake_flags.lock().unwrap();
            *cached = Some(WakeFlags::VALID | WakeFlags::STANDBY_EXIT | WakeFlags::RTC_TIMING);
            return Ok(());
        }

        self.backend.write_backup_register((req.flags | WakeFlags::STANDBY_EXIT).bits());
        self.arm_wake_pins(&req);
        self.arm_rtc(&req);
        self.backend.enter_standby();
        Err(Error::StandbyEntryFailed)
    }

    /// Enter STOP2 (spec §4.2). `kept` rails stay powered and driven; every
    /// other rail pin goes analog-high-impedance for the duration. Returns
    /// once the application has resumed with clocks, UART and rails
    /// restored. A wake interval longer than the RTC timer's 16-bit range
    /// is split across repeated hardware cycles internally.
    pub fn enter_stop2(&self, req: WakeRequest, kept: PowerRail) {
        self.backend.write_backup_register((req.flags | WakeFlags::STOP2_EXIT).bits());
        self.backend.hi_z_non_kept_rails(kept);
        self.backend.deinit_bridge_uart();

        let mut remaining = req.rtc.wakeup_time_s;
        loop {
            let mut iter_req = req;
            if req.flags.contains(WakeFlags::RTC_TIMING) && remaining > 0 {
                let slice = remaining.min(RTC_WAKEUP_MAX_TIME_S);
                iter_req.rtc.wakeup_time_s = slice;
                self.arm_wake_pins(&iter_req);
                self.arm_rtc(&iter_req);
                remaining -= slice;
            } else {
                self.arm_wake_pins(&iter_req);
                self.arm_rtc(&iter_req);
            }

            self.backend.enter_stop2();

            if !(req.flags.contains(WakeFlags::RTC_TIMING) && remaining > 0) {
                break;
            }
        }

        self.backend.reinit_bridge_uart();
        self.backend.restore_rail_drive(kept);
        self.backend.disable_rtc_wakeup_timer();
        self.backend.disable_rtc_alarm(AlarmSlot::A);
        self.backend.disable_rtc_alarm(AlarmSlot::B);
    }

    /// `pwr_usb_is_active`, surfaced over the bridge as `USB_VIN_VALUE` (§6).
    pub fn usb_vin_active(&self) -> bool {
        self.backend.usb_vin_active()
    }

    /// `pwr_n6_restart`: pulse the Main MCU's reset line low then high.
    /// Timing is the caller's (or, for the standby short-circuit above,
    /// the original's hard-coded 900ms/1000ms).
    pub fn n6_restart(&self, low_ms: u32, high_ms: u32) {
        self.backend.set_n6_reset_line(true);
        std::thread::sleep(Duration::from_millis(low_ms as u64));
        self.backend.set_n6_reset_line(false);
        std::thread::sleep(Duration::from_millis(high_ms as u64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct FakeBackend {
        rails: AtomicU32,
        backup: AtomicU32,
        reset_cause: AtomicU32,
        standby_calls: AtomicU32,
        stop2_calls: AtomicU32,
        usb_active: std::sync::atomic::AtomicBool,
    }

    impl PowerBackend for FakeBackend {
        fn set_rail(&self, rail: PowerRail, on: bool) {
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
        fn hi_z_non_kept_rails(&self, _kept: PowerRail) {}
        fn restore_rail_drive(&self, _kept: PowerRail) {}
        fn arm_config_key_wakeup(&self) {}
        fn arm_pir_wakeup(&self, _pir_high: bool, _pir_low: bool) {}
        fn program_rtc_wakeup_timer(&self, _seconds_minus_advance: u16) {}
        fn disable_rtc_wakeup_timer(&self) {}
        fn program_rtc_alarm(&self, _slot: AlarmSlot, _alarm: RtcAlarm) {}
        fn disable_rtc_alarm(&self, _slot: AlarmSlot) {}
        fn write_backup_register(&self, value: u32) {
            self.backup.store(value, Ordering::SeqCst);
        }
        fn read_backup_register(&self) -> u32 {
            self.backup.load(Ordering::SeqCst)
        }
        fn read_and_clear_reset_cause(&self) -> WakeFlags {
            WakeFlags::from_bits_truncate(self.reset_cause.swap(0, Ordering::SeqCst))
        }
        fn deinit_bridge_uart(&self) {}
        fn reinit_bridge_uart(&self) {}
        fn enter_standby(&self) {
            self.standby_calls.fetch_add(1, Ordering::SeqCst);
        }
        fn enter_stop2(&self) {
            self.stop2_calls.fetch_add(1, Ordering::SeqCst);
        }
        fn set_n6_reset_line(&self, _asserted: bool) {}
        fn usb_vin_active(&self) -> bool {
            self.usb_active.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn set_then_get_round_trips() {
        let mgr = PowerManager::new(Box::new(FakeBackend::default()));
        mgr.set(PowerRail::THREE_V3 | PowerRail::N6_MAIN);
        assert_eq!(mgr.get(), PowerRail::THREE_V3 | PowerRail::N6_MAIN);
        mgr.set(PowerRail::EXT);
        assert_eq!(mgr.get(), PowerRail::EXT);
    }

    #[test]
    fn wake_flags_are_cached_after_first_read() {
        let backend = FakeBackend::default();
        backend.reset_cause.store(WakeFlags::CONFIG_KEY.bits(), Ordering::SeqCst);
        let mgr = PowerManager::new(Box::new(backend));

        let first = mgr.wake_flags();
        assert!(first.contains(WakeFlags::CONFIG_KEY));
        assert!(first.contains(WakeFlags::VALID));

        // A second hardware event after the first read must not appear
        // until clear_wake_flags() is called -- the cache is authoritative.
        let second = mgr.wake_flags();
        assert_eq!(first, second);
    }

    #[test]
    fn ungated_pir_bit_is_dropped_without_a_prior_request() {
        let backend = FakeBackend::default();
        // PIR_HIGH fires in hardware, but nothing asked for it (backup
        // register is still zero) -- must not be reported.
        backend.reset_cause.store(WakeFlags::PIR_HIGH.bits(), Ordering::SeqCst);
        let mgr = PowerManager::new(Box::new(backend));
        assert!(!mgr.wake_flags().contains(WakeFlags::PIR_HIGH));
    }

    #[test]
    fn standby_short_circuits_below_advance_offset() {
        let mgr = PowerManager::new(Box::new(FakeBackend::default()));
        let req = WakeRequest {
            flags: WakeFlags::RTC_TIMING,
            rtc: RtcWakeupConfig { wakeup_time_s: 1, ..Default::default() },
        };
        // Below-margin sleep resolves immediately via n6_restart, not a real
        // standby entry; n6_restart's sleeps make this slow, so just assert
        // on the outcome, not wall time.
        let result = mgr.enter_standby(req);
        assert!(result.is_ok());
        assert!(mgr.wake_flags().contains(WakeFlags::RTC_TIMING));
    }
}
