// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bridge_proto::RtcAlarm;

use crate::flags::{PowerRail, WakeFlags};

/// Which hardware alarm slot a [`RtcAlarm`] is being programmed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmSlot {
    A,
    B,
}

/// Everything [`crate::PowerManager`] needs from the MCU: rail GPIOs, the
/// RTC wake-up timer and alarms, the backup register, and the standby/stop2
/// sleep instructions themselves. One impl per board; tests use a fake.
///
/// Grounded in `pwr_manager.c`'s direct `HAL_GPIO_*`/`HAL_RTCEx_*` calls --
/// this trait is the seam where that HAL access used to be inline.
pub trait PowerBackend: Send + Sync {
    fn set_rail(&self, rail: PowerRail, on: bool);
    fn get_rails(&self) -> PowerRail;

    /// Put every rail pin not in `kept` into analog/high-impedance mode
    /// ahead of a STOP2 entry.
    fn hi_z_non_kept_rails(&self, kept: PowerRail);
    /// Restore normal GPIO push-pull drive on every rail pin after STOP2 wake.
    fn restore_rail_drive(&self, kept: PowerRail);

    fn arm_config_key_wakeup(&self);
    /// `pir_high`/`pir_low` are mutually exclusive per spec §4.2; callers
    /// resolve that before reaching the backend.
    fn arm_pir_wakeup(&self, pir_high: bool, pir_low: bool);

    fn program_rtc_wakeup_timer(&self, seconds_minus_advance: u16);
    fn disable_rtc_wakeup_timer(&self);
    fn program_rtc_alarm(&self, slot: AlarmSlot, alarm: RtcAlarm);
    fn disable_rtc_alarm(&self, slot: AlarmSlot);

    fn write_backup_register(&self, value: u32);
    fn read_backup_register(&self) -> u32;

    /// Bits set by the MCU's own reset-cause/PWR-flag registers (standby
    /// exit, stop2 exit, config-key pin, PIR edge pin, IWDG reset, ...),
    /// already shaped into [`WakeFlags`]. Reading clears the underlying
    /// hardware flags, matching `pwr_get_wakeup_flags`'s `__HAL_PWR_CLEAR_FLAG`
    /// calls.
    fn read_and_clear_reset_cause(&self) -> WakeFlags;

    /// De-init the UARTs used by the bridging link ahead of STOP2 (their
    /// clocks are not available during stop2).
    fn deinit_bridge_uart(&self);
    /// Restore system clocks and re-init the bridging UART after STOP2 wake.
    fn reinit_bridge_uart(&self);

    /// Enter STANDBY. Per spec §4.2 this normally does not return; it may
    /// return (sleep entry failed) in which case the caller retries.
    fn enter_standby(&self);
    /// Enter STOP2 and block until the MCU wakes; returns once hardware has
    /// resumed (clocks are NOT yet reconfigured -- the manager does that).
    fn enter_stop2(&self);

    fn set_n6_reset_line(&self, asserted: bool);
    fn usb_vin_active(&self) -> bool;
}
