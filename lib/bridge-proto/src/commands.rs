// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Packed, little-endian payload layouts for the well-known commands in
//! spec §6, grounded in `ms_bridging.h` / `pwr_manager.h`
//! (`examples/original_source/WakeCore/...`).

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// RTC time record. Scenario A in spec §8 pins this to a 9-byte wire
/// representation (year as u16 + 6 single-byte fields + one reserved byte);
/// the original C struct is 8 bytes without the trailing reserved byte --
/// this port keeps the 9th byte (always zero on the wire) so the frame
/// matches the documented external interface exactly. See DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C, packed)]
pub struct BridgeTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub reserved: u8,
}

impl BridgeTime {
    pub fn new(year: u16, month: u8, day: u8, weekday: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self { year, month, day, weekday, hour, minute, second, reserved: 0 }
    }
}

/// Absolute RTC alarm. `week_day` takes priority over `date` when both are
/// set and `is_valid != 0` (spec §4.1 "prefer weekday over day-of-month").
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C, packed)]
pub struct RtcAlarm {
    pub is_valid: u8,
    pub week_day: u8,
    pub date: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl RtcAlarm {
    pub const DISABLED: RtcAlarm = RtcAlarm { is_valid: 0, week_day: 0, date: 0, hour: 0, minute: 0, second: 0 };

    pub fn uses_weekday(&self) -> bool {
        self.is_valid != 0 && self.week_day != 0
    }
}

/// Power mode requested in a `PWR_CTRL` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerMode {
    Normal = 0,
    Standby = 1,
    Stop2 = 2,
}

/// `PWR_CTRL` request payload: power-control record -> no response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C, packed)]
pub struct PowerCtrl {
    pub power_mode: u8,
    pub switch_bits: u32,
    pub wakeup_flags: u32,
    pub sleep_second: u32,
    pub alarm_a: RtcAlarm,
    pub alarm_b: RtcAlarm,
}

/// `PIR_CFG` request payload (9 bytes), result is a `u32` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C, packed)]
pub struct PirConfig {
    pub sensitivity_level: u8,
    pub ignore_time_s: u8,
    pub pulse_count: u8,
    pub window_time_s: u8,
    pub motion_enable: u8,
    pub interrupt_src: u8,
    pub volt_select: u8,
    pub reserved1: u8,
    pub reserved2: u8,
}

/// `GET_VERSION` response payload (16 bytes: four little-endian i32s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C, packed)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
    pub build: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    #[test]
    fn time_matches_scenario_a_wire_bytes() {
        let t = BridgeTime::new(2024, 1, 15, 1, 10, 30, 45);
        assert_eq!(
            t.as_bytes(),
            &[0xE8, 0x07, 0x01, 0x0F, 0x01, 0x0A, 0x1E, 0x2D, 0x00]
        );
    }

    #[test]
    fn power_ctrl_is_25_bytes() {
        assert_eq!(core::mem::size_of::<PowerCtrl>(), 25);
    }

    #[test]
    fn version_is_16_bytes() {
        assert_eq!(core::mem::size_of::<Version>(), 16);
    }
}
