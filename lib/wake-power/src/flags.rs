// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bitflags::bitflags;

bitflags! {
    /// Power rail switch bits, verbatim from `pwr_manager.h`'s
    /// `PWR_*_SWITCH_BIT` defines.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PowerRail: u32 {
        const THREE_V3 = 1 << 0;
        const WIFI     = 1 << 1;
        const AON      = 1 << 2;
        const N6_MAIN  = 1 << 3;
        const EXT      = 1 << 4;
    }
}

impl PowerRail {
    /// `PWR_DEFAULT_SWITCH_BITS`: what stays on across a STOP2 entry unless
    /// the caller asks for something else.
    pub const DEFAULT: PowerRail =
        PowerRail::THREE_V3.union(PowerRail::AON).union(PowerRail::N6_MAIN);
}

bitflags! {
    /// Decoded wake-cause bitmask, bit positions verbatim from
    /// `pwr_manager.h`'s `PWR_WAKEUP_FLAG_*` defines.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WakeFlags: u32 {
        const STANDBY_EXIT = 1 << 0;
        const STOP2_EXIT   = 1 << 1;
        const RTC_TIMING   = 1 << 2;
        const RTC_ALARM_A  = 1 << 3;
        const RTC_ALARM_B  = 1 << 4;
        const CONFIG_KEY   = 1 << 5;
        const PIR_HIGH     = 1 << 6;
        const PIR_LOW      = 1 << 7;
        const PIR_RISING   = 1 << 8;
        const PIR_FALLING  = 1 << 9;
        const WIFI_IRQ     = 1 << 10;
        const NET_IRQ      = 1 << 11;
        const WDG          = 1 << 30;
        /// Set once the flags have been through a full decode pass; used to
        /// serve cached reads without re-touching hardware registers.
        const VALID        = 1 << 31;
    }
}
