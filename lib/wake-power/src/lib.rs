// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power-rail control, deep-sleep entry (STANDBY/STOP2), and wake-flag
//! decoding for the Wake MCU, per spec §4.2. Grounded in
//! `examples/original_source/WakeCore/Custom/Components/pwr_manager/`.

mod backend;
mod error;
mod flags;
mod manager;

pub use backend::{AlarmSlot, PowerBackend};
pub use error::{Error, Result};
pub use flags::{PowerRail, WakeFlags};
pub use manager::{PowerManager, RtcWakeupConfig, WakeRequest, RTC_WAKEUP_ADV_OFFSET_S, RTC_WAKEUP_MAX_TIME_S};
