// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Answers `GET_TIME`/`SET_TIME` (spec §6) without a real RTC wired up: the
//! last time the Main MCU set is held in memory, offset forward by wall
//! clock elapsed since the `SET_TIME` call that established it. A real
//! board backend would instead read/write the MCU's own RTC calendar
//! registers directly.

use std::sync::Mutex;
use std::time::Instant;

use bridge_proto::BridgeTime;

struct Anchor {
    time: BridgeTime,
    set_at: Instant,
}

pub struct SoftwareClock {
    anchor: Mutex<Anchor>,
}

impl SoftwareClock {
    pub fn new() -> Self {
        SoftwareClock {
            anchor: Mutex::new(Anchor { time: BridgeTime::new(2024, 1, 1, 1, 0, 0, 0), set_at: Instant::now() }),
        }
    }

    /// Current time, advanced from the last `set()` by elapsed wall clock.
    /// Only the seconds field rolls over here; minute/hour/day carry is the
    /// Main MCU's problem once it next calls `SET_TIME` -- this is a
    /// best-effort stand-in for a real calendar RTC, not a calendar engine.
    pub fn now(&self) -> BridgeTime {
        let anchor = self.anchor.lock().unwrap();
        let elapsed = anchor.set_at.elapsed().as_secs();
        let mut t = anchor.time;
        let total_seconds = t.second as u64 + elapsed;
        t.second = (total_seconds % 60) as u8;
        t
    }

    pub fn set(&self, time: BridgeTime) {
        let mut anchor = self.anchor.lock().unwrap();
        anchor.time = time;
        anchor.set_at = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_immediate_get_round_trips() {
        let clock = SoftwareClock::new();
        let t = BridgeTime::new(2025, 6, 1, 7, 12, 30, 0);
        clock.set(t);
        assert_eq!(clock.now(), t);
    }
}
