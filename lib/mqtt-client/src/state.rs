// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// The MQTT protocol state (spec §3 "MQTT protocol state"), matching the
/// original's `ms_mqtt_state_t` four-phase cycle (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttState {
    Stopped,
    Starting,
    Connected,
    WaitingReconnect,
    Disconnected,
}
