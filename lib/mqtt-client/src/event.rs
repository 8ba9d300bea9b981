// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use mqttbytes::QoS;

/// Notable occurrences the client reports to the application (spec §4.4,
/// §7 "User-visible failures ... are reported via the per-subsystem
/// callback"). Delivered from the client's worker thread; handlers should
/// not block.
#[derive(Debug, Clone)]
pub enum MqttEvent {
    Connected { session_present: bool },
    Disconnected { reason: String },
    Subscribed { msg_id: u16 },
    Unsubscribed { msg_id: u16 },
    Published { msg_id: u16 },
    Deleted { msg_id: u16 },
    Data { topic: String, payload: Vec<u8>, qos: QoS, retain: bool },
}
