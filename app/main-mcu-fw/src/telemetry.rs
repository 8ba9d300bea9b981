// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polls the Wake MCU over the bridging link for its wake-cause flags and
//! publishes them to the broker. This is the one place in this repository
//! where the bridging client role (spec §4.1 "Outbound -- request") and the
//! MQTT publish path (spec §4.4) meet; everything either side does is
//! exercised elsewhere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_proto::BridgeHandler;
use mqtt_client::{MqttClient, QoS};

pub fn run(bridge: Arc<BridgeHandler>, mqtt: Arc<MqttClient>, topic: String, interval: Duration, stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        match bridge.wake_flag() {
            Ok(flags) => {
                let payload = format!(r#"{{"wake_flags":{flags}}}"#);
                match mqtt.publish(topic.clone(), QoS::AtLeastOnce, false, payload.into_bytes()) {
                    Ok(msg_id) => log::debug!("telemetry: published wake flags as msg id {msg_id}"),
                    Err(e) => log::warn!("telemetry: failed to enqueue publish: {e}"),
                }
            }
            Err(e) => log::warn!("telemetry: GET_WKUP_FLAG failed: {e}"),
        }

        let mut slept = Duration::ZERO;
        while slept < interval && !stop.load(Ordering::Acquire) {
            let step = Duration::from_millis(200).min(interval - slept);
            std::thread::sleep(step);
            slept += step;
        }
    }
}
