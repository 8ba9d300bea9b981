// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Runtime configuration for the Main MCU image, built from environment
//! variables the way the out-of-scope JSON config store (spec §1, §6) would
//! hand them to this binary at boot. `mqtt_client::MqttConfig` itself stays
//! a plain struct with `Default`; this module is the one place that reads
//! the environment and fills it in, matching SPEC_FULL.md §2's "the library
//! never reads a file itself".

use mqtt_client::{MqttConfig, NetworkConfig};

/// Everything this binary needs beyond what `mqtt_client`/`bridge_proto`
/// already default: which UART the Wake MCU bridge lives on, and the MQTT
/// broker to report telemetry to.
pub struct AppConfig {
    pub bridge_port: String,
    pub bridge_baud: u32,
    pub mqtt: MqttConfig,
    pub telemetry_topic: String,
    pub telemetry_interval_s: u64,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut mqtt = MqttConfig {
            hostname: env_or("MQTT_HOST", "localhost"),
            port: env_parse("MQTT_PORT", 1883),
            client_id: env_or("MQTT_CLIENT_ID", "camera-node"),
            ..MqttConfig::default()
        };
        mqtt.network = NetworkConfig {
            timeout_ms: env_parse("MQTT_TIMEOUT_MS", mqtt.network.timeout_ms),
            reconnect_interval_ms: env_parse("MQTT_RECONNECT_INTERVAL_MS", mqtt.network.reconnect_interval_ms),
            ..mqtt.network
        };

        AppConfig {
            bridge_port: env_or("BRIDGE_PORT", "/dev/ttyS0"),
            bridge_baud: env_parse("BRIDGE_BAUD", 115_200),
            mqtt,
            telemetry_topic: env_or("TELEMETRY_TOPIC", "camera-node/telemetry"),
            telemetry_interval_s: env_parse("TELEMETRY_INTERVAL_S", 60),
        }
    }
}
