// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use net_core::PemSource;

/// Default `buffer_size` (spec §6) that the zero-valued network tunables
/// fall back to.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Optional username/password and TLS material for the connection (spec §6
/// "authentication"). `tls` is `None` for a plaintext broker.
#[derive(Debug, Clone, Default)]
pub struct Auth {
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: Option<TlsAuth>,
}

#[derive(Debug, Clone)]
pub struct TlsAuth {
    pub ca: Option<PemSource>,
    pub client_cert: Option<PemSource>,
    pub client_key: Option<PemSource>,
    pub verify_hostname: bool,
}

impl Default for TlsAuth {
    fn default() -> Self {
        TlsAuth { ca: None, client_cert: None, client_key: None, verify_hostname: true }
    }
}

/// Last-will-and-testament published by the broker if this client
/// disconnects uncleanly (spec §6 "last will").
#[derive(Debug, Clone)]
pub struct LastWillConfig {
    pub topic: String,
    pub message: Vec<u8>,
    pub qos: mqttbytes::QoS,
    pub retain: bool,
}

/// Priority and stack size for the client's worker thread, accepted at
/// runtime since this configuration is not known until the out-of-scope
/// config store hands it to the binary.
#[derive(Debug, Clone, Copy)]
pub struct TaskConfig {
    pub priority: u8,
    pub stack_size: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        TaskConfig { priority: 4, stack_size: 4096 }
    }
}

/// Network and outbox tunables (spec §6 "network"). A `0` here means "use
/// `buffer_size`", resolved by [`NetworkConfig::resolve`].
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    pub disable_auto_reconnect: bool,
    pub outbox_limit: usize,
    pub outbox_resend_interval_ms: u64,
    pub outbox_expired_timeout_ms: u64,
    pub reconnect_interval_ms: u64,
    pub timeout_ms: u64,
    pub tx_buf_size: usize,
    pub rx_buf_size: usize,
    pub buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            disable_auto_reconnect: false,
            outbox_limit: 32,
            outbox_resend_interval_ms: 1_000,
            outbox_expired_timeout_ms: 30_000,
            reconnect_interval_ms: 10_000,
            timeout_ms: 10_000,
            tx_buf_size: 0,
            rx_buf_size: 0,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl NetworkConfig {
    pub fn resolved_tx_buf_size(&self) -> usize {
        if self.tx_buf_size == 0 { self.buffer_size } else { self.tx_buf_size }
    }

    pub fn resolved_rx_buf_size(&self) -> usize {
        if self.rx_buf_size == 0 { self.buffer_size } else { self.rx_buf_size }
    }
}

/// Full MQTT client configuration (spec §6 "Configuration surface"),
/// constructed by the binary from the out-of-scope config store and handed
/// to the library -- the library itself never reads a file.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub protocol_ver: u8,
    pub hostname: String,
    pub port: u16,
    pub client_id: String,
    pub clean_session: bool,
    pub keepalive_s: u16,
    pub auth: Auth,
    pub last_will: Option<LastWillConfig>,
    pub task: TaskConfig,
    pub network: NetworkConfig,
}

impl Default for MqttConfig {
    fn default() -> Self {
        MqttConfig {
            protocol_ver: 4,
            hostname: String::new(),
            port: 1883,
            client_id: String::new(),
            clean_session: true,
            keepalive_s: 60,
            auth: Auth::default(),
            last_will: None,
            task: TaskConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}
