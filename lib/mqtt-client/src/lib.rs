// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT 3.1.1 client riding on [`net_core`] (spec §4 "MQTT Client"),
//! grounded in
//! `examples/original_source/Custom/Hal/Network/mqtt_client/ms_mqtt_client.c`.
//! Packet encode/decode is delegated to `mqttbytes`; this crate owns
//! connection-phase sequencing, the outbox, and keep-alive.

mod client;
mod config;
mod error;
mod event;
mod ids;
mod outbox;
mod state;

pub use client::{MqttClient, PING_TRIES};
pub use config::{Auth, LastWillConfig, MqttConfig, NetworkConfig, TaskConfig, TlsAuth, DEFAULT_BUFFER_SIZE};
pub use error::{Error, Result};
pub use event::MqttEvent;
pub use ids::MsgIdAllocator;
pub use outbox::{MsgType, Outbox, OutboxEntry, OutboxPayload, PendingState};
pub use state::MqttState;

pub use mqttbytes::QoS;
