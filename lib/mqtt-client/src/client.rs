// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The MQTT client state machine (spec §4.4), grounded in
//! `examples/original_source/Custom/Hal/Network/mqtt_client/ms_mqtt_client.c`
//! for the four-phase run loop, outbox service, and keepalive cadence, and
//! riding on [`net_core::NetHandle`] for the transport. Packet encode/decode
//! is delegated to `mqttbytes` (spec §6 "Serialisation ... is delegated to a
//! third-party packet codec") -- this module owns only dispatch, outbox and
//! keepalive policy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use mqttbytes::v4::{
    self, ConnAck, Connect, ConnectReturnCode, LastWill, Login, Packet, PubAck, PubComp, PubRec, PubRel, Publish,
    Subscribe, SubscribeFilter, Unsubscribe,
};
use mqttbytes::{Protocol, QoS};

use net_core::{NetHandle, TlsMaterial};

use crate::config::MqttConfig;
use crate::error::{Error, Result};
use crate::event::MqttEvent;
use crate::ids::MsgIdAllocator;
use crate::outbox::{MsgType, Outbox, OutboxEntry, OutboxPayload, PendingState};
use crate::state::MqttState;

/// PINGREQs sent without a PINGRESP before the connection is declared dead
/// (spec §4.4 "Service keep-alive"). Not pinned to a specific value in the
/// distilled spec; chosen to match common MQTT client defaults (see
/// DESIGN.md).
pub const PING_TRIES: u32 = 3;

/// How long the connected-phase loop blocks on a single `recv` before
/// looping back to service the outbox and keepalive (spec §4.4 "bounded by
/// a short block tick").
const CONNECTED_TICK_MS: u64 = 200;

const MAX_INCOMING_PACKET_SIZE: usize = 256 * 1024;

type EventHandler = Box<dyn Fn(&MqttEvent) + Send + Sync>;
/// Bound on the event-handler vector (spec §3 "event-handler vector of
/// bounded size"), mirroring `MS_MQTT_CLIENT_MAX_EVENT_FUNC_SIZE`.
const MAX_EVENT_HANDLERS: usize = 4;

struct Inner {
    state: MqttState,
    outbox: Outbox,
    ids: MsgIdAllocator,
    rx_buf: BytesMut,
    last_activity: Instant,
    ping_pending: u32,
}

/// The per-connection MQTT client (spec §3 "MQTT client state"). One worker
/// thread drives [`MqttClient::run`]; `publish`/`subscribe`/`unsubscribe`
/// and the force-* signals may be called from any thread.
pub struct MqttClient {
    config: MqttConfig,
    net: NetHandle,
    inner: Mutex<Inner>,
    handlers: Mutex<Vec<EventHandler>>,
    run: AtomicBool,
    force_reconnect: AtomicBool,
    force_disconnect: AtomicBool,
}

impl MqttClient {
    /// Constructs a client. The network handle is created but not
    /// connected; `run()` drives the actual connection lifecycle. TLS
    /// material, if any, is parsed once here (spec §4.4 "parses TLS
    /// material once").
    pub fn new(config: MqttConfig, tls_material: Option<TlsMaterial>) -> Result<Self> {
        let net = NetHandle::init(tls_material)?;
        let outbox = Outbox::new(config.network.outbox_limit);
        let rx_capacity = config.network.resolved_rx_buf_size();
        Ok(MqttClient {
            config,
            net,
            inner: Mutex::new(Inner {
                state: MqttState::Stopped,
                outbox,
                ids: MsgIdAllocator::new(),
                rx_buf: BytesMut::with_capacity(rx_capacity),
                last_activity: Instant::now(),
                ping_pending: 0,
            }),
            handlers: Mutex::new(Vec::new()),
            run: AtomicBool::new(true),
            force_reconnect: AtomicBool::new(false),
            force_disconnect: AtomicBool::new(false),
        })
    }

    /// Registers an event callback, fired from the worker thread; handlers
    /// should not block (spec §5 "Interrupt-context callers" applies the
    /// same discipline to this callback list). Silently dropped once
    /// `MAX_EVENT_HANDLERS` is reached, mirroring the original's fixed-size
    /// `event_handler_list`.
    pub fn add_event_handler(&self, handler: impl Fn(&MqttEvent) + Send + Sync + 'static) {
        let mut handlers = self.handlers.lock().unwrap();
        if handlers.len() < MAX_EVENT_HANDLERS {
            handlers.push(Box::new(handler));
        } else {
            log::error!("mqtt: event handler list full, dropping registration");
        }
    }

    fn emit(&self, event: MqttEvent) {
        for handler in self.handlers.lock().unwrap().iter() {
            handler(&event);
        }
    }

    pub fn state(&self) -> MqttState {
        self.inner.lock().unwrap().state
    }

    /// Enqueue a PUBLISH (spec §4.4 "Outbox policy: Enqueue on
    /// publish/subscribe/unsubscribe"). Returns the allocated msg id (0 for
    /// QoS 0, which mqttbytes still assigns a real pkid to internally but
    /// which is never surfaced to the caller since a QoS-0 publish is never acked).
    pub fn publish(&self, topic: impl Into<String>, qos: QoS, retain: bool, payload: impl Into<Vec<u8>>) -> Result<u16> {
        if !self.run.load(Ordering::SeqCst) {
            return Err(Error::InvalidState);
        }
        let mut inner = self.inner.lock().unwrap();
        let msg_id = inner.ids.next();
        let entry = OutboxEntry {
            msg_id,
            msg_type: MsgType::Publish,
            qos,
            payload: OutboxPayload::Publish { topic: topic.into(), payload: payload.into(), retain },
            enqueued_at: Instant::now(),
            last_sent_at: Instant::now(),
            state: PendingState::Queued,
        };
        inner.outbox.push(entry).ok_or(Error::OutboxFull)?;
        Ok(msg_id)
    }

    pub fn subscribe(&self, filters: Vec<(String, QoS)>) -> Result<u16> {
        if !self.run.load(Ordering::SeqCst) {
            return Err(Error::InvalidState);
        }
        let mut inner = self.inner.lock().unwrap();
        let msg_id = inner.ids.next();
        let filters = filters.into_iter().map(|(path, qos)| SubscribeFilter { path, qos }).collect();
        let entry = OutboxEntry {
            msg_id,
            msg_type: MsgType::Subscribe,
            qos: QoS::AtLeastOnce,
            payload: OutboxPayload::Subscribe { filters },
            enqueued_at: Instant::now(),
            last_sent_at: Instant::now(),
            state: PendingState::Queued,
        };
        inner.outbox.push(entry).ok_or(Error::OutboxFull)?;
        Ok(msg_id)
    }

    pub fn unsubscribe(&self, topics: Vec<String>) -> Result<u16> {
        if !self.run.load(Ordering::SeqCst) {
            return Err(Error::InvalidState);
        }
        let mut inner = self.inner.lock().unwrap();
        let msg_id = inner.ids.next();
        let entry = OutboxEntry {
            msg_id,
            msg_type: MsgType::Unsubscribe,
            qos: QoS::AtLeastOnce,
            payload: OutboxPayload::Unsubscribe { topics },
            enqueued_at: Instant::now(),
            last_sent_at: Instant::now(),
            state: PendingState::Queued,
        };
        inner.outbox.push(entry).ok_or(Error::OutboxFull)?;
        Ok(msg_id)
    }

    pub fn outbox_len(&self) -> usize {
        self.inner.lock().unwrap().outbox.len()
    }

    /// Sets a bit the run loop checks every iteration (spec §5 "MQTT
    /// supports force-disconnect and force-stop"); tears the connection
    /// down and immediately re-enters `Starting`.
    pub fn force_reconnect(&self) {
        self.force_reconnect.store(true, Ordering::SeqCst);
    }

    /// Disconnects cleanly and stops attempting to reconnect until
    /// `force_reconnect` is called again.
    pub fn force_disconnect(&self) {
        self.force_disconnect.store(true, Ordering::SeqCst);
    }

    /// Stops the run loop permanently (spec §5 "force-stop").
    pub fn stop(&self) {
        self.run.store(false, Ordering::SeqCst);
    }

    /// Drives the four-phase cycle described in spec §4.4 until `stop()` is
    /// called. Meant to be run on its own worker thread (spec §5 "one MQTT
    /// client thread per handler").
    pub fn run(&self) {
        let mut state = MqttState::Starting;
        self.inner.lock().unwrap().state = state;
        while self.run.load(Ordering::SeqCst) {
            state = match state {
                MqttState::Starting => self.phase_starting(),
                MqttState::Connected => self.phase_connected(),
                MqttState::WaitingReconnect => self.phase_waiting_reconnect(),
                MqttState::Disconnected => self.phase_disconnected(),
                MqttState::Stopped => break,
            };
            self.inner.lock().unwrap().state = state;
        }
        self.inner.lock().unwrap().state = MqttState::Stopped;
    }

    fn build_connect(&self) -> Connect {
        let protocol = if self.config.protocol_ver == 3 { Protocol::V3 } else { Protocol::V4 };
        let last_will = self.config.last_will.as_ref().map(|w| LastWill {
            topic: w.topic.clone(),
            message: w.message.clone().into(),
            qos: w.qos,
            retain: w.retain,
        });
        let login = self.config.auth.username.clone().map(|username| Login {
            username,
            password: self.config.auth.password.clone().unwrap_or_default(),
        });
        Connect {
            protocol,
            keep_alive: self.config.keepalive_s,
            client_id: self.config.client_id.clone(),
            clean_session: self.config.clean_session,
            last_will,
            login,
        }
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.config.network.timeout_ms)
    }

    /// Phase 1 (spec §4.4): connect network, send CONNECT, receive CONNACK.
    fn phase_starting(&self) -> MqttState {
        self.net.close();
        {
            let mut inner = self.inner.lock().unwrap();
            inner.rx_buf.clear();
        }

        if let Err(e) = self.net.connect(&self.config.hostname, self.config.port, self.connect_timeout()) {
            self.emit(MqttEvent::Disconnected { reason: e.to_string() });
            return MqttState::WaitingReconnect;
        }

        if let Err(e) = self.send_packet(Packet::Connect(self.build_connect())) {
            self.emit(MqttEvent::Disconnected { reason: e.to_string() });
            return MqttState::WaitingReconnect;
        }

        match self.read_packet_blocking(self.connect_timeout()) {
            Ok(Some(Packet::ConnAck(ConnAck { session_present, code }))) => {
                if code != ConnectReturnCode::Success {
                    self.emit(MqttEvent::Disconnected { reason: Error::ConnectRefused(code).to_string() });
                    return MqttState::WaitingReconnect;
                }
                let mut inner = self.inner.lock().unwrap();
                inner.last_activity = Instant::now();
                inner.ping_pending = 0;
                // Anything left TRANSMITTED from before the outage goes out
                // again immediately, with DUP=1, instead of waiting a full
                // resend interval (spec §8 Scenario F).
                inner.outbox.expedite_transmitted();
                drop(inner);
                self.emit(MqttEvent::Connected { session_present });
                MqttState::Connected
            }
            Ok(Some(_other)) => {
                self.emit(MqttEvent::Disconnected { reason: "unexpected packet before CONNACK".into() });
                MqttState::WaitingReconnect
            }
            Ok(None) => {
                self.emit(MqttEvent::Disconnected { reason: "timed out waiting for CONNACK".into() });
                MqttState::WaitingReconnect
            }
            Err(e) => {
                self.emit(MqttEvent::Disconnected { reason: e.to_string() });
                MqttState::WaitingReconnect
            }
        }
    }

    /// Phase 2 (spec §4.4): receive-and-dispatch loop, servicing the
    /// outbox and keepalive every tick.
    fn phase_connected(&self) -> MqttState {
        loop {
            if self.force_disconnect.swap(false, Ordering::SeqCst) {
                let _ = self.send_packet(Packet::Disconnect);
                self.net.close();
                return MqttState::Disconnected;
            }
            if self.force_reconnect.swap(false, Ordering::SeqCst) {
                self.net.close();
                return MqttState::Starting;
            }
            if !self.run.load(Ordering::SeqCst) {
                let _ = self.send_packet(Packet::Disconnect);
                self.net.close();
                return MqttState::Stopped;
            }

            match self.read_packet_blocking(Duration::from_millis(CONNECTED_TICK_MS)) {
                Ok(Some(packet)) => {
                    self.inner.lock().unwrap().last_activity = Instant::now();
                    if let Err(e) = self.dispatch(packet) {
                        self.emit(MqttEvent::Disconnected { reason: e.to_string() });
                        self.net.close();
                        return MqttState::WaitingReconnect;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.emit(MqttEvent::Disconnected { reason: e.to_string() });
                    self.net.close();
                    return MqttState::WaitingReconnect;
                }
            }

            if let Err(e) = self.service_outbox() {
                self.emit(MqttEvent::Disconnected { reason: e.to_string() });
                self.net.close();
                return MqttState::WaitingReconnect;
            }

            match self.service_keepalive() {
                Ok(true) => {}
                Ok(false) => {
                    self.emit(MqttEvent::Disconnected { reason: "keepalive timed out, no PINGRESP".into() });
                    self.net.close();
                    return MqttState::WaitingReconnect;
                }
                Err(e) => {
                    self.emit(MqttEvent::Disconnected { reason: e.to_string() });
                    self.net.close();
                    return MqttState::WaitingReconnect;
                }
            }
        }
    }

    /// Phase 3 (spec §4.4): sleep up to `reconnect_interval_ms`, waking
    /// early on a force-* signal, then either retry or give up.
    fn phase_waiting_reconnect(&self) -> MqttState {
        if self.config.network.disable_auto_reconnect {
            return MqttState::Disconnected;
        }
        let deadline = Instant::now() + Duration::from_millis(self.config.network.reconnect_interval_ms);
        while Instant::now() < deadline {
            if !self.run.load(Ordering::SeqCst) {
                return MqttState::Stopped;
            }
            if self.force_disconnect.swap(false, Ordering::SeqCst) {
                return MqttState::Disconnected;
            }
            if self.force_reconnect.load(Ordering::SeqCst) {
                self.force_reconnect.store(false, Ordering::SeqCst);
                break;
            }
            std::thread::sleep(Duration::from_millis(50).min(deadline.saturating_duration_since(Instant::now())));
        }
        MqttState::Starting
    }

    /// Phase 4 (spec §4.4): idle until a force-reconnect signal arrives.
    fn phase_disconnected(&self) -> MqttState {
        while self.run.load(Ordering::SeqCst) {
            if self.force_reconnect.swap(false, Ordering::SeqCst) {
                return MqttState::Starting;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        MqttState::Stopped
    }

    /// Removes a matching outbox entry, logging [`Error::NotFound`] when the
    /// ack correlates to nothing we have queued (a duplicate broker ack, or
    /// one that arrived after our own `take_expired` already dropped it).
    /// The terminal event still fires either way -- the peer considers the
    /// exchange closed regardless of what our outbox thinks.
    fn remove_or_warn(&self, msg_id: u16, msg_type: MsgType) {
        if self.inner.lock().unwrap().outbox.remove(msg_id, msg_type).is_none() {
            log::warn!("mqtt: {}", Error::NotFound);
        }
    }

    fn dispatch(&self, packet: Packet) -> Result<()> {
        match packet {
            Packet::SubAck(ack) => {
                self.remove_or_warn(ack.pkid, MsgType::Subscribe);
                self.emit(MqttEvent::Subscribed { msg_id: ack.pkid });
            }
            Packet::UnsubAck(ack) => {
                self.remove_or_warn(ack.pkid, MsgType::Unsubscribe);
                self.emit(MqttEvent::Unsubscribed { msg_id: ack.pkid });
            }
            Packet::Publish(p) => self.handle_incoming_publish(p)?,
            Packet::PubAck(PubAck { pkid }) => {
                self.remove_or_warn(pkid, MsgType::Publish);
                self.emit(MqttEvent::Published { msg_id: pkid });
            }
            Packet::PubRec(PubRec { pkid }) => {
                self.inner.lock().unwrap().outbox.mark_acknowledged(pkid, MsgType::Publish);
                self.send_packet(Packet::PubRel(PubRel { pkid }))?;
            }
            Packet::PubRel(PubRel { pkid }) => {
                // We are the receiver of a QoS-2 PUBLISH here; respond with
                // PUBCOMP to close out that (unrelated) inbound exchange.
                self.send_packet(Packet::PubComp(PubComp { pkid }))?;
            }
            Packet::PubComp(PubComp { pkid }) => {
                self.remove_or_warn(pkid, MsgType::Publish);
                self.emit(MqttEvent::Published { msg_id: pkid });
            }
            Packet::PingResp => {
                self.inner.lock().unwrap().ping_pending = 0;
            }
            other => {
                log::warn!("mqtt: unexpected packet in connected phase: {other:?}");
            }
        }
        Ok(())
    }

    fn handle_incoming_publish(&self, p: Publish) -> Result<()> {
        let topic = p.topic.clone();
        let payload = p.payload.to_vec();
        self.emit(MqttEvent::Data { topic, payload, qos: p.qos, retain: p.retain });
        match p.qos {
            QoS::AtMostOnce => {}
            QoS::AtLeastOnce => self.send_packet(Packet::PubAck(PubAck { pkid: p.pkid }))?,
            QoS::ExactlyOnce => self.send_packet(Packet::PubRec(PubRec { pkid: p.pkid }))?,
        }
        Ok(())
    }

    /// Sends every `Queued` entry, retransmits `Transmitted` entries that
    /// are due, and expires entries past `outbox_expired_timeout` (spec
    /// §4.4 "Outbox policy").
    fn service_outbox(&self) -> Result<()> {
        let queued = self.inner.lock().unwrap().outbox.queued();
        for (msg_id, msg_type) in queued {
            let (qos, wire) = {
                let inner = self.inner.lock().unwrap();
                let entry = match inner.outbox.get(msg_id, msg_type) {
                    Some(e) => e,
                    None => continue,
                };
                (entry.qos, self.encode_entry(entry, false)?)
            };
            self.net.send(&wire, self.connect_timeout())?;
            let mut inner = self.inner.lock().unwrap();
            if msg_type == MsgType::Publish && qos == QoS::AtMostOnce {
                inner.outbox.remove(msg_id, msg_type);
                drop(inner);
                self.emit(MqttEvent::Published { msg_id });
            } else {
                inner.outbox.mark_transmitted(msg_id, msg_type);
            }
        }

        let resend_interval = Duration::from_millis(self.config.network.outbox_resend_interval_ms);
        let due = self.inner.lock().unwrap().outbox.due_for_resend(resend_interval);
        for (msg_id, msg_type) in due {
            let wire = {
                let inner = self.inner.lock().unwrap();
                match inner.outbox.get(msg_id, msg_type) {
                    Some(entry) => self.encode_entry(entry, true)?,
                    None => continue,
                }
            };
            self.net.send(&wire, self.connect_timeout())?;
            self.inner.lock().unwrap().outbox.mark_transmitted(msg_id, msg_type);
        }

        let expiry = Duration::from_millis(self.config.network.outbox_expired_timeout_ms);
        let expired = self.inner.lock().unwrap().outbox.take_expired(expiry);
        for msg_id in expired {
            self.emit(MqttEvent::Deleted { msg_id });
        }
        Ok(())
    }

    fn encode_entry(&self, entry: &OutboxEntry, dup: bool) -> Result<Vec<u8>> {
        let packet = match &entry.payload {
            OutboxPayload::Publish { topic, payload, retain } => Packet::Publish(Publish {
                dup,
                qos: entry.qos,
                retain: *retain,
                topic: topic.clone(),
                pkid: entry.msg_id,
                payload: payload.clone().into(),
            }),
            OutboxPayload::Subscribe { filters } => {
                Packet::Subscribe(Subscribe { pkid: entry.msg_id, filters: filters.clone() })
            }
            OutboxPayload::Unsubscribe { topics } => {
                Packet::Unsubscribe(Unsubscribe { pkid: entry.msg_id, topics: topics.clone() })
            }
        };
        encode_packet(&packet, self.config.network.resolved_tx_buf_size())
    }

    /// If half the keepalive interval has elapsed since the last observed
    /// traffic, send a PINGREQ; if `PING_TRIES` have gone unanswered within
    /// `timeout_ms` each, return `Ok(false)` so the caller disconnects
    /// (spec §4.4 "Service keep-alive").
    fn service_keepalive(&self) -> Result<bool> {
        let half_keepalive = Duration::from_secs(self.config.keepalive_s as u64 / 2).max(Duration::from_secs(1));
        let timeout = Duration::from_millis(self.config.network.timeout_ms);

        let (since_activity, pending) = {
            let inner = self.inner.lock().unwrap();
            (Instant::now().duration_since(inner.last_activity), inner.ping_pending)
        };

        if pending > 0 {
            if since_activity >= timeout {
                if pending >= PING_TRIES {
                    return Ok(false);
                }
                self.send_packet(Packet::PingReq)?;
                let mut inner = self.inner.lock().unwrap();
                inner.ping_pending += 1;
                inner.last_activity = Instant::now();
            }
            return Ok(true);
        }

        if since_activity >= half_keepalive {
            self.send_packet(Packet::PingReq)?;
            let mut inner = self.inner.lock().unwrap();
            inner.ping_pending = 1;
        }
        Ok(true)
    }

    fn send_packet(&self, packet: Packet) -> Result<()> {
        let bytes = encode_packet(&packet, self.config.network.resolved_tx_buf_size())?;
        self.net.send(&bytes, self.connect_timeout())?;
        Ok(())
    }

    /// Reads and assembles exactly one packet, blocking up to `timeout`
    /// total. Returns `Ok(None)` on a clean timeout with nothing assembled.
    fn read_packet_blocking(&self, timeout: Duration) -> Result<Option<Packet>> {
        let deadline = Instant::now() + timeout;
        let mut scratch = vec![0u8; self.config.network.resolved_rx_buf_size()];
        loop {
            {
                let mut inner = self.inner.lock().unwrap();
                match v4::read(&mut inner.rx_buf, MAX_INCOMING_PACKET_SIZE) {
                    Ok(packet) => return Ok(Some(packet)),
                    Err(mqttbytes::Error::InsufficientBytes(_)) => {}
                    Err(e) => return Err(Error::Mqtt(e)),
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let slice = remaining.min(Duration::from_millis(CONNECTED_TICK_MS));
            match self.net.recv(&mut scratch, slice) {
                Ok(n) => {
                    self.inner.lock().unwrap().rx_buf.extend_from_slice(&scratch[..n]);
                }
                Err(net_core::Error::Timeout) => {}
                Err(e) => return Err(Error::Net(e)),
            }
        }
    }
}

// PINGREQ, PINGRESP and DISCONNECT carry no variable header or payload, so
// their wire form is the fixed two-byte sequence from MQTT 3.1.1 §3.12-3.14
// regardless of codec version; encoded directly rather than through
// `mqttbytes` to avoid depending on its unit-packet write helpers.
const PINGREQ_BYTES: [u8; 2] = [0xC0, 0x00];
const PINGRESP_BYTES: [u8; 2] = [0xD0, 0x00];
const DISCONNECT_BYTES: [u8; 2] = [0xE0, 0x00];

/// `capacity` is the resolved `tx_buf_size`/`buffer_size` (spec §6), used
/// only as the initial allocation -- `BytesMut` still grows past it for a
/// packet larger than the configured hint.
fn encode_packet(packet: &Packet, capacity: usize) -> Result<Vec<u8>> {
    let mut buf = BytesMut::with_capacity(capacity);
    match packet {
        Packet::Connect(p) => {
            p.write(&mut buf).map_err(Error::Mqtt)?;
        }
        Packet::ConnAck(p) => {
            p.write(&mut buf).map_err(Error::Mqtt)?;
        }
        Packet::Publish(p) => {
            p.write(&mut buf).map_err(Error::Mqtt)?;
        }
        Packet::PubAck(p) => {
            p.write(&mut buf).map_err(Error::Mqtt)?;
        }
        Packet::PubRec(p) => {
            p.write(&mut buf).map_err(Error::Mqtt)?;
        }
        Packet::PubRel(p) => {
            p.write(&mut buf).map_err(Error::Mqtt)?;
        }
        Packet::PubComp(p) => {
            p.write(&mut buf).map_err(Error::Mqtt)?;
        }
        Packet::Subscribe(p) => {
            p.write(&mut buf).map_err(Error::Mqtt)?;
        }
        Packet::SubAck(p) => {
            p.write(&mut buf).map_err(Error::Mqtt)?;
        }
        Packet::Unsubscribe(p) => {
            p.write(&mut buf).map_err(Error::Mqtt)?;
        }
        Packet::UnsubAck(p) => {
            p.write(&mut buf).map_err(Error::Mqtt)?;
        }
        Packet::PingReq => buf.extend_from_slice(&PINGREQ_BYTES),
        Packet::PingResp => buf.extend_from_slice(&PINGRESP_BYTES),
        Packet::Disconnect => buf.extend_from_slice(&DISCONNECT_BYTES),
    }
    Ok(buf.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LastWillConfig, MqttConfig, NetworkConfig};

    fn test_config(outbox_limit: usize) -> MqttConfig {
        MqttConfig {
            hostname: "127.0.0.1".into(),
            port: 1,
            client_id: "test-client".into(),
            network: NetworkConfig { outbox_limit, ..NetworkConfig::default() },
            ..MqttConfig::default()
        }
    }

    #[test]
    fn publish_enqueues_and_reports_outbox_len() {
        let client = MqttClient::new(test_config(4), None).unwrap();
        let id = client.publish("t/1", QoS::AtLeastOnce, false, b"hello".to_vec()).unwrap();
        assert!(id != 0);
        assert_eq!(client.outbox_len(), 1);
    }

    #[test]
    fn publish_fails_fast_over_outbox_limit() {
        let client = MqttClient::new(test_config(1), None).unwrap();
        client.publish("t/1", QoS::AtLeastOnce, false, b"a".to_vec()).unwrap();
        let result = client.publish("t/2", QoS::AtLeastOnce, false, b"b".to_vec());
        assert!(matches!(result, Err(Error::OutboxFull)));
    }

    #[test]
    fn publish_after_stop_is_invalid_state() {
        let client = MqttClient::new(test_config(4), None).unwrap();
        client.stop();
        let result = client.publish("t/1", QoS::AtLeastOnce, false, b"a".to_vec());
        assert!(matches!(result, Err(Error::InvalidState)));
        assert!(matches!(client.subscribe(vec![("t/1".into(), QoS::AtLeastOnce)]), Err(Error::InvalidState)));
        assert!(matches!(client.unsubscribe(vec!["t/1".into()]), Err(Error::InvalidState)));
    }

    #[test]
    fn puback_removes_matching_publish_and_emits_published() {
        let client = MqttClient::new(test_config(4), None).unwrap();
        let msg_id = client.publish("t/1", QoS::AtLeastOnce, false, b"hello".to_vec()).unwrap();
        {
            let mut inner = client.inner.lock().unwrap();
            inner.outbox.mark_transmitted(msg_id, MsgType::Publish);
        }
        client.dispatch(Packet::PubAck(PubAck { pkid: msg_id })).unwrap();
        assert_eq!(client.outbox_len(), 0);
    }

    #[test]
    fn last_will_config_is_carried_into_connect() {
        let mut config = test_config(4);
        config.last_will = Some(LastWillConfig {
            topic: "lwt".into(),
            message: b"bye".to_vec(),
            qos: QoS::AtLeastOnce,
            retain: true,
        });
        let client = MqttClient::new(config, None).unwrap();
        let connect = client.build_connect();
        assert!(connect.last_will.is_some());
    }

    #[test]
    fn protocol_ver_selects_the_wire_protocol() {
        let mut config = test_config(4);
        config.protocol_ver = 3;
        let client = MqttClient::new(config, None).unwrap();
        assert_eq!(client.build_connect().protocol, Protocol::V3);

        let mut config = test_config(4);
        config.protocol_ver = 4;
        let client = MqttClient::new(config, None).unwrap();
        assert_eq!(client.build_connect().protocol, Protocol::V4);
    }
}
