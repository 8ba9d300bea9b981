// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bounded FIFO of in-flight PUBLISH/SUBSCRIBE/UNSUBSCRIBE frames (spec
//! §3 "Outbox (MQTT)", §4.4 "Outbox policy"), grounded in
//! `examples/original_source/Custom/Hal/Network/mqtt_client/ms_mqtt_client.c`'s
//! `outbox_*` calls and the `mqtt_outbox.h` entry shape they imply.

use std::time::{Duration, Instant};

use mqttbytes::v4::SubscribeFilter;
use mqttbytes::QoS;

/// What kind of packet an outbox entry is standing in for, used to match
/// incoming ack packets back to their entry (spec §3 "msg id+type").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Publish,
    Subscribe,
    Unsubscribe,
}

/// Where an entry sits in the queued -> transmitted -> acknowledged cycle
/// (spec §3 "pending-subphase").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    Queued,
    Transmitted,
    Acknowledged,
}

/// Everything needed to (re-)encode the wire packet for an entry, kept
/// instead of pre-serialised bytes so a retransmit can set the PUBLISH DUP
/// flag (spec §4.4 "with the DUP flag set for QoS-1/QoS-2 PUBLISH").
#[derive(Debug, Clone)]
pub enum OutboxPayload {
    Publish { topic: String, payload: Vec<u8>, retain: bool },
    Subscribe { filters: Vec<SubscribeFilter> },
    Unsubscribe { topics: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub msg_id: u16,
    pub msg_type: MsgType,
    pub qos: QoS,
    pub payload: OutboxPayload,
    pub enqueued_at: Instant,
    /// Last time this entry went out on the wire, used only for resend
    /// cadence. Distinct from `enqueued_at` so a steadily-retransmitting
    /// entry still ages out at `outbox_expired_timeout` (spec §4.4/§9).
    pub last_sent_at: Instant,
    pub state: PendingState,
}

/// Bounded FIFO keyed by `(msg_id, msg_type)`, per spec §3 invariant
/// ("every QoS>0 PUBLISH is in the outbox until its terminal ACK arrives")
/// and §4.4 ("Outbox policy"). Insertion order is preserved so retransmit
/// and resend scans stay FIFO (spec §5 "published messages appear on the
/// wire in outbox-FIFO order").
#[derive(Debug, Default)]
pub struct Outbox {
    entries: Vec<OutboxEntry>,
    limit: usize,
}

impl Outbox {
    pub fn new(limit: usize) -> Self {
        Outbox { entries: Vec::new(), limit }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enqueue a new entry. Fails fast with `None` if the outbox is already
    /// at `outbox_limit` (spec §4.4 "over-limit publishes/subscribes fail
    /// fast").
    pub fn push(&mut self, entry: OutboxEntry) -> Option<()> {
        if self.entries.len() >= self.limit {
            return None;
        }
        self.entries.push(entry);
        Some(())
    }

    pub fn get(&self, msg_id: u16, msg_type: MsgType) -> Option<&OutboxEntry> {
        self.entries.iter().find(|e| e.msg_id == msg_id && e.msg_type == msg_type)
    }

    fn find_mut(&mut self, msg_id: u16, msg_type: MsgType) -> Option<&mut OutboxEntry> {
        self.entries.iter_mut().find(|e| e.msg_id == msg_id && e.msg_type == msg_type)
    }

    /// Remove and return the matching entry, e.g. on a terminal ack (spec
    /// §4.4 "An entry is deleted when ... its terminal ACK arrives").
    pub fn remove(&mut self, msg_id: u16, msg_type: MsgType) -> Option<OutboxEntry> {
        let idx = self.entries.iter().position(|e| e.msg_id == msg_id && e.msg_type == msg_type)?;
        Some(self.entries.remove(idx))
    }

    /// Every currently-`Queued` entry's `(msg_id, msg_type)`, in FIFO order,
    /// without removing them. The caller sends each and then calls
    /// [`Outbox::mark_transmitted`] (or removes it outright for QoS-0).
    pub fn queued(&self) -> Vec<(u16, MsgType)> {
        self.entries.iter().filter(|e| e.state == PendingState::Queued).map(|e| (e.msg_id, e.msg_type)).collect()
    }

    pub fn mark_transmitted(&mut self, msg_id: u16, msg_type: MsgType) {
        if let Some(entry) = self.find_mut(msg_id, msg_type) {
            entry.state = PendingState::Transmitted;
            entry.last_sent_at = Instant::now();
        }
    }

    pub fn mark_acknowledged(&mut self, msg_id: u16, msg_type: MsgType) {
        if let Some(entry) = self.find_mut(msg_id, msg_type) {
            entry.state = PendingState::Acknowledged;
        }
    }

    /// Entries in `Transmitted` state whose `last_sent_at` (reset on every
    /// transmit) is at least `resend_interval` old -- candidates for a DUP
    /// retransmit (spec §4.4 "retransmitted when now - enqueue_tick >=
    /// outbox_resend_interval_ms"). `enqueued_at` itself is never touched by
    /// a retransmit, so it remains a faithful clock for `take_expired`.
    pub fn due_for_resend(&self, resend_interval: Duration) -> Vec<(u16, MsgType)> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| e.state == PendingState::Transmitted && now.duration_since(e.last_sent_at) >= resend_interval)
            .map(|e| (e.msg_id, e.msg_type))
            .collect()
    }

    /// Forces every `Transmitted` entry to look due for resend on the very
    /// next service tick, without touching `Queued`/`Acknowledged` entries.
    /// Used when a fresh connection is established so anything enqueued
    /// during an outage goes out immediately with DUP=1 (spec §8 Scenario
    /// F), instead of waiting out a full `outbox_resend_interval_ms`.
    pub fn expedite_transmitted(&mut self) {
        let floor = Instant::now() - Duration::from_secs(3600);
        for entry in self.entries.iter_mut() {
            if entry.state == PendingState::Transmitted {
                entry.last_sent_at = floor;
            }
        }
    }

    /// Remove every entry older than `expiry` regardless of state, returning
    /// the removed msg ids so the caller can emit one `Deleted` event per
    /// entry (spec §4.4 "emitting a DELETED event").
    pub fn take_expired(&mut self, expiry: Duration) -> Vec<u16> {
        let now = Instant::now();
        let mut expired = Vec::new();
        self.entries.retain(|e| {
            if now.duration_since(e.enqueued_at) >= expiry {
                expired.push(e.msg_id);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(msg_id: u16) -> OutboxEntry {
        OutboxEntry {
            msg_id,
            msg_type: MsgType::Publish,
            qos: QoS::AtLeastOnce,
            payload: OutboxPayload::Publish { topic: "t".into(), payload: vec![], retain: false },
            enqueued_at: Instant::now(),
            last_sent_at: Instant::now(),
            state: PendingState::Queued,
        }
    }

    #[test]
    fn over_limit_push_fails() {
        let mut ob = Outbox::new(1);
        assert!(ob.push(entry(1)).is_some());
        assert!(ob.push(entry(2)).is_none());
    }

    #[test]
    fn remove_on_terminal_ack() {
        let mut ob = Outbox::new(8);
        ob.push(entry(5)).unwrap();
        assert!(ob.remove(5, MsgType::Publish).is_some());
        assert!(ob.is_empty());
    }

    #[test]
    fn resend_only_fires_after_interval_on_transmitted_entries() {
        let mut ob = Outbox::new(8);
        ob.push(entry(1)).unwrap();
        assert!(ob.due_for_resend(Duration::from_millis(0)).is_empty());
        ob.mark_transmitted(1, MsgType::Publish);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(ob.due_for_resend(Duration::from_millis(1)), vec![(1, MsgType::Publish)]);
    }

    #[test]
    fn expedite_makes_transmitted_entries_immediately_due() {
        let mut ob = Outbox::new(8);
        ob.push(entry(1)).unwrap();
        ob.mark_transmitted(1, MsgType::Publish);
        ob.expedite_transmitted();
        assert_eq!(ob.due_for_resend(Duration::from_secs(1)), vec![(1, MsgType::Publish)]);
    }

    #[test]
    fn repeated_resend_does_not_postpone_expiry() {
        // A retransmit touches last_sent_at, not enqueued_at -- an entry
        // that is being resent every tick must still expire on schedule.
        let mut ob = Outbox::new(8);
        ob.push(entry(1)).unwrap();
        let original_enqueued_at = ob.get(1, MsgType::Publish).unwrap().enqueued_at;
        ob.mark_transmitted(1, MsgType::Publish);
        std::thread::sleep(Duration::from_millis(5));
        ob.mark_transmitted(1, MsgType::Publish);
        assert_eq!(ob.get(1, MsgType::Publish).unwrap().enqueued_at, original_enqueued_at);
        assert_eq!(ob.take_expired(Duration::from_millis(1)), vec![1]);
    }
}
