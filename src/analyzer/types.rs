//! Type definitions specific to the analyzer module.

use serde::Serialize;
use std::collections::BTreeMap;

use super::diagnostics::Diagnostic;

/// Cluster participant identifier, 1..=N.
pub type NodeId = u32;

/// Timestamp of a log record after rounding the logged clock value.
pub type Timestamp = i64;

/// Placeholder for a send or receive time that has not been observed.
pub const UNRESOLVED: Timestamp = -1;

/// Category assigned to a raw log line by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Outgoing protocol message.
    Send,
    /// Incoming protocol message.
    Receive,
    /// Control-plane state transition.
    Event(EventMarker),
    /// Anything else.
    Ignore,
}

/// Phrase markers recognised as control events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventMarker {
    NewView,
    ResetTimeout,
    EnoughVote,
}

impl EventMarker {
    /// Marker phrases in match priority order.
    pub const ALL: [EventMarker; 3] = [EventMarker::NewView, EventMarker::ResetTimeout, EventMarker::EnoughVote];

    /// Phrase that identifies the marker inside a log line.
    pub fn phrase(self) -> &'static str {
        match self {
            EventMarker::NewView => "new view",
            EventMarker::ResetTimeout => "reset timeout",
            EventMarker::EnoughVote => "enough vote",
        }
    }
}

/// Identity of a logical packet before it is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PacketKey {
    pub src: NodeId,
    pub dst: NodeId,
    pub request_id: String,
    pub message_type: String,
}

impl std::fmt::Display for PacketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}_{}", self.src, self.dst, self.request_id, self.message_type)
    }
}

/// One logical protocol message seen by its sender and, once resolved, its receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketRecord {
    pub send_time: Timestamp,
    pub recv_time: Timestamp,
    pub src: NodeId,
    pub dst: NodeId,
    pub request_id: String,
    pub message_type: String,
    /// JSON blob exactly as it appeared in the send line.
    pub raw_payload: String,
}

/// Typed payload of a control event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventKind {
    /// The node entered a new view.
    NewView {
        new_view: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_timeout: Option<i64>,
    },
    /// The node reset its view timer while in `view`.
    ResetTimeout { view: u64 },
    /// The node collected a vote quorum.
    EnoughVote,
}

impl EventKind {
    pub fn marker(&self) -> EventMarker {
        match self {
            EventKind::NewView { .. } => EventMarker::NewView,
            EventKind::ResetTimeout { .. } => EventMarker::ResetTimeout,
            EventKind::EnoughVote => EventMarker::EnoughVote,
        }
    }
}

/// Control-plane event recorded by one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlEvent {
    pub node: NodeId,
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: Timestamp,
}

/// Period during which `observer_node` believed the node at rotation index `leader` was leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeaderInterval {
    /// Rotation index (`view mod N`); node id is `leader + 1`.
    pub leader: u32,
    pub observer_node: NodeId,
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Reconstructed trace handed to the rendering layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceResult {
    pub node_count: usize,
    pub packets: Vec<PacketRecord>,
    /// Control events with new-view events removed.
    pub events: Vec<ControlEvent>,
    pub leader_intervals: BTreeMap<u32, Vec<LeaderInterval>>,
}

impl TraceResult {
    /// Group resolved packets by message type, keeping their original order within a group.
    pub fn packets_by_type(&self) -> BTreeMap<&str, Vec<&PacketRecord>> {
        let mut groups: BTreeMap<&str, Vec<&PacketRecord>> = BTreeMap::new();
        for packet in &self.packets {
            groups.entry(packet.message_type.as_str()).or_default().push(packet);
        }
        groups
    }

    /// All intervals observed by one node, across leaders, sorted by start time.
    pub fn leader_intervals_for(&self, observer: NodeId) -> Vec<LeaderInterval> {
        let mut intervals: Vec<LeaderInterval> = self
            .leader_intervals
            .values()
            .flatten()
            .filter(|interval| interval.observer_node == observer)
            .copied()
            .collect();
        intervals.sort_by_key(|interval| (interval.start, interval.end));
        intervals
    }
}

/// Result of a run together with every non-fatal condition encountered.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceReport {
    pub result: TraceResult,
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(message_type: &str, dst: NodeId) -> PacketRecord {
        PacketRecord {
            send_time: 1,
            recv_time: 2,
            src: 1,
            dst,
            request_id: "r".to_string(),
            message_type: message_type.to_string(),
            raw_payload: "{}".to_string(),
        }
    }

    #[test]
    fn test_packet_key_display() {
        let key = PacketKey {
            src: 1,
            dst: 3,
            request_id: "r".to_string(),
            message_type: "prepare".to_string(),
        };
        assert_eq!(key.to_string(), "1_3_r_prepare");
    }

    #[test]
    fn test_packets_by_type_groups_in_order() {
        let result = TraceResult {
            node_count: 3,
            packets: vec![packet("vote", 2), packet("prepare", 2), packet("vote", 3)],
            ..Default::default()
        };
        let groups = result.packets_by_type();
        assert_eq!(groups.len(), 2);
        let votes: Vec<NodeId> = groups["vote"].iter().map(|p| p.dst).collect();
        assert_eq!(votes, vec![2, 3]);
    }

    #[test]
    fn test_control_event_serializes_flat() {
        let event = ControlEvent {
            node: 2,
            kind: EventKind::ResetTimeout { view: 7 },
            timestamp: 40,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({"node": 2, "type": "reset-timeout", "view": 7, "timestamp": 40}));
    }
}
