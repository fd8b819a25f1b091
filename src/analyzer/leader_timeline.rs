//! Derive per-node leader tenures from new-view events.
//!
//! Leadership rotates round-robin: view `v` is led by rotation index `v mod N`. Each
//! node's view of who leads is tracked independently, and consecutive intervals for
//! one observer always share their boundary timestamp.

use std::collections::BTreeMap;

use super::event_extractor::ExtractedEvents;
use super::types::{EventKind, LeaderInterval, NodeId, Timestamp};

/// What one node currently believes about leadership.
#[derive(Debug, Clone, Copy)]
struct ObserverState {
    since: Timestamp,
    leader: u32,
}

/// Builds leader intervals keyed by leader rotation index.
#[derive(Debug)]
pub struct LeaderTimeline {
    node_count: usize,
    initial_leader: u32,
    observers: BTreeMap<NodeId, ObserverState>,
    intervals: BTreeMap<u32, Vec<LeaderInterval>>,
}

impl LeaderTimeline {
    /// Every node starts at time 0 believing `initial_leader` leads view 0.
    pub fn new(node_count: usize, initial_leader: u32) -> Self {
        let initial_leader = if node_count == 0 { 0 } else { initial_leader % node_count as u32 };
        let observers = (1..=node_count as NodeId)
            .map(|node| {
                (
                    node,
                    ObserverState {
                        since: 0,
                        leader: initial_leader,
                    },
                )
            })
            .collect();
        let intervals = (0..node_count as u32).map(|leader| (leader, Vec::new())).collect();
        Self {
            node_count,
            initial_leader,
            observers,
            intervals,
        }
    }

    /// Close `node`'s current interval at `timestamp` and switch to the leader of `new_view`.
    pub fn apply_new_view(&mut self, node: NodeId, timestamp: Timestamp, new_view: u64) {
        if self.node_count == 0 {
            return;
        }
        let state = self.observers.entry(node).or_insert(ObserverState {
            since: 0,
            leader: self.initial_leader,
        });
        let closed = LeaderInterval {
            leader: state.leader,
            observer_node: node,
            start: state.since,
            end: timestamp,
        };
        state.leader = (new_view % self.node_count as u64) as u32;
        state.since = timestamp;
        log::debug!("Node {} moved to view {} (leader index {}) at {}", node, new_view, state.leader, timestamp);
        self.intervals.entry(closed.leader).or_default().push(closed);
    }

    /// Leader index `node` currently believes in.
    #[cfg(test)]
    pub fn current_leader(&self, node: NodeId) -> Option<u32> {
        self.observers.get(&node).map(|state| state.leader)
    }

    /// Extend every node's open interval to its last recorded event.
    pub fn finish(mut self, last_timestamps: &BTreeMap<NodeId, Timestamp>) -> BTreeMap<u32, Vec<LeaderInterval>> {
        for (&node, state) in &self.observers {
            let end = last_timestamps.get(&node).map_or(state.since, |&last| last.max(state.since));
            self.intervals.entry(state.leader).or_default().push(LeaderInterval {
                leader: state.leader,
                observer_node: node,
                start: state.since,
                end,
            });
        }
        self.intervals
    }
}

/// Replay all new-view events in recording order and close the final intervals.
pub fn reconstruct_leader_intervals(
    node_count: usize,
    initial_leader: u32,
    events: &ExtractedEvents,
) -> BTreeMap<u32, Vec<LeaderInterval>> {
    let mut timeline = LeaderTimeline::new(node_count, initial_leader);
    for event in events.new_views() {
        if let EventKind::NewView { new_view, .. } = event.kind {
            timeline.apply_new_view(event.node, event.timestamp, new_view);
        }
    }
    timeline.finish(&events.last_timestamps())
}
