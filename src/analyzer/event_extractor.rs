//! Build typed control events from classified event lines.

use std::collections::BTreeMap;

use super::log_parser::parse_event;
use super::types::{ControlEvent, EventKind, EventMarker, NodeId, Timestamp};

/// Collects control events in recording order (node by node, line by line).
#[derive(Debug, Default)]
pub struct EventExtractor {
    events: Vec<ControlEvent>,
}

impl EventExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one event line logged by `node`.
    ///
    /// # Returns
    ///
    /// `Err` with a description if the line does not match the grammar of its marker.
    pub fn extract(&mut self, node: NodeId, marker: EventMarker, line: &str) -> Result<(), String> {
        let (timestamp, kind) = parse_event(marker, line)?;
        self.events.push(ControlEvent { node, kind, timestamp });
        Ok(())
    }

    pub fn finish(self) -> ExtractedEvents {
        log::info!("Extracted {} control events", self.events.len());
        ExtractedEvents { events: self.events }
    }
}

/// All control events of a run, before new-view events are consumed.
#[derive(Debug, Clone, Default)]
pub struct ExtractedEvents {
    events: Vec<ControlEvent>,
}

impl ExtractedEvents {
    #[cfg(test)]
    pub fn all(&self) -> &[ControlEvent] {
        &self.events
    }

    /// New-view events in recording order.
    pub fn new_views(&self) -> impl Iterator<Item = &ControlEvent> {
        self.events.iter().filter(|e| matches!(e.kind, EventKind::NewView { .. }))
    }

    /// Latest timestamp recorded by each node across every event kind.
    pub fn last_timestamps(&self) -> BTreeMap<NodeId, Timestamp> {
        let mut last = BTreeMap::new();
        for event in &self.events {
            last.entry(event.node)
                .and_modify(|t: &mut Timestamp| *t = (*t).max(event.timestamp))
                .or_insert(event.timestamp);
        }
        last
    }

    /// Drop the new-view events, which live on only as leader intervals.
    pub fn into_remaining(self) -> Vec<ControlEvent> {
        self.events
            .into_iter()
            .filter(|e| !matches!(e.kind, EventKind::NewView { .. }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted() -> ExtractedEvents {
        let mut extractor = EventExtractor::new();
        extractor
            .extract(1, EventMarker::NewView, "[info] [100] enter a new view 1, doubling timeout to 6")
            .unwrap();
        extractor
            .extract(1, EventMarker::EnoughVote, "[info] [140] [enough vote] {\"request\":\"R1\"}")
            .unwrap();
        extractor
            .extract(2, EventMarker::ResetTimeout, "[info] [90] Node 2 reset timeout at view 0")
            .unwrap();
        extractor.finish()
    }

    #[test]
    fn test_extract_keeps_recording_order() {
        let events = extracted();
        let nodes: Vec<NodeId> = events.all().iter().map(|e| e.node).collect();
        assert_eq!(nodes, vec![1, 1, 2]);
        assert_eq!(events.new_views().count(), 1);
    }

    #[test]
    fn test_last_timestamps_cover_all_kinds() {
        let last = extracted().last_timestamps();
        assert_eq!(last[&1], 140);
        assert_eq!(last[&2], 90);
    }

    #[test]
    fn test_remaining_excludes_new_view() {
        let remaining = extracted().into_remaining();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].kind, EventKind::EnoughVote);
        assert_eq!(remaining[1].kind, EventKind::ResetTimeout { view: 0 });
    }

    #[test]
    fn test_malformed_event_is_rejected() {
        let mut extractor = EventExtractor::new();
        assert!(extractor.extract(3, EventMarker::NewView, "[info] [7] new view soon").is_err());
        assert!(extractor.finish().all().is_empty());
    }
}
