//! Single-pass trace reconstruction over a loaded log set.
//!
//! Runs synchronously: every log is already in memory, each line is classified once
//! and routed to the packet correlator or the event extractor, and new-view events
//! are then folded into leader intervals.

use std::path::Path;

use super::correlator::PacketCorrelator;
use super::error::TraceError;
use super::event_extractor::EventExtractor;
use super::leader_timeline::reconstruct_leader_intervals;
use super::log_loader::{LogLoader, NodeLogs};
use super::log_parser::{classify_line, parse_recv, parse_send};
use super::types::{LineKind, TraceReport, TraceResult};

/// Knobs for a reconstruction run.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    /// Leader rotation index assumed for view 0.
    pub initial_leader: u32,
}

/// Load `<dir>/<id>.log` files and reconstruct the trace.
pub fn analyze_dir(dir: &Path, options: AnalyzeOptions) -> Result<TraceReport, TraceError> {
    let logs = LogLoader::new(dir).load()?;
    analyze_logs(&logs, options)
}

/// Reconstruct the trace from logs that are already loaded.
///
/// # Returns
///
/// The trace and its diagnostics, or the first `TraceError::Format` hit by a
/// classified line that does not match its grammar.
pub fn analyze_logs(logs: &NodeLogs, options: AnalyzeOptions) -> Result<TraceReport, TraceError> {
    let node_count = logs.len();
    let mut correlator = PacketCorrelator::new(node_count);
    let mut extractor = EventExtractor::new();

    for node_log in logs.values() {
        let node = node_log.node_id;
        for (index, line) in node_log.lines.iter().enumerate() {
            let at_line = |message: String| TraceError::at_line(&node_log.path, index + 1, message);
            match classify_line(line) {
                LineKind::Send => correlator.observe_send(node, parse_send(line).map_err(at_line)?),
                LineKind::Receive => correlator.observe_recv(node, parse_recv(line).map_err(at_line)?),
                LineKind::Event(marker) => extractor.extract(node, marker, line).map_err(at_line)?,
                LineKind::Ignore => {}
            }
        }
    }

    let (packets, diagnostics) = correlator.finish();
    if !diagnostics.is_empty() {
        log::warn!("{} correlation warnings", diagnostics.len());
    }
    let events = extractor.finish();
    let leader_intervals = reconstruct_leader_intervals(node_count, options.initial_leader, &events);

    Ok(TraceReport {
        result: TraceResult {
            node_count,
            packets,
            events: events.into_remaining(),
            leader_intervals,
        },
        diagnostics: diagnostics.into_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::diagnostics::Diagnostic;
    use crate::analyzer::log_loader::NodeLog;
    use crate::analyzer::types::{EventKind, NodeId, PacketKey, Timestamp};
    use std::path::PathBuf;

    const BROADCAST: &str = r#"[info] [send] [10] [broadcast] {"type":"prepare","src":"1","request":"R1"}"#;

    fn recv_line(time: Timestamp) -> String {
        format!(r#"[info] [recv] [{}] {{"type":"prepare","src":"1","request":"R1"}}"#, time)
    }

    fn logs(nodes: Vec<Vec<String>>) -> NodeLogs {
        nodes
            .into_iter()
            .enumerate()
            .map(|(index, lines)| {
                let node_id = index as NodeId + 1;
                (
                    node_id,
                    NodeLog {
                        node_id,
                        path: PathBuf::from(format!("log/{}.log", node_id)),
                        lines,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_broadcast_round_trip() {
        let logs = logs(vec![vec![BROADCAST.to_string()], vec![recv_line(15)], vec![recv_line(17)]]);

        let report = analyze_logs(&logs, AnalyzeOptions::default()).unwrap();

        assert!(report.diagnostics.is_empty());
        assert_eq!(report.result.node_count, 3);
        let packets: Vec<(NodeId, NodeId, Timestamp, Timestamp)> =
            report.result.packets.iter().map(|p| (p.src, p.dst, p.send_time, p.recv_time)).collect();
        assert_eq!(packets, vec![(1, 2, 10, 15), (1, 3, 10, 17)]);
        assert!(report.result.packets.iter().all(|p| p.send_time <= p.recv_time));
    }

    #[test]
    fn test_missing_receive() {
        let logs = logs(vec![vec![BROADCAST.to_string()], vec![recv_line(15)], vec![]]);

        let report = analyze_logs(&logs, AnalyzeOptions::default()).unwrap();

        assert_eq!(report.result.packets.len(), 1);
        assert_eq!(report.result.packets[0].dst, 2);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::MissingReceive {
                key: PacketKey {
                    src: 1,
                    dst: 3,
                    request_id: "R1".to_string(),
                    message_type: "prepare".to_string(),
                }
            }]
        );
    }

    #[test]
    fn test_view_change_closes_leader_interval() {
        let logs = logs(vec![
            vec!["[info] [100] enter a new view 4, doubling timeout to 24".to_string()],
            vec![],
            vec![],
            vec!["[info] [30] Node 4 reset timeout at view 0".to_string()],
        ]);

        let report = analyze_logs(&logs, AnalyzeOptions::default()).unwrap();
        let result = &report.result;

        let node1 = result.leader_intervals_for(1);
        assert_eq!(node1.len(), 2);
        assert_eq!((node1[0].leader, node1[0].start, node1[0].end), (0, 0, 100));
        assert_eq!((node1[1].leader, node1[1].start, node1[1].end), (0, 100, 100));

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].kind, EventKind::ResetTimeout { view: 0 });
        assert_eq!(result.leader_intervals_for(4)[0].end, 30);
    }

    #[test]
    fn test_ignored_lines_do_not_affect_result() {
        let logs = logs(vec![
            vec!["[info] [decide] R1".to_string(), String::new(), BROADCAST.to_string()],
            vec!["[warning] [undefined msg type]".to_string(), recv_line(12)],
        ]);

        let report = analyze_logs(&logs, AnalyzeOptions::default()).unwrap();
        assert_eq!(report.result.packets.len(), 1);
        assert!(report.result.events.is_empty());
    }

    #[test]
    fn test_malformed_classified_line_aborts() {
        let logs = logs(vec![vec![
            BROADCAST.to_string(),
            "[info] [send] [oops] [2] {\"request\":\"R2\"}".to_string(),
        ]]);

        let err = analyze_logs(&logs, AnalyzeOptions::default()).unwrap_err();
        match err {
            TraceError::Format { location, .. } => assert_eq!(location, "log/1.log:2"),
            other => panic!("expected format error, got {}", other),
        }
    }

    #[test]
    fn test_hotstuff_round_as_logged() {
        let proposal = r#"{"type":"hot-stuff-proposal","height":1,"view":0,"src":"1","request":"3f2a","QC":{"view":0,"height":0,"request":"genesis"},"primary":"1","dummyBlocks":[],"parent":"genesis"}"#;
        let vote = |src: &str| {
            format!(
                r#"{{"type":"hot-stuff-vote","view":0,"src":"{}","request":"3f2a","QC":{{"view":0,"height":0,"request":"genesis"}}}}"#,
                src
            )
        };
        let logs = logs(vec![
            vec![
                format!("[info] [send] [0] [broadcast] {}", proposal),
                format!("[info] [inserting-block] {}", proposal),
                format!("[info] [recv] [1] {}", vote("2")),
                format!("[info] [recv] [2] {}", vote("3")),
                format!("[info] [2] [enough vote] {}", vote("3")),
                "[info] [14] enter a new view 1, doubling timeout to 24".to_string(),
            ],
            vec![
                format!("[info] [recv] [1] {}", proposal),
                format!("[info] [inserting-block] {}", proposal),
                format!("[info] [send] [1.4] [1] {}", vote("2")),
            ],
            vec![
                format!("[info] [recv] [1] {}", proposal),
                format!("[info] [send] [1.5] [1] {}", vote("3")),
                "[info] [9] Node 3 reset timeout at view 0".to_string(),
            ],
            vec![
                format!("[info] [recv] [1] {}", proposal),
                "[info] [16] enter a new view 1, doubling timeout to 24".to_string(),
            ],
        ]);

        let report = analyze_logs(&logs, AnalyzeOptions::default()).unwrap();
        let result = &report.result;

        assert!(report.diagnostics.is_empty());
        let packets: Vec<(NodeId, NodeId, Timestamp, Timestamp)> =
            result.packets.iter().map(|p| (p.src, p.dst, p.send_time, p.recv_time)).collect();
        assert_eq!(packets, vec![(1, 2, 0, 1), (1, 3, 0, 1), (1, 4, 0, 1), (2, 1, 1, 1), (3, 1, 2, 2)]);
        let by_type = result.packets_by_type();
        assert_eq!(by_type["hot-stuff-proposal"].len(), 3);
        assert_eq!(by_type["hot-stuff-vote"].len(), 2);
        assert_eq!(result.packets[0].raw_payload, proposal);

        let events: Vec<(NodeId, EventKind, Timestamp)> =
            result.events.iter().map(|e| (e.node, e.kind.clone(), e.timestamp)).collect();
        assert_eq!(
            events,
            vec![(1, EventKind::EnoughVote, 2), (3, EventKind::ResetTimeout { view: 0 }, 9)]
        );

        let spans = |observer: NodeId| -> Vec<(u32, Timestamp, Timestamp)> {
            result.leader_intervals_for(observer).iter().map(|i| (i.leader, i.start, i.end)).collect()
        };
        assert_eq!(spans(1), vec![(0, 0, 14), (1, 14, 14)]);
        assert_eq!(spans(2), vec![(0, 0, 0)]);
        assert_eq!(spans(3), vec![(0, 0, 9)]);
        assert_eq!(spans(4), vec![(0, 0, 16), (1, 16, 16)]);
    }

    #[test]
    fn test_analyze_dir_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.log"), format!("{}\n", BROADCAST)).unwrap();
        std::fs::write(dir.path().join("2.log"), format!("{}\n", recv_line(11))).unwrap();

        let report = analyze_dir(dir.path(), AnalyzeOptions::default()).unwrap();
        assert_eq!(report.result.node_count, 2);
        assert_eq!(report.result.packets.len(), 1);
        assert!(report.diagnostics.is_empty());
    }
}
