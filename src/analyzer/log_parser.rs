//! Classify raw log lines and parse the ones that matter.
//!
//! Classification is a cheap substring test; parsing is a strict grammar. A line that
//! is classified but does not match its grammar is an error, never silently skipped.
//!
//! # Log Line Formats
//!
//! ```text
//! Send:
//! [info] [send] [10.25] [broadcast] {"type":"hot-stuff-proposal","src":"1","request":"R1",...}
//!
//! Receive:
//! [info] [recv] [15] {"type":"hot-stuff-proposal","src":"1","request":"R1",...}
//!
//! New view:
//! [info] [100] enter a new view 4, doubling timeout to 24
//!
//! Reset timeout:
//! [info] [120] Node 3 reset timeout at view 4
//!
//! Enough vote:
//! [info] [130] [enough vote] {"type":"hot-stuff-vote","src":"2","request":"R1",...}
//! ```

use regex::{Captures, Regex};
use serde::Deserialize;
use std::sync::LazyLock;

use super::types::{EventKind, EventMarker, LineKind, NodeId, Timestamp};

static SEND_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[^\]]*\]\s+\[send\]\s+\[(?P<time>[^\]]+)\]\s+\[(?P<dst>[^\]]+)\]\s+(?P<payload>\{.*\})\s*$")
        .expect("send grammar")
});

static RECV_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[^\]]*\]\s+\[recv\]\s+\[(?P<time>[^\]]+)\]\s+(?P<payload>\{.*\})\s*$").expect("recv grammar")
});

static NEW_VIEW_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[[^\]]*\]\s+\[(?P<time>[^\]]+)\]\s+enter a new view (?P<view>\d+)(?:,\s*doubling timeout to (?P<timeout>[-+0-9.eE]+))?",
    )
    .expect("new view grammar")
});

static RESET_TIMEOUT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[^\]]*\]\s+\[(?P<time>[^\]]+)\]\s+Node \d+ reset timeout at view (?P<view>\d+)")
        .expect("reset timeout grammar")
});

static ENOUGH_VOTE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[^\]]*\]\s+\[(?P<time>[^\]]+)\]\s+\[enough vote\](?:\s+\{.*\})?\s*$")
        .expect("enough vote grammar")
});

/// Determine what kind of record a raw line holds.
///
/// A send needs both "send" and "request", a receive both "recv" and "request". Event
/// phrases are checked in [`EventMarker::ALL`] order and the first match wins.
pub fn classify_line(line: &str) -> LineKind {
    let is_protocol = line.contains("request");
    if is_protocol && line.contains("send") {
        return LineKind::Send;
    }
    if is_protocol && line.contains("recv") {
        return LineKind::Receive;
    }

    EventMarker::ALL
        .into_iter()
        .find(|marker| line.contains(marker.phrase()))
        .map_or(LineKind::Ignore, LineKind::Event)
}

/// Where a send line says the message went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Node(NodeId),
    Broadcast,
}

/// Fields of the embedded JSON message used for correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFields {
    pub src: NodeId,
    pub request_id: String,
    pub message_type: String,
}

/// Parsed send line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendLine {
    pub timestamp: Timestamp,
    pub destination: Destination,
    pub fields: MessageFields,
    pub raw_payload: String,
}

/// Parsed receive line. The receiver is the owner of the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecvLine {
    pub timestamp: Timestamp,
    pub fields: MessageFields,
}

#[derive(Deserialize)]
struct WireMessage {
    src: serde_json::Value,
    request: serde_json::Value,
    #[serde(rename = "type")]
    message_type: serde_json::Value,
}

/// Parse a line classified as [`LineKind::Send`].
pub fn parse_send(line: &str) -> Result<SendLine, String> {
    let caps = SEND_LINE.captures(line).ok_or("send line does not match '[level] [send] [time] [dst] {json}'")?;
    let timestamp = parse_clock(&caps["time"])?;
    let destination = match &caps["dst"] {
        "broadcast" => Destination::Broadcast,
        dst => Destination::Node(parse_node(dst).map_err(|e| format!("bad destination: {}", e))?),
    };
    let raw_payload = caps["payload"].to_string();
    let fields = parse_message(&raw_payload)?;

    Ok(SendLine {
        timestamp,
        destination,
        fields,
        raw_payload,
    })
}

/// Parse a line classified as [`LineKind::Receive`].
pub fn parse_recv(line: &str) -> Result<RecvLine, String> {
    let caps = RECV_LINE.captures(line).ok_or("recv line does not match '[level] [recv] [time] {json}'")?;
    let timestamp = parse_clock(&caps["time"])?;
    let fields = parse_message(&caps["payload"])?;

    Ok(RecvLine { timestamp, fields })
}

/// Parse a line classified as [`LineKind::Event`] with the given marker.
pub fn parse_event(marker: EventMarker, line: &str) -> Result<(Timestamp, EventKind), String> {
    match marker {
        EventMarker::NewView => {
            let caps = match_event(&NEW_VIEW_LINE, marker, line)?;
            let new_timeout = caps.name("timeout").map(|m| parse_clock(m.as_str())).transpose()?;
            Ok((
                parse_clock(&caps["time"])?,
                EventKind::NewView {
                    new_view: parse_view(&caps["view"])?,
                    new_timeout,
                },
            ))
        }
        EventMarker::ResetTimeout => {
            let caps = match_event(&RESET_TIMEOUT_LINE, marker, line)?;
            Ok((
                parse_clock(&caps["time"])?,
                EventKind::ResetTimeout {
                    view: parse_view(&caps["view"])?,
                },
            ))
        }
        EventMarker::EnoughVote => {
            let caps = match_event(&ENOUGH_VOTE_LINE, marker, line)?;
            Ok((parse_clock(&caps["time"])?, EventKind::EnoughVote))
        }
    }
}

fn match_event<'l>(grammar: &Regex, marker: EventMarker, line: &'l str) -> Result<Captures<'l>, String> {
    grammar
        .captures(line)
        .ok_or_else(|| format!("'{}' line does not match its grammar", marker.phrase()))
}

/// Convert a logged clock value to an integer timestamp, rounding half to even.
fn parse_clock(value: &str) -> Result<Timestamp, String> {
    let clock: f64 = value.trim().parse().map_err(|_| format!("bad timestamp '{}'", value))?;
    if !clock.is_finite() {
        return Err(format!("bad timestamp '{}'", value));
    }
    Ok(clock.round_ties_even() as Timestamp)
}

fn parse_view(value: &str) -> Result<u64, String> {
    value.parse().map_err(|_| format!("bad view number '{}'", value))
}

fn parse_node(value: &str) -> Result<NodeId, String> {
    match value.trim().parse::<NodeId>() {
        Ok(node) if node > 0 => Ok(node),
        _ => Err(format!("'{}' is not a node id", value)),
    }
}

fn parse_message(raw: &str) -> Result<MessageFields, String> {
    let wire: WireMessage = serde_json::from_str(raw).map_err(|e| format!("bad message payload: {}", e))?;
    let src = match &wire.src {
        serde_json::Value::String(s) => parse_node(s)?,
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|n| NodeId::try_from(n).ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("'{}' is not a node id", n))?,
        other => return Err(format!("'{}' is not a node id", other)),
    };

    Ok(MessageFields {
        src,
        request_id: opaque_key(&wire.request),
        message_type: opaque_key(&wire.message_type),
    })
}

/// Strings compare by content, anything else by its compact JSON text.
fn opaque_key(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
