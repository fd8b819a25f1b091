//! Non-fatal correlation warnings.

use serde::Serialize;

use super::types::{PacketKey, Timestamp};

/// Condition that was reported but did not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Diagnostic {
    /// A send with the same key was already pending; the later one replaced it.
    DuplicatePacket { key: PacketKey },
    /// A receive with the same key was already pending; the later one replaced it.
    AlreadyReceived { key: PacketKey },
    /// A send had no matching receive and was dropped.
    MissingReceive { key: PacketKey },
    /// Receives left without a matching send at the end of the run.
    OrphanedReceives { count: usize },
    /// A resolved packet was received before it was sent.
    ReceiveBeforeSend {
        key: PacketKey,
        send_time: Timestamp,
        recv_time: Timestamp,
    },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::DuplicatePacket { key } => write!(f, "duplicate packet: {}", key),
            Diagnostic::AlreadyReceived { key } => write!(f, "{} has already been received", key),
            Diagnostic::MissingReceive { key } => write!(f, "missing recv pkt for {}", key),
            Diagnostic::OrphanedReceives { count } => {
                write!(f, "{} receives don't have corresponding sending packets", count)
            }
            Diagnostic::ReceiveBeforeSend {
                key,
                send_time,
                recv_time,
            } => write!(f, "{} received at {} before it was sent at {}", key, recv_time, send_time),
        }
    }
}

/// Ordered collection of diagnostics; every entry is also logged as a warning.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
