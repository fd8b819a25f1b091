//! Match send and receive observations of the same logical packet.
//!
//! Sends are keyed by `(log owner, dst, request, type)`; broadcasts fan out to one pending
//! packet per other node. Receives are keyed by `(message src, log owner, request, type)`.
//! Once every node has been fed in, [`PacketCorrelator::finish`] pairs them up.

use std::collections::HashMap;

use super::diagnostics::{Diagnostic, Diagnostics};
use super::log_parser::{Destination, RecvLine, SendLine};
use super::types::{NodeId, PacketKey, PacketRecord, Timestamp, UNRESOLVED};

/// Correlation state for one trace. Owns its pending maps.
#[derive(Debug)]
pub struct PacketCorrelator {
    node_count: usize,
    /// Pending sends in first-insertion order; a duplicate key replaces in place.
    pending_sends: Vec<(PacketKey, PacketRecord)>,
    send_index: HashMap<PacketKey, usize>,
    pending_recvs: HashMap<PacketKey, Timestamp>,
    diagnostics: Diagnostics,
}

impl PacketCorrelator {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            pending_sends: Vec::new(),
            send_index: HashMap::new(),
            pending_recvs: HashMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Record a send logged by `node`. The key uses `node` as sender; the record keeps the
    /// message's own `src`.
    pub fn observe_send(&mut self, node: NodeId, send: SendLine) {
        if send.fields.src != node {
            log::debug!("Node {} logged a send with src {}", node, send.fields.src);
        }
        match send.destination {
            Destination::Node(dst) => self.insert_send(send_key(node, dst, &send), packet_for(&send, dst)),
            Destination::Broadcast => {
                for dst in (1..=self.node_count as NodeId).filter(|dst| *dst != node) {
                    self.insert_send(send_key(node, dst, &send), packet_for(&send, dst));
                }
            }
        }
    }

    /// Record a receive logged by `node`, which is the packet's destination.
    pub fn observe_recv(&mut self, node: NodeId, recv: RecvLine) {
        let key = PacketKey {
            src: recv.fields.src,
            dst: node,
            request_id: recv.fields.request_id,
            message_type: recv.fields.message_type,
        };
        if self.pending_recvs.contains_key(&key) {
            self.diagnostics.push(Diagnostic::AlreadyReceived { key: key.clone() });
        }
        self.pending_recvs.insert(key, recv.timestamp);
    }

    fn insert_send(&mut self, key: PacketKey, packet: PacketRecord) {
        match self.send_index.get(&key) {
            Some(&index) => {
                self.diagnostics.push(Diagnostic::DuplicatePacket { key });
                self.pending_sends[index].1 = packet;
            }
            None => {
                self.send_index.insert(key.clone(), self.pending_sends.len());
                self.pending_sends.push((key, packet));
            }
        }
    }

    /// Pair every pending send with its receive.
    ///
    /// # Returns
    ///
    /// Resolved packets in send order, and the diagnostics gathered during the whole pass.
    pub fn finish(mut self) -> (Vec<PacketRecord>, Diagnostics) {
        let mut resolved = Vec::with_capacity(self.pending_sends.len());
        for (key, mut packet) in self.pending_sends {
            let Some(recv_time) = self.pending_recvs.remove(&key) else {
                self.diagnostics.push(Diagnostic::MissingReceive { key });
                continue;
            };
            packet.recv_time = recv_time;
            if packet.recv_time < packet.send_time {
                self.diagnostics.push(Diagnostic::ReceiveBeforeSend {
                    key,
                    send_time: packet.send_time,
                    recv_time: packet.recv_time,
                });
            }
            resolved.push(packet);
        }

        if !self.pending_recvs.is_empty() {
            self.diagnostics.push(Diagnostic::OrphanedReceives {
                count: self.pending_recvs.len(),
            });
        }
        log::info!("Resolved {} packets", resolved.len());

        (resolved, self.diagnostics)
    }
}

fn send_key(node: NodeId, dst: NodeId, send: &SendLine) -> PacketKey {
    PacketKey {
        src: node,
        dst,
        request_id: send.fields.request_id.clone(),
        message_type: send.fields.message_type.clone(),
    }
}

fn packet_for(send: &SendLine, dst: NodeId) -> PacketRecord {
    PacketRecord {
        send_time: send.timestamp,
        recv_time: UNRESOLVED,
        src: send.fields.src,
        dst,
        request_id: send.fields.request_id.clone(),
        message_type: send.fields.message_type.clone(),
        raw_payload: send.raw_payload.clone(),
    }
}
