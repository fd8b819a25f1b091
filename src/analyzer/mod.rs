//! Analyzer module for reconstructing a consensus trace from per-node logs.
//!
//! Provides functionality for:
//! - Loading one log file per node
//! - Matching send/receive lines into packets, including broadcast fan-out
//! - Extracting view-change, timeout and vote-quorum events
//! - Deriving per-node leader intervals from view changes
//!
//! Fatal problems surface as [`TraceError`]; everything else is returned as a
//! [`Diagnostic`] next to the [`TraceResult`].

pub mod correlator;
pub mod diagnostics;
pub mod error;
pub mod event_extractor;
pub mod leader_timeline;
pub mod log_loader;
pub mod log_parser;
pub mod pipeline;
pub mod types;

pub use diagnostics::Diagnostic;
pub use error::TraceError;
pub use log_loader::LogLoader;
pub use pipeline::{AnalyzeOptions, analyze_dir, analyze_logs};
pub use types::{ControlEvent, EventKind, LeaderInterval, NodeId, PacketRecord, TraceReport, TraceResult};
