//! Reconstruct a causally ordered trace of a BFT protocol run from per-node text logs.

pub mod analyzer;
pub mod config;

pub use analyzer::{AnalyzeOptions, Diagnostic, TraceError, TraceReport, TraceResult, analyze_dir, analyze_logs};
pub use config::TraceConfig;
