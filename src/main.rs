use anyhow::Context;
use env_logger::Builder;
use log::{LevelFilter, info};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use bft_trace_analyzer::{AnalyzeOptions, TraceConfig, TraceReport, analyze_dir};

fn main() -> anyhow::Result<()> {
    // Logging setup; RUST_LOG overrides the defaults
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("bft_trace_analyzer"), LevelFilter::Debug)
        .parse_default_env()
        .init();

    let trace_dir = std::env::args_os().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let config = TraceConfig::for_trace_dir(&trace_dir)?;
    let log_path = config.log_path(&trace_dir);
    info!("Reconstructing trace from {}", log_path.display());

    let report = analyze_dir(
        &log_path,
        AnalyzeOptions {
            initial_leader: config.initial_leader,
        },
    )
    .with_context(|| format!("Failed to reconstruct trace from {}", log_path.display()))?;

    log_summary(&report);
    write_result(&report, &config)
}

fn log_summary(report: &TraceReport) {
    let result = &report.result;
    info!("{} nodes, {} resolved packets", result.node_count, result.packets.len());
    for (message_type, packets) in result.packets_by_type() {
        info!("  {}: {} packets", message_type, packets.len());
    }

    let mut per_kind: BTreeMap<&str, usize> = BTreeMap::new();
    for event in &result.events {
        *per_kind.entry(event.kind.marker().phrase()).or_default() += 1;
    }
    let interval_count: usize = result.leader_intervals.values().map(Vec::len).sum();
    info!("  leader intervals: {}", interval_count);
    for (phrase, count) in per_kind {
        info!("  {}: {} events", phrase, count);
    }
}

fn write_result(report: &TraceReport, config: &TraceConfig) -> anyhow::Result<()> {
    let mut writer: Box<dyn Write> = match &config.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            info!("Writing trace to {}", path.display());
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    if config.pretty {
        serde_json::to_writer_pretty(&mut writer, &report.result)?;
    } else {
        serde_json::to_writer(&mut writer, &report.result)?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
