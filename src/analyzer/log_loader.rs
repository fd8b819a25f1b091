//! Per-node log file discovery and reading.
//!
//! Every regular file in the log directory belongs to one node. The node id is the
//! leading integer of the file name (`3.log` belongs to node 3). Files are read fully
//! into memory before any correlation starts.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::error::TraceError;
use super::types::NodeId;

/// Buffer size for reading log files (8KB).
const BUFFER_SIZE: usize = 8 * 1024;

/// All lines written by one node, in file order.
#[derive(Debug, Clone)]
pub struct NodeLog {
    pub node_id: NodeId,
    pub path: PathBuf,
    pub lines: Vec<String>,
}

/// Loaded log set keyed by node id.
pub type NodeLogs = BTreeMap<NodeId, NodeLog>;

/// Loads one log file per node from a directory.
pub struct LogLoader {
    dir: PathBuf,
}

impl LogLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Discover and read every node log in the directory.
    ///
    /// # Returns
    ///
    /// Node logs keyed by node id, or `TraceError::Io` if the directory or a file is
    /// unreadable and `TraceError::Format` if a file name carries no node id.
    pub fn load(&self) -> Result<NodeLogs, TraceError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| TraceError::io(&self.dir, e))?;

        let mut logs = NodeLogs::new();
        for entry in entries {
            let entry = entry.map_err(|e| TraceError::io(&self.dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| TraceError::io(&path, e))?;
            if !file_type.is_file() {
                log::debug!("Skipping non-file entry {}", path.display());
                continue;
            }

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                return Err(TraceError::at_file(&path, "file name is not valid UTF-8"));
            };
            if file_name.starts_with('.') {
                log::debug!("Skipping hidden file {}", path.display());
                continue;
            }

            let node_id = parse_node_id(file_name)
                .ok_or_else(|| TraceError::at_file(&path, format!("cannot derive node id from '{}'", file_name)))?;
            if let Some(existing) = logs.get(&node_id) {
                return Err(TraceError::at_file(
                    &path,
                    format!("node {} already loaded from {}", node_id, existing.path.display()),
                ));
            }

            let lines = read_lines(&path)?;
            log::debug!("Loaded {} lines for node {} from {}", lines.len(), node_id, path.display());
            logs.insert(node_id, NodeLog { node_id, path, lines });
        }

        if !logs.keys().copied().eq(1..=logs.len() as NodeId) {
            log::warn!(
                "Node ids {:?} are not exactly 1..={}; broadcast expansion assumes contiguous ids",
                logs.keys().collect::<Vec<_>>(),
                logs.len()
            );
        }
        log::info!("Loaded {} node logs from {}", logs.len(), self.dir.display());

        Ok(logs)
    }
}

/// Extract the leading integer of a file name. Node ids are positive.
fn parse_node_id(file_name: &str) -> Option<NodeId> {
    let end = file_name.find(|c: char| !c.is_ascii_digit()).unwrap_or(file_name.len());
    let node_id: NodeId = file_name[..end].parse().ok()?;
    (node_id > 0).then_some(node_id)
}

/// Read a file into lines, stripping line terminators. Empty lines are kept so that
/// line numbers in errors match the file.
fn read_lines(path: &Path) -> Result<Vec<String>, TraceError> {
    let file = File::open(path).map_err(|e| TraceError::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);

    let mut lines = Vec::new();
    let mut line_buffer = String::with_capacity(512);
    loop {
        line_buffer.clear();
        match reader.read_line(&mut line_buffer) {
            Ok(0) => break,
            Ok(_) => lines.push(line_buffer.trim_end_matches(['\n', '\r']).to_string()),
            Err(e) => return Err(TraceError::io(path, e)),
        }
    }

    Ok(lines)
}
