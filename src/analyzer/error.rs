//! Fatal error type for trace reconstruction.

use std::path::{Path, PathBuf};

/// Error that aborts a trace reconstruction run.
///
/// Anything recoverable is reported as a [`Diagnostic`](super::diagnostics::Diagnostic) instead.
#[derive(Debug)]
pub enum TraceError {
    /// The log directory or one of its files could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// A file name or a classified line does not match its expected grammar.
    Format { location: String, message: String },
}

impl TraceError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        TraceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Format error pointing at a 1-based line of a log file.
    pub fn at_line(path: &Path, line_number: usize, message: impl Into<String>) -> Self {
        TraceError::Format {
            location: format!("{}:{}", path.display(), line_number),
            message: message.into(),
        }
    }

    /// Format error pointing at a whole file (e.g. an unparseable file name).
    pub fn at_file(path: &Path, message: impl Into<String>) -> Self {
        TraceError::Format {
            location: path.display().to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceError::Io { path, source } => write!(f, "Failed to read {}: {}", path.display(), source),
            TraceError::Format { location, message } => write!(f, "Format error at {}: {}", location, message),
        }
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TraceError::Io { source, .. } => Some(source),
            TraceError::Format { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_format_error_display_includes_line() {
        let err = TraceError::at_line(Path::new("log/3.log"), 12, "bad timestamp");
        assert_eq!(err.to_string(), "Format error at log/3.log:12: bad timestamp");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_io_error_keeps_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = TraceError::io(Path::new("log"), inner);
        assert!(err.to_string().starts_with("Failed to read log"));
        assert!(err.source().is_some());
    }
}
