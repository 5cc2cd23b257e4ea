use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that reach the caller of a profiler entry point. Clock anomalies,
/// degenerate throughput and missing parent frames are corrected in place and
/// never show up here.
#[derive(Debug, Error)]
pub enum ProfilerError {
    #[error("failed to allocate {what}")]
    Allocation { what: &'static str },

    #[error("failed to write profile to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("stack depth {depth} exceeds the limit of {limit} frames")]
    StackTooDeep { depth: usize, limit: usize },
}

impl ProfilerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProfilerError>;
