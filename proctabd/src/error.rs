use std::io;
use thiserror::Error;

use crate::types::Pid;

/// Failures surfaced by list, tree, detail, kill and signal requests.
///
/// A single unreadable metric is never an `Error`; it is absorbed into the
/// record's `unavailable` list by the collector.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing caller input (bad PID, unknown signal name).
    #[error("invalid request: {0}")]
    Validation(String),

    /// The target PID has no live process.
    #[error("process {0} not found")]
    NotFound(Pid),

    /// The process table as a whole could not be read.
    #[error("process enumeration failed: {0}")]
    Collection(String),

    /// The OS refused an operation on an existing process.
    #[error("process {pid}: {source}")]
    Os {
        pid: Pid,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Classify an errno returned while addressing `pid`.
    pub fn from_os(pid: Pid, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound || source.raw_os_error() == Some(libc::ESRCH)
        {
            Self::NotFound(pid)
        } else {
            Self::Os { pid, source }
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Os { source, .. } if source.kind() == io::ErrorKind::PermissionDenied)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
