pub mod api;
pub mod collector;
pub mod config;
pub mod control;
pub mod detail;
pub mod error;
pub mod query;
pub mod service;
pub mod snapshot;
pub mod source;
pub mod tree;
pub mod types;

pub use config::{ApiConfig, Config, LoggingConfig, SnapshotConfig};
pub use control::{ControlDispatcher, Signal};
pub use error::{Error, Result};
pub use query::{ListParams, QuerySpec, SortDir, SortKey};
pub use service::ProcessService;
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use source::{ProcessHandle, ProcessSource, ProcfsSource};
pub use types::{Pid, ProcessDetail, ProcessPage, ProcessRecord, ProcessTreeNode};
