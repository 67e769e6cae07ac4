use std::sync::Arc;

use crate::config::SnapshotConfig;
use crate::control::ControlDispatcher;
use crate::detail::build_detail;
use crate::error::Result;
use crate::query::{QuerySpec, query};
use crate::snapshot::{Snapshot, SnapshotBuilder};
use crate::source::ProcessSource;
use crate::tree::build_tree;
use crate::types::{Pid, ProcessDetail, ProcessPage, ProcessTreeNode};

/// The five request types. Every call takes its own snapshot; nothing is
/// cached between calls.
#[derive(Clone)]
pub struct ProcessService {
    source: Arc<dyn ProcessSource>,
    snapshot: SnapshotConfig,
}

impl ProcessService {
    pub fn new(source: Arc<dyn ProcessSource>, snapshot: SnapshotConfig) -> Self {
        Self { source, snapshot }
    }

    pub fn snapshot_config(&self) -> &SnapshotConfig {
        &self.snapshot
    }

    fn take_snapshot(&self) -> Result<Snapshot> {
        SnapshotBuilder::new(self.source.as_ref())
            .workers(self.snapshot.workers)
            .build()
    }

    pub fn list(&self, spec: &QuerySpec) -> Result<ProcessPage> {
        Ok(query(&self.take_snapshot()?, spec))
    }

    pub fn tree(&self) -> Result<Vec<ProcessTreeNode>> {
        Ok(build_tree(&self.take_snapshot()?))
    }

    pub fn detail(&self, pid: Pid) -> Result<ProcessDetail> {
        build_detail(self.source.as_ref(), pid)
    }

    pub fn kill(&self, pid: Pid) -> Result<()> {
        ControlDispatcher::new(self.source.as_ref()).kill(pid)
    }

    pub fn signal(&self, pid: Pid, signal: &str) -> Result<()> {
        ControlDispatcher::new(self.source.as_ref()).signal(pid, signal)
    }
}
