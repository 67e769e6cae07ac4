use log::{debug, warn};
use std::collections::HashMap;
use std::thread;
use std::time::Instant;

use crate::collector::{collect, collect_pid_with_argv};
use crate::error::{Error, Result};
use crate::source::ProcessSource;
use crate::types::{Field, Pid, ProcessRecord};

/// Point-in-time process table. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Vec<ProcessRecord>,
}

impl Snapshot {
    /// Wrap already collected records, deriving each record's child list
    /// from the PPIDs present.
    pub fn from_records(mut records: Vec<ProcessRecord>) -> Self {
        let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
        for record in &records {
            if record.ppid != record.pid && record.is_available(Field::Ppid) {
                children.entry(record.ppid).or_default().push(record.pid);
            }
        }
        for record in &mut records {
            if let Some(mut kids) = children.remove(&record.pid) {
                kids.sort_unstable();
                record.children = kids;
            }
        }
        Self { records }
    }

    pub fn records(&self) -> &[ProcessRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.records.iter().find(|r| r.pid == pid)
    }
}

pub struct SnapshotBuilder<'a> {
    source: &'a dyn ProcessSource,
    workers: usize,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(source: &'a dyn ProcessSource) -> Self {
        Self { source, workers: 1 }
    }

    /// Collect with `workers` threads. Output order never depends on which
    /// thread finishes first.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Enumerate and collect every visible process. PIDs that vanish or
    /// cannot be opened are dropped; failing to enumerate fails the build.
    pub fn build(&self) -> Result<Snapshot> {
        let started = Instant::now();
        let pids = self
            .source
            .pids()
            .map_err(|err| Error::Collection(format!("{err:#}")))?;

        let records = if self.workers == 1 || pids.len() < 2 {
            self.collect_all(&pids)
        } else {
            let chunk = pids.len().div_ceil(self.workers);
            thread::scope(|scope| {
                let handles: Vec<_> = pids
                    .chunks(chunk)
                    .map(|part| scope.spawn(move || self.collect_all(part)))
                    .collect();
                handles
                    .into_iter()
                    .enumerate()
                    .flat_map(|(n, h)| match h.join() {
                        Ok(records) => records,
                        Err(_) => {
                            warn!("[snapshot] worker {n} panicked, its {chunk} pids are missing");
                            Vec::new()
                        }
                    })
                    .collect::<Vec<_>>()
            })
        };

        debug!(
            "[snapshot] collected {}/{} processes in {:?}",
            records.len(),
            pids.len(),
            started.elapsed()
        );
        Ok(Snapshot::from_records(records))
    }

    /// Collect one process, children included. Fails if it cannot be opened.
    pub fn build_single(&self, pid: Pid) -> Result<ProcessRecord> {
        Ok(self.build_single_with_argv(pid)?.0)
    }

    /// `build_single` plus the argument vector read during the same visit.
    pub fn build_single_with_argv(&self, pid: Pid) -> Result<(ProcessRecord, Vec<String>)> {
        let (mut record, argv) = collect_pid_with_argv(self.source, pid)?;
        match self.source.child_pids(pid) {
            Ok(children) => record.children = children,
            Err(err) => {
                debug!("[snapshot] children of pid={pid} unavailable: {err:#}");
                record.unavailable.push(Field::Children);
            }
        }
        Ok((record, argv))
    }

    fn collect_all(&self, pids: &[Pid]) -> Vec<ProcessRecord> {
        pids.iter()
            .filter_map(|&pid| match self.source.open(pid) {
                Ok(handle) => Some(collect(handle.as_ref())),
                Err(err) => {
                    debug!("[snapshot] dropping pid={pid}: {err}");
                    None
                }
            })
            .collect()
    }
}
