use log::debug;

use crate::collector::collect_pid;
use crate::error::Result;
use crate::snapshot::SnapshotBuilder;
use crate::source::ProcessSource;
use crate::types::{Pid, ProcessDetail};

/// Full view of one process: its record, argv, parent and direct children.
///
/// Only the target itself must be openable. A parent that is PID 0, the
/// process itself, or already gone leaves `parent` empty; children that
/// exit mid-collection are skipped.
pub fn build_detail(source: &dyn ProcessSource, pid: Pid) -> Result<ProcessDetail> {
    let (process, command_line) = SnapshotBuilder::new(source).build_single_with_argv(pid)?;

    let parent = if process.ppid > 0 && process.ppid != pid {
        collect_pid(source, process.ppid)
            .map_err(|err| debug!("[detail] parent {} of pid={pid}: {err}", process.ppid))
            .ok()
    } else {
        None
    };

    let children_detail = process
        .children
        .iter()
        .filter_map(|&child| {
            collect_pid(source, child)
                .map_err(|err| debug!("[detail] child {child} of pid={pid}: {err}"))
                .ok()
        })
        .collect();

    Ok(ProcessDetail {
        process,
        command_line,
        parent,
        children_detail,
    })
}
