//! Per-PID metrics collection.
//!
//! Each field is fetched on its own. A failed fetch leaves the zero value in
//! place and records the field in `ProcessRecord::unavailable`; only failing
//! to open the process at all is an error.

use chrono::{DateTime, Local};
use log::trace;

use crate::error::Result;
use crate::source::{ProcessHandle, ProcessSource};
use crate::types::{Field, Pid, ProcessRecord, UNKNOWN_NAME};

/// Open `pid` and collect everything except the child list, which depends on
/// the rest of the process table.
pub fn collect_pid(source: &dyn ProcessSource, pid: Pid) -> Result<ProcessRecord> {
    Ok(collect_pid_with_argv(source, pid)?.0)
}

/// `collect_pid`, also handing back the argument vector behind `cmd_line`.
pub fn collect_pid_with_argv(
    source: &dyn ProcessSource,
    pid: Pid,
) -> Result<(ProcessRecord, Vec<String>)> {
    let handle = source.open(pid)?;
    Ok(collect_with_argv(handle.as_ref()))
}

pub fn collect(handle: &dyn ProcessHandle) -> ProcessRecord {
    collect_with_argv(handle).0
}

/// Collect a record plus argv. A failed argv read yields an empty vector and
/// `cmd_line` is marked unavailable.
pub fn collect_with_argv(handle: &dyn ProcessHandle) -> (ProcessRecord, Vec<String>) {
    let pid = handle.pid();
    let mut gaps = Gaps {
        pid,
        fields: Vec::new(),
    };

    let name = match handle.name() {
        Ok(name) => name,
        Err(err) => {
            gaps.note(Field::Name, &err);
            UNKNOWN_NAME.to_string()
        }
    };

    let create_time = gaps.take(Field::CreateTime, handle.create_time());
    let start_time = if gaps.has(Field::CreateTime) {
        String::new()
    } else {
        format_start_time(create_time)
    };

    let mem = gaps.take(Field::Memory, handle.memory_info());
    let io = gaps.take(Field::DiskIo, handle.io_counters());
    let cpu_times = handle
        .cpu_times()
        .map_err(|err| gaps.note(Field::CpuTimes, &err))
        .ok();

    let argv = gaps.take(Field::CmdLine, handle.cmdline());

    let mut envs = gaps.take(Field::Envs, handle.environ());
    let mut open_files = gaps.take(Field::OpenFiles, handle.open_files());
    // Consecutive duplicates only; repeated entries further apart are kept.
    envs.dedup();
    open_files.dedup();

    let record = ProcessRecord {
        pid,
        name,
        ppid: gaps.take(Field::Ppid, handle.ppid()),
        username: gaps.take(Field::Username, handle.username()),
        status: gaps.take(Field::Status, handle.status()),
        background: gaps.take(Field::Background, handle.background()),
        start_time,
        create_time,
        num_threads: gaps.take(Field::NumThreads, handle.num_threads()),
        cpu: gaps.take(Field::Cpu, handle.cpu_percent()),
        cpu_times,
        rss: mem.rss,
        vms: mem.vms,
        hwm: mem.hwm,
        data: mem.data,
        stack: mem.stack,
        locked: mem.locked,
        swap: mem.swap,
        memory_percent: gaps.take(Field::MemoryPercent, handle.memory_percent()),
        disk_read: io.read_bytes,
        disk_write: io.write_bytes,
        exe: gaps.take(Field::Exe, handle.exe()),
        cwd: gaps.take(Field::Cwd, handle.cwd()),
        terminal: gaps.take(Field::Terminal, handle.terminal()),
        nice: gaps.take(Field::Nice, handle.nice()),
        cmd_line: argv.join(" "),
        envs,
        open_files,
        connections: gaps.take(Field::Connections, handle.connections()),
        nets: gaps.take(Field::Nets, handle.net_io()),
        threads: gaps.take(Field::Threads, handle.thread_ids()),
        gids: gaps.take(Field::Gids, handle.gids()),
        uids: gaps.take(Field::Uids, handle.uids()),
        fds: gaps.take(Field::Fds, handle.num_fds()),
        children: Vec::new(),
        unavailable: gaps.fields,
    };
    (record, argv)
}

/// Render epoch milliseconds as local `YYYY-MM-DD HH:MM:SS`.
pub fn format_start_time(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default()
}

struct Gaps {
    pid: Pid,
    fields: Vec<Field>,
}

impl Gaps {
    fn take<T: Default>(&mut self, field: Field, value: anyhow::Result<T>) -> T {
        value.unwrap_or_else(|err| {
            self.note(field, &err);
            T::default()
        })
    }

    fn note(&mut self, field: Field, err: &anyhow::Error) {
        trace!("[collector] pid={} {:?} unavailable: {:#}", self.pid, field, err);
        self.fields.push(field);
    }

    fn has(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }
}
