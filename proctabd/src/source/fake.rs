//! In-memory process table for tests, with per-field failure injection.

use anyhow::{Result, anyhow};
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ProcessHandle, ProcessSource};
use crate::control::Signal;
use crate::error::Error;
use crate::types::{
    Connection, CpuTimes, Field, IoCounters, MemoryInfo, NetIoCounters, OpenFile, Pid,
    ProcessRecord,
};

pub(crate) struct FakeProcess {
    /// Values handed out by the accessors.
    pub record: ProcessRecord,
    pub argv: Vec<String>,
    pub failing: Vec<Field>,
    pub signal_error: Option<i32>,
}

impl FakeProcess {
    pub fn new(pid: Pid, ppid: Pid, name: &str) -> Self {
        Self {
            record: ProcessRecord {
                pid,
                ppid,
                name: name.to_string(),
                username: "root".to_string(),
                status: "S".to_string(),
                num_threads: 1,
                ..ProcessRecord::default()
            },
            argv: vec![format!("/usr/bin/{name}")],
            failing: Vec::new(),
            signal_error: None,
        }
    }

    pub fn with(mut self, f: impl FnOnce(&mut ProcessRecord)) -> Self {
        f(&mut self.record);
        self
    }

    pub fn argv(mut self, argv: &[&str]) -> Self {
        self.argv = argv.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing(mut self, field: Field) -> Self {
        self.failing.push(field);
        self
    }
}

#[derive(Default)]
pub(crate) struct FakeSource {
    processes: Vec<FakeProcess>,
    /// Listed by `pids()` but gone by the time they are opened.
    ghosts: Vec<Pid>,
    fail_enumeration: bool,
    panic_on: Option<Pid>,
    delivered: Mutex<Vec<(Pid, Signal)>>,
    opens: AtomicUsize,
}

impl FakeSource {
    pub fn new(processes: Vec<FakeProcess>) -> Self {
        Self {
            processes,
            ..Self::default()
        }
    }

    pub fn with_ghost(mut self, pid: Pid) -> Self {
        self.ghosts.push(pid);
        self
    }

    pub fn failing_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    /// Opening `pid` panics, as a collection bug would.
    pub fn panicking_on(mut self, pid: Pid) -> Self {
        self.panic_on = Some(pid);
        self
    }

    pub fn delivered(&self) -> Vec<(Pid, Signal)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn open_calls(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ProcessSource for FakeSource {
    fn pids(&self) -> Result<Vec<Pid>> {
        if self.fail_enumeration {
            return Err(anyhow!("/proc unreadable"));
        }
        let mut pids: Vec<Pid> = self.processes.iter().map(|p| p.record.pid).collect();
        pids.extend(&self.ghosts);
        Ok(pids)
    }

    fn open(&self, pid: Pid) -> Result<Box<dyn ProcessHandle + '_>, Error> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.panic_on == Some(pid) {
            panic!("collector bug on pid {pid}");
        }
        let proc = self
            .processes
            .iter()
            .find(|p| p.record.pid == pid)
            .ok_or(Error::NotFound(pid))?;
        Ok(Box::new(FakeHandle { source: self, proc }))
    }

    fn child_pids(&self, pid: Pid) -> Result<Vec<Pid>> {
        let mut children: Vec<Pid> = self
            .processes
            .iter()
            .filter(|p| p.record.ppid == pid && p.record.pid != pid)
            .map(|p| p.record.pid)
            .collect();
        children.sort_unstable();
        Ok(children)
    }
}

struct FakeHandle<'a> {
    source: &'a FakeSource,
    proc: &'a FakeProcess,
}

impl FakeHandle<'_> {
    fn get<T>(&self, field: Field, value: T) -> Result<T> {
        if self.proc.failing.contains(&field) {
            Err(anyhow!("permission denied reading {field:?}"))
        } else {
            Ok(value)
        }
    }
}

impl ProcessHandle for FakeHandle<'_> {
    fn pid(&self) -> Pid {
        self.proc.record.pid
    }

    fn name(&self) -> Result<String> {
        self.get(Field::Name, self.proc.record.name.clone())
    }

    fn ppid(&self) -> Result<Pid> {
        self.get(Field::Ppid, self.proc.record.ppid)
    }

    fn username(&self) -> Result<String> {
        self.get(Field::Username, self.proc.record.username.clone())
    }

    fn status(&self) -> Result<String> {
        self.get(Field::Status, self.proc.record.status.clone())
    }

    fn background(&self) -> Result<bool> {
        self.get(Field::Background, self.proc.record.background)
    }

    fn create_time(&self) -> Result<i64> {
        self.get(Field::CreateTime, self.proc.record.create_time)
    }

    fn num_threads(&self) -> Result<i32> {
        self.get(Field::NumThreads, self.proc.record.num_threads)
    }

    fn cpu_percent(&self) -> Result<f64> {
        self.get(Field::Cpu, self.proc.record.cpu)
    }

    fn cpu_times(&self) -> Result<CpuTimes> {
        self.get(Field::CpuTimes, self.proc.record.cpu_times.unwrap_or_default())
    }

    fn memory_info(&self) -> Result<MemoryInfo> {
        let r = &self.proc.record;
        self.get(
            Field::Memory,
            MemoryInfo {
                rss: r.rss,
                vms: r.vms,
                hwm: r.hwm,
                data: r.data,
                stack: r.stack,
                locked: r.locked,
                swap: r.swap,
            },
        )
    }

    fn memory_percent(&self) -> Result<f32> {
        self.get(Field::MemoryPercent, self.proc.record.memory_percent)
    }

    fn io_counters(&self) -> Result<IoCounters> {
        self.get(
            Field::DiskIo,
            IoCounters {
                read_bytes: self.proc.record.disk_read,
                write_bytes: self.proc.record.disk_write,
            },
        )
    }

    fn exe(&self) -> Result<String> {
        self.get(Field::Exe, self.proc.record.exe.clone())
    }

    fn cwd(&self) -> Result<String> {
        self.get(Field::Cwd, self.proc.record.cwd.clone())
    }

    fn terminal(&self) -> Result<String> {
        self.get(Field::Terminal, self.proc.record.terminal.clone())
    }

    fn nice(&self) -> Result<i32> {
        self.get(Field::Nice, self.proc.record.nice)
    }

    fn cmdline(&self) -> Result<Vec<String>> {
        self.get(Field::CmdLine, self.proc.argv.clone())
    }

    fn environ(&self) -> Result<Vec<String>> {
        self.get(Field::Envs, self.proc.record.envs.clone())
    }

    fn open_files(&self) -> Result<Vec<OpenFile>> {
        self.get(Field::OpenFiles, self.proc.record.open_files.clone())
    }

    fn connections(&self) -> Result<Vec<Connection>> {
        self.get(Field::Connections, self.proc.record.connections.clone())
    }

    fn net_io(&self) -> Result<Vec<NetIoCounters>> {
        self.get(Field::Nets, self.proc.record.nets.clone())
    }

    fn thread_ids(&self) -> Result<Vec<Pid>> {
        self.get(Field::Threads, self.proc.record.threads.clone())
    }

    fn gids(&self) -> Result<Vec<u32>> {
        self.get(Field::Gids, self.proc.record.gids.clone())
    }

    fn uids(&self) -> Result<Vec<u32>> {
        self.get(Field::Uids, self.proc.record.uids.clone())
    }

    fn num_fds(&self) -> Result<i32> {
        self.get(Field::Fds, self.proc.record.fds)
    }

    fn send_signal(&self, signal: Signal) -> io::Result<()> {
        if let Some(errno) = self.proc.signal_error {
            return Err(io::Error::from_raw_os_error(errno));
        }
        self.source
            .delivered
            .lock()
            .unwrap()
            .push((self.proc.record.pid, signal));
        Ok(())
    }
}
