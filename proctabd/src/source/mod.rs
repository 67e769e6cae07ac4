//! OS process-inspection and control capability.
//!
//! The rest of the crate only sees these traits; `ProcfsSource` is the Linux
//! implementation and tests use an in-memory fake.

use anyhow::Result;
use std::io;

use crate::control::Signal;
use crate::error::Error;
use crate::types::{
    Connection, CpuTimes, IoCounters, MemoryInfo, NetIoCounters, OpenFile, Pid,
};

#[cfg(test)]
pub(crate) mod fake;
mod procfs;

pub use self::procfs::ProcfsSource;

pub trait ProcessSource: Send + Sync {
    /// Every PID visible at this instant.
    fn pids(&self) -> Result<Vec<Pid>>;

    /// Resolve a live handle. Fails with `Error::NotFound` when the process
    /// does not exist and `Error::Os` when it cannot be opened.
    fn open(&self, pid: Pid) -> Result<Box<dyn ProcessHandle + '_>, Error>;

    /// Immediate children of `pid`.
    fn child_pids(&self, pid: Pid) -> Result<Vec<Pid>>;
}

/// A live process. Each accessor fails independently of the others.
pub trait ProcessHandle {
    fn pid(&self) -> Pid;

    fn name(&self) -> Result<String>;
    fn ppid(&self) -> Result<Pid>;
    fn username(&self) -> Result<String>;
    fn status(&self) -> Result<String>;
    fn background(&self) -> Result<bool>;
    /// Milliseconds since the Unix epoch.
    fn create_time(&self) -> Result<i64>;
    fn num_threads(&self) -> Result<i32>;
    fn cpu_percent(&self) -> Result<f64>;
    fn cpu_times(&self) -> Result<CpuTimes>;
    fn memory_info(&self) -> Result<MemoryInfo>;
    fn memory_percent(&self) -> Result<f32>;
    fn io_counters(&self) -> Result<IoCounters>;
    fn exe(&self) -> Result<String>;
    fn cwd(&self) -> Result<String>;
    fn terminal(&self) -> Result<String>;
    fn nice(&self) -> Result<i32>;
    fn cmdline(&self) -> Result<Vec<String>>;
    fn environ(&self) -> Result<Vec<String>>;
    fn open_files(&self) -> Result<Vec<OpenFile>>;
    fn connections(&self) -> Result<Vec<Connection>>;
    fn net_io(&self) -> Result<Vec<NetIoCounters>>;
    fn thread_ids(&self) -> Result<Vec<Pid>>;
    fn gids(&self) -> Result<Vec<u32>>;
    fn uids(&self) -> Result<Vec<u32>>;
    fn num_fds(&self) -> Result<i32>;

    /// Hand `signal` to the kernel. Returns once delivered, not once handled.
    fn send_signal(&self, signal: Signal) -> io::Result<()>;
}
