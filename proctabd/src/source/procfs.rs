use anyhow::{Context, Result, anyhow};
use procfs::net::{DeviceStatus, TcpState};
use procfs::process::{FDTarget, Process};
use procfs::{ProcError, ProcResult};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};
use sysinfo::{System, Users};

use super::{ProcessHandle, ProcessSource};
use crate::control::Signal;
use crate::error::Error;
use crate::types::{
    Connection, CpuTimes, IoCounters, MemoryInfo, NetIoCounters, OpenFile, Pid,
};

/// Kernel truncates `comm` to this many bytes.
const COMM_LEN: usize = 15;

/// Reads `/proc` for metrics and `kill(2)` for delivery.
pub struct ProcfsSource {
    users: RwLock<Users>,
    total_memory: u64,
    ticks_per_second: u64,
    boot_time: u64,
}

impl ProcfsSource {
    pub fn new() -> Result<Self> {
        let boot_time = procfs::boot_time_secs().context("failed to read boot time")?;
        let ticks_per_second = procfs::ticks_per_second().max(1);

        let mut sys = System::new();
        sys.refresh_memory();

        Ok(Self {
            users: RwLock::new(Users::new_with_refreshed_list()),
            total_memory: sys.total_memory(),
            ticks_per_second,
            boot_time,
        })
    }

    fn refresh_users(&self) {
        if let Ok(mut users) = self.users.write() {
            *users = Users::new_with_refreshed_list();
        }
    }

    fn lookup_user(&self, uid: u32) -> Option<String> {
        let users = self.users.read().ok()?;
        users
            .list()
            .iter()
            .find(|user| **user.id() == uid)
            .map(|user| user.name().to_string())
    }

    fn ticks_to_secs(&self, ticks: u64) -> f64 {
        ticks as f64 / self.ticks_per_second as f64
    }
}

impl ProcessSource for ProcfsSource {
    fn pids(&self) -> Result<Vec<Pid>> {
        let procs = procfs::process::all_processes().context("failed to read /proc")?;
        // Fresh user table per enumeration so new accounts resolve.
        self.refresh_users();
        Ok(procs.filter_map(|p| p.ok()).map(|p| p.pid).collect())
    }

    fn open(&self, pid: Pid) -> Result<Box<dyn ProcessHandle + '_>, Error> {
        if pid <= 0 {
            return Err(Error::NotFound(pid));
        }
        let process = Process::new(pid).map_err(|err| open_error(pid, err))?;
        // The directory can outlive a reaped process briefly; stat settles it.
        process.stat().map_err(|err| open_error(pid, err))?;
        Ok(Box::new(ProcfsHandle {
            source: self,
            process,
        }))
    }

    fn child_pids(&self, pid: Pid) -> Result<Vec<Pid>> {
        let procs = procfs::process::all_processes().context("failed to read /proc")?;
        let mut children: Vec<Pid> = procs
            .filter_map(|p| p.ok())
            .filter_map(|p| p.stat().ok())
            .filter(|stat| stat.ppid == pid && stat.pid != pid)
            .map(|stat| stat.pid)
            .collect();
        children.sort_unstable();
        Ok(children)
    }
}

fn open_error(pid: Pid, err: ProcError) -> Error {
    match err {
        ProcError::NotFound(_) => Error::NotFound(pid),
        ProcError::PermissionDenied(_) => Error::Os {
            pid,
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        },
        ProcError::Io(source, _) => Error::from_os(pid, source),
        other => Error::Os {
            pid,
            source: io::Error::other(other.to_string()),
        },
    }
}

struct ProcfsHandle<'a> {
    source: &'a ProcfsSource,
    process: Process,
}

impl ProcfsHandle<'_> {
    fn proc_path(&self, file: &str) -> String {
        format!("/proc/{}/{}", self.process.pid, file)
    }

    fn socket_fds(&self) -> Result<HashMap<u64, u64>> {
        let mut sockets = HashMap::new();
        for fd in self.process.fd()?.flatten() {
            if let FDTarget::Socket(inode) = fd.target {
                sockets.insert(inode, fd.fd as u64);
            }
        }
        Ok(sockets)
    }
}

impl ProcessHandle for ProcfsHandle<'_> {
    fn pid(&self) -> Pid {
        self.process.pid
    }

    fn name(&self) -> Result<String> {
        let comm = self.process.stat()?.comm;
        if comm.len() < COMM_LEN {
            return Ok(comm);
        }
        // comm is truncated; recover the full name from argv[0] when it agrees.
        let full = self
            .process
            .cmdline()
            .ok()
            .and_then(|argv| argv.into_iter().next())
            .and_then(|arg0| {
                arg0.rsplit('/')
                    .next()
                    .filter(|base| base.starts_with(&comm))
                    .map(str::to_string)
            });
        Ok(full.unwrap_or(comm))
    }

    fn ppid(&self) -> Result<Pid> {
        Ok(self.process.stat()?.ppid)
    }

    fn username(&self) -> Result<String> {
        let uid = self.process.status()?.ruid;
        self.source
            .lookup_user(uid)
            .ok_or_else(|| anyhow!("no user entry for uid {uid}"))
    }

    fn status(&self) -> Result<String> {
        Ok(self.process.stat()?.state.to_string())
    }

    fn background(&self) -> Result<bool> {
        let stat = self.process.stat()?;
        Ok(stat.pgrp != stat.tpgid)
    }

    fn create_time(&self) -> Result<i64> {
        let stat = self.process.stat()?;
        let millis = self.source.boot_time * 1000 + stat.starttime * 1000 / self.source.ticks_per_second;
        Ok(millis as i64)
    }

    fn num_threads(&self) -> Result<i32> {
        Ok(self.process.stat()?.num_threads as i32)
    }

    fn cpu_percent(&self) -> Result<f64> {
        let stat = self.process.stat()?;
        let busy = self.source.ticks_to_secs(stat.utime + stat.stime);
        let started = self.source.boot_time as f64 + self.source.ticks_to_secs(stat.starttime);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let elapsed = now - started;
        if elapsed <= 0.0 {
            return Ok(0.0);
        }
        Ok(100.0 * busy / elapsed)
    }

    fn cpu_times(&self) -> Result<CpuTimes> {
        let stat = self.process.stat()?;
        Ok(CpuTimes {
            user: self.source.ticks_to_secs(stat.utime),
            system: self.source.ticks_to_secs(stat.stime),
        })
    }

    fn memory_info(&self) -> Result<MemoryInfo> {
        let status = self.process.status()?;
        let kb = |v: Option<u64>| v.unwrap_or(0) * 1024;
        Ok(MemoryInfo {
            rss: kb(status.vmrss),
            vms: kb(status.vmsize),
            hwm: kb(status.vmhwm),
            data: kb(status.vmdata),
            stack: kb(status.vmstk),
            locked: kb(status.vmlck),
            swap: kb(status.vmswap),
        })
    }

    fn memory_percent(&self) -> Result<f32> {
        if self.source.total_memory == 0 {
            return Err(anyhow!("total memory unknown"));
        }
        let rss = self.memory_info()?.rss;
        Ok((rss as f64 / self.source.total_memory as f64 * 100.0) as f32)
    }

    fn io_counters(&self) -> Result<IoCounters> {
        let io = self.process.io()?;
        Ok(IoCounters {
            read_bytes: io.read_bytes,
            write_bytes: io.write_bytes,
        })
    }

    fn exe(&self) -> Result<String> {
        Ok(self.process.exe()?.to_string_lossy().into_owned())
    }

    fn cwd(&self) -> Result<String> {
        Ok(self.process.cwd()?.to_string_lossy().into_owned())
    }

    fn terminal(&self) -> Result<String> {
        Ok(tty_name(self.process.stat()?.tty_nr))
    }

    fn nice(&self) -> Result<i32> {
        Ok(self.process.stat()?.nice as i32)
    }

    fn cmdline(&self) -> Result<Vec<String>> {
        Ok(self.process.cmdline()?)
    }

    fn environ(&self) -> Result<Vec<String>> {
        let path = self.proc_path("environ");
        let raw = fs::read(&path).with_context(|| format!("failed to read {path}"))?;
        Ok(split_nul(&raw))
    }

    fn open_files(&self) -> Result<Vec<OpenFile>> {
        let mut files = Vec::new();
        for fd in self.process.fd()?.flatten() {
            if let FDTarget::Path(path) = fd.target {
                files.push(OpenFile {
                    path: path.to_string_lossy().into_owned(),
                    fd: fd.fd as u64,
                });
            }
        }
        Ok(files)
    }

    fn connections(&self) -> Result<Vec<Connection>> {
        let sockets = self.socket_fds()?;
        if sockets.is_empty() {
            return Ok(Vec::new());
        }

        // Tables come from the target's own network namespace.
        let mut conns = Vec::new();
        for (family, table) in [("inet", self.process.tcp()), ("inet6", self.process.tcp6())] {
            for e in optional_table(table)? {
                if let Some(&fd) = sockets.get(&e.inode) {
                    conns.push(Connection {
                        fd,
                        family: family.to_string(),
                        kind: "tcp".to_string(),
                        local_addr: e.local_address.to_string(),
                        remote_addr: e.remote_address.to_string(),
                        status: tcp_status(&e.state).to_string(),
                    });
                }
            }
        }
        for (family, table) in [("inet", self.process.udp()), ("inet6", self.process.udp6())] {
            for e in optional_table(table)? {
                if let Some(&fd) = sockets.get(&e.inode) {
                    conns.push(Connection {
                        fd,
                        family: family.to_string(),
                        kind: "udp".to_string(),
                        local_addr: e.local_address.to_string(),
                        remote_addr: e.remote_address.to_string(),
                        status: "NONE".to_string(),
                    });
                }
            }
        }

        conns.sort_by_key(|c| c.fd);
        Ok(conns)
    }

    fn net_io(&self) -> Result<Vec<NetIoCounters>> {
        let devices = self.process.dev_status()?;
        Ok(vec![sum_devices(devices.values())])
    }

    fn thread_ids(&self) -> Result<Vec<Pid>> {
        Ok(self.process.tasks()?.flatten().map(|task| task.tid).collect())
    }

    fn gids(&self) -> Result<Vec<u32>> {
        let s = self.process.status()?;
        Ok(vec![s.rgid, s.egid, s.sgid, s.fgid])
    }

    fn uids(&self) -> Result<Vec<u32>> {
        let s = self.process.status()?;
        Ok(vec![s.ruid, s.euid, s.suid, s.fuid])
    }

    fn num_fds(&self) -> Result<i32> {
        Ok(self.process.fd_count()? as i32)
    }

    fn send_signal(&self, signal: Signal) -> io::Result<()> {
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(self.process.pid, signal.as_raw()) };
        if rc == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

/// Render a `tty_nr` device number the way `ps` names terminals.
fn tty_name(tty_nr: i32) -> String {
    if tty_nr == 0 {
        return String::new();
    }
    let dev = tty_nr as u32;
    let major = (dev >> 8) & 0xfff;
    let minor = (dev & 0xff) | ((dev >> 12) & 0xfff00);
    match major {
        4 if minor < 64 => format!("tty{minor}"),
        4 => format!("ttyS{}", minor - 64),
        136..=143 => format!("pts/{}", (major - 136) * 256 + minor),
        _ => format!("{major}:{minor}"),
    }
}

fn split_nul(raw: &[u8]) -> Vec<String> {
    raw.split(|b| *b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Fold every interface of a namespace into a single `all` entry.
fn sum_devices<'a>(devices: impl IntoIterator<Item = &'a DeviceStatus>) -> NetIoCounters {
    devices.into_iter().fold(
        NetIoCounters {
            name: "all".to_string(),
            ..NetIoCounters::default()
        },
        |mut total, dev| {
            total.bytes_recv += dev.recv_bytes;
            total.packets_recv += dev.recv_packets;
            total.errin += dev.recv_errs;
            total.dropin += dev.recv_drop;
            total.bytes_sent += dev.sent_bytes;
            total.packets_sent += dev.sent_packets;
            total.errout += dev.sent_errs;
            total.dropout += dev.sent_drop;
            total
        },
    )
}

/// A socket table the kernel does not expose (IPv6 disabled) reads as empty.
fn optional_table<T>(table: ProcResult<Vec<T>>) -> Result<Vec<T>> {
    match table {
        Ok(entries) => Ok(entries),
        Err(ProcError::NotFound(_)) => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

fn tcp_status(state: &TcpState) -> &'static str {
    match state {
        TcpState::Established => "ESTABLISHED",
        TcpState::SynSent => "SYN_SENT",
        TcpState::SynRecv | TcpState::NewSynRecv => "SYN_RECV",
        TcpState::FinWait1 => "FIN_WAIT1",
        TcpState::FinWait2 => "FIN_WAIT2",
        TcpState::TimeWait => "TIME_WAIT",
        TcpState::Close => "CLOSE",
        TcpState::CloseWait => "CLOSE_WAIT",
        TcpState::LastAck => "LAST_ACK",
        TcpState::Listen => "LISTEN",
        TcpState::Closing => "CLOSING",
    }
}
