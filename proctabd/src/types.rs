use serde::{Deserialize, Serialize};

pub type Pid = i32;

/// Display name used when the process name itself cannot be read.
pub const UNKNOWN_NAME: &str = "<UNKNOWN>";

/// Metrics that can individually fail to load for a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Ppid,
    Username,
    Status,
    Background,
    CreateTime,
    NumThreads,
    Cpu,
    CpuTimes,
    Memory,
    MemoryPercent,
    DiskIo,
    Exe,
    Cwd,
    Terminal,
    Nice,
    CmdLine,
    Envs,
    OpenFiles,
    Connections,
    Nets,
    Threads,
    Gids,
    Uids,
    Fds,
    Children,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuTimes {
    /// Seconds spent in user mode.
    pub user: f64,
    /// Seconds spent in kernel mode.
    pub system: f64,
}

/// Memory segments in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub rss: u64,
    pub vms: u64,
    pub hwm: u64,
    pub data: u64,
    pub stack: u64,
    pub locked: u64,
    pub swap: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFile {
    pub path: String,
    pub fd: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub fd: u64,
    /// `inet` or `inet6`.
    pub family: String,
    /// `tcp` or `udp`.
    #[serde(rename = "type")]
    pub kind: String,
    pub local_addr: String,
    pub remote_addr: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetIoCounters {
    pub name: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
    pub dropin: u64,
    pub dropout: u64,
}

/// One process as observed at snapshot time.
///
/// Every metric is optional in practice: a field that could not be read keeps
/// its zero value and is named in `unavailable`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: Pid,
    pub name: String,
    pub ppid: Pid,
    pub username: String,
    pub status: String,
    pub background: bool,
    /// Local wall-clock rendering of `create_time`.
    pub start_time: String,
    /// Milliseconds since the Unix epoch.
    pub create_time: i64,
    pub num_threads: i32,
    pub cpu: f64,
    pub cpu_times: Option<CpuTimes>,

    pub rss: u64,
    pub vms: u64,
    pub hwm: u64,
    pub data: u64,
    pub stack: u64,
    pub locked: u64,
    pub swap: u64,
    pub memory_percent: f32,

    pub disk_read: u64,
    pub disk_write: u64,

    pub exe: String,
    pub cwd: String,
    pub terminal: String,
    pub nice: i32,

    pub cmd_line: String,
    pub envs: Vec<String>,
    pub open_files: Vec<OpenFile>,
    pub connections: Vec<Connection>,
    pub nets: Vec<NetIoCounters>,

    pub threads: Vec<Pid>,
    pub gids: Vec<u32>,
    pub uids: Vec<u32>,
    pub fds: i32,
    pub children: Vec<Pid>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<Field>,
}

impl ProcessRecord {
    pub fn is_available(&self, field: Field) -> bool {
        !self.unavailable.contains(&field)
    }
}

/// A process plus its descendants, `level` 0 at the roots.
///
/// Serialized as `{"process": {..}, "level": n, "children": [..]}`. The record
/// is kept nested because it carries its own `children` PID list.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessTreeNode {
    pub process: ProcessRecord,
    pub level: usize,
    pub children: Vec<ProcessTreeNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessDetail {
    #[serde(flatten)]
    pub process: ProcessRecord,
    pub command_line: Vec<String>,
    pub parent: Option<ProcessRecord>,
    pub children_detail: Vec<ProcessRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessPage {
    pub total: usize,
    pub items: Vec<ProcessRecord>,
}
