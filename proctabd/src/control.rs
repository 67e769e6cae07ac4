//! Kill and signal delivery.
//!
//! Delivery is fire-and-forget: success means the kernel accepted the
//! signal, not that the target exited.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::source::ProcessSource;
use crate::types::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "SIGTERM")]
    Term,
    #[serde(rename = "SIGKILL")]
    Kill,
    #[serde(rename = "SIGINT")]
    Int,
    #[serde(rename = "SIGHUP")]
    Hup,
    #[serde(rename = "SIGUSR1")]
    Usr1,
    #[serde(rename = "SIGUSR2")]
    Usr2,
    #[serde(rename = "SIGQUIT")]
    Quit,
    #[serde(rename = "SIGSTOP")]
    Stop,
    #[serde(rename = "SIGCONT")]
    Cont,
}

impl Signal {
    pub const ALL: [Signal; 9] = [
        Self::Term,
        Self::Kill,
        Self::Int,
        Self::Hup,
        Self::Usr1,
        Self::Usr2,
        Self::Quit,
        Self::Stop,
        Self::Cont,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Term => "SIGTERM",
            Self::Kill => "SIGKILL",
            Self::Int => "SIGINT",
            Self::Hup => "SIGHUP",
            Self::Usr1 => "SIGUSR1",
            Self::Usr2 => "SIGUSR2",
            Self::Quit => "SIGQUIT",
            Self::Stop => "SIGSTOP",
            Self::Cont => "SIGCONT",
        }
    }

    pub fn as_raw(self) -> libc::c_int {
        match self {
            Self::Term => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
            Self::Int => libc::SIGINT,
            Self::Hup => libc::SIGHUP,
            Self::Usr1 => libc::SIGUSR1,
            Self::Usr2 => libc::SIGUSR2,
            Self::Quit => libc::SIGQUIT,
            Self::Stop => libc::SIGSTOP,
            Self::Cont => libc::SIGCONT,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Signal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|sig| sig.name() == s)
            .ok_or_else(|| Error::validation(format!("unsupported signal: {s}")))
    }
}

pub struct ControlDispatcher<'a> {
    source: &'a dyn ProcessSource,
}

impl<'a> ControlDispatcher<'a> {
    pub fn new(source: &'a dyn ProcessSource) -> Self {
        Self { source }
    }

    /// Terminate `pid` immediately (SIGKILL).
    pub fn kill(&self, pid: Pid) -> Result<()> {
        self.deliver(pid, Signal::Kill)
    }

    /// Deliver the named signal. Unknown names are rejected before the
    /// process is looked up.
    pub fn signal(&self, pid: Pid, name: &str) -> Result<()> {
        let signal: Signal = name.parse()?;
        self.deliver(pid, signal)
    }

    fn deliver(&self, pid: Pid, signal: Signal) -> Result<()> {
        // 0 and negative PIDs address process groups in kill(2).
        if pid <= 0 {
            return Err(Error::validation(format!("pid must be positive, got {pid}")));
        }

        let handle = self.source.open(pid)?;
        let name = handle.name().unwrap_or_default();
        handle
            .send_signal(signal)
            .map_err(|err| Error::from_os(pid, err))?;

        warn!(
            target: "proctab_audit",
            "{} delivered to pid={} name={}",
            signal, pid, name
        );
        Ok(())
    }
}
