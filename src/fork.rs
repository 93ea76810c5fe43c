// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};

use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::procs::Process;
use crate::{Error, ErrorKind};

pub struct StdIoConf {
    pub stdin: Stdio,
    pub stderr: Stdio,
    pub stdout: Stdio,
}

/// Why a child process is no longer running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Normal exit with status code
    Exited(i32),
    /// Killed by signal
    Signaled(Signal),
    /// The status could not be decoded, or waiting on the child failed
    Unknown,
}

impl From<ExitStatus> for ExitReason {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }

        status
            .signal()
            .and_then(|signal| Signal::try_from(signal).ok())
            .map_or(Self::Unknown, Self::Signaled)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {}", code),
            Self::Signaled(signal) => write!(f, "killed by signal {}", signal),
            Self::Unknown => f.write_str("exited for an unknown reason"),
        }
    }
}

/// A running child process, started by re-executing this binary in the role of `P`
#[derive(Debug)]
pub struct Child {
    pid: Pid,
    child: tokio::process::Child,
}

impl Child {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Waits for the process to exit, reaping it.
    pub async fn wait(mut self) -> ExitReason {
        match self.child.wait().await {
            Ok(status) => ExitReason::from(status),
            Err(err) => {
                warn!("failed to wait on child {}: {}", self.pid, err);
                ExitReason::Unknown
            }
        }
    }
}

/// Spawns a new process running this same executable with `P::NAME` as the subcommand.
///
/// The child is killed if the returned handle is dropped, so the processes never outlive the
///  process that started them.
pub fn new_process<P>() -> Result<Child, Error>
where
    P: Process,
{
    let stdio = P::get_stdio();
    let program = std::env::current_exe()?;

    let child = Command::new(&program)
        .arg(P::NAME)
        .kill_on_drop(true)
        .stdin(stdio.stdin)
        .stdout(stdio.stdout)
        .stderr(stdio.stderr)
        .spawn()
        .map_err(|source| ErrorKind::SpawnError {
            name: P::NAME,
            source,
        })?;

    // id() is only None after the child has been polled to completion
    let pid = child
        .id()
        .map(|id| Pid::from_raw(id as libc::pid_t))
        .ok_or("spawned process has no pid")?;

    debug!("started {} process: {} ({})", P::NAME, pid, program.display());
    Ok(Child { pid, child })
}
