// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use nix::unistd::{sysconf, Pid, SysconfVar};
use tracing::{debug, error, info, warn};

use crate::fork::{new_process, ExitReason};
use crate::procs::Worker;
use crate::Error;

/// Number of online CPU cores, never less than one
pub fn available_cores() -> usize {
    match sysconf(SysconfVar::_NPROCESSORS_ONLN) {
        Ok(Some(online)) if online >= 1 => online as usize,
        _ => std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1),
    }
}

/// A freshly started worker and the notification of its eventual exit
pub struct Launched {
    pub pid: Pid,
    pub exit: BoxFuture<'static, ExitReason>,
}

/// Starts worker processes on behalf of the [`Supervisor`]
pub trait Launch: Send {
    fn launch(&mut self) -> Result<Launched, Error>;
}

/// Starts workers by re-executing the current binary in the [`Worker`] role
#[derive(Debug, Default)]
pub struct ForkLauncher;

impl Launch for ForkLauncher {
    fn launch(&mut self) -> Result<Launched, Error> {
        let child = new_process::<Worker>()?;
        let pid = child.pid();

        Ok(Launched {
            pid,
            exit: child.wait().boxed(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub pid: Pid,
    pub reason: ExitReason,
}

/// Launch and monitor the worker pool
///
/// Rules:
///   - starts one worker per desired slot
///   - every exit, whatever the cause, is answered with a replacement
///   - a slot whose replacement could not be started stays empty until the next exit refills it
///   - there is no backoff and no limit on respawns, a worker that can never start will crash loop
pub struct Supervisor<L: Launch = ForkLauncher> {
    launcher: L,
    desired: usize,
    workers: HashSet<Pid>,
    exits: FuturesUnordered<BoxFuture<'static, WorkerExit>>,
    respawns: u64,
}

impl Supervisor<ForkLauncher> {
    /// A supervisor that forks one worker per CPU core
    pub fn new() -> Self {
        Self::with_launcher(ForkLauncher, available_cores())
    }
}

impl Default for Supervisor<ForkLauncher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Launch> Supervisor<L> {
    /// `desired` is raised to one, a pool of no workers would never serve anything
    pub fn with_launcher(launcher: L, desired: usize) -> Self {
        Self {
            launcher,
            desired: desired.max(1),
            workers: HashSet::new(),
            exits: FuturesUnordered::new(),
            respawns: 0,
        }
    }

    pub fn live_workers(&self) -> usize {
        self.workers.len()
    }

    /// Slots without a running worker, after a failed launch
    pub fn missing_workers(&self) -> usize {
        self.desired.saturating_sub(self.workers.len())
    }

    fn spawn_worker(&mut self) -> Result<Pid, Error> {
        let Launched { pid, exit } = self.launcher.launch()?;

        self.workers.insert(pid);
        self.exits
            .push(async move { WorkerExit { pid, reason: exit.await } }.boxed());

        Ok(pid)
    }

    /// Starts workers until every slot is filled, giving up at the first launch failure.
    ///
    /// Returns the pids that were started.
    fn fill(&mut self) -> Vec<Pid> {
        let mut started = Vec::new();

        while self.missing_workers() > 0 {
            match self.spawn_worker() {
                Ok(pid) => started.push(pid),
                Err(err) => {
                    error!(
                        "failed to start a worker, {} of {} running: {}",
                        self.live_workers(),
                        self.desired,
                        err
                    );
                    break;
                }
            }
        }

        started
    }

    /// Starts the desired number of workers
    ///
    /// Fails only if not a single worker could be started.
    pub fn start(&mut self) -> Result<(), Error> {
        info!(
            "Supervisor {} forking for {} workers...",
            Pid::this(),
            self.desired
        );

        for pid in self.fill() {
            debug!("worker {} started", pid);
        }

        if self.workers.is_empty() {
            return Err(Error::from("no worker could be started"));
        }

        Ok(())
    }

    /// Waits for the next worker to exit and refills the pool.
    ///
    /// Returns the exit that was handled. A replacement that fails to start is logged and its slot
    ///  retried on the next exit. Fails only if there is no worker left to wait on and none can
    ///  be started.
    pub async fn supervise_once(&mut self) -> Result<WorkerExit, Error> {
        if self.workers.is_empty() {
            self.fill();
        }

        let exit = self
            .exits
            .next()
            .await
            .ok_or("no workers are running and none could be started")?;

        self.workers.remove(&exit.pid);
        warn!(
            "Worker {} died ({}); spawning a new one...",
            exit.pid, exit.reason
        );

        for pid in self.fill() {
            self.respawns += 1;
            info!(
                "Worker {} replaced by {} (respawn {})",
                exit.pid, pid, self.respawns
            );
        }

        Ok(exit)
    }

    /// Starts the pool and keeps it running, this only returns once no worker can be started at all
    pub async fn run(mut self) -> Result<(), Error> {
        self.start()?;

        loop {
            self.supervise_once().await?;
        }
    }
}

#[cfg(test)]
impl<L: Launch> Supervisor<L> {
    fn desired(&self) -> usize {
        self.desired
    }

    fn is_live(&self, pid: Pid) -> bool {
        self.workers.contains(&pid)
    }

    fn worker_pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.workers.iter().copied()
    }

    fn respawns(&self) -> u64 {
        self.respawns
    }

    fn launcher(&self) -> &L {
        &self.launcher
    }

    fn launcher_mut(&mut self) -> &mut L {
        &mut self.launcher
    }
}
