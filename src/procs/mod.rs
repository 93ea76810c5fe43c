// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod supervisor;
mod worker;

pub use supervisor::{available_cores, ForkLauncher, Launch, Launched, Supervisor, WorkerExit};
pub use worker::{bind_shared, Worker};

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use clap::{ArgMatches, Command};

use crate::fork::StdIoConf;
use crate::Error;

/// A trait to define common construction of a process started by re-executing this binary
#[async_trait]
pub trait Process: Sized + Send + 'static {
    /// The subcommand that selects this process when the binary is re-executed
    const NAME: &'static str;

    fn sub_command() -> Command;

    async fn run(self, args: &ArgMatches) -> Result<(), Error>;

    /// By default children share the console of the supervisor
    fn get_stdio() -> StdIoConf {
        StdIoConf {
            stdin: Stdio::null(),
            stderr: Stdio::inherit(),
            stdout: Stdio::inherit(),
        }
    }
}

/// The role of this process, decided once at startup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Supervisor,
    Worker,
}

impl Role {
    /// Only a re-executed child carries a role subcommand, the entry process is always the Supervisor
    pub fn from_matches(args: &ArgMatches) -> Self {
        match args.subcommand_name() {
            Some(Worker::NAME) => Role::Worker,
            _ => Role::Supervisor,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Supervisor => f.write_str("supervisor"),
            Role::Worker => f.write_str(Worker::NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> Command {
        Command::new("prefork").subcommand(Worker::sub_command())
    }

    #[test]
    fn test_role_without_args_is_supervisor() {
        let args = app().get_matches_from(["prefork"]);
        assert_eq!(Role::from_matches(&args), Role::Supervisor);
    }

    #[test]
    fn test_role_worker() {
        let args = app().get_matches_from(["prefork", "worker"]);
        assert_eq!(Role::from_matches(&args), Role::Worker);
        assert_eq!(Role::Worker.to_string(), "worker");
    }
}
