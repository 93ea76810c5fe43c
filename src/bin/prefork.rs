// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use clap::{ArgMatches, Command};
use tokio::runtime;
use tracing::error;

use prefork::logging;
use prefork::procs::{Process, Role, Supervisor, Worker};
use prefork::Error;

trait SetupClapApp {
    fn setup_clap_app(self) -> Self;
}

impl SetupClapApp for Command {
    fn setup_clap_app(self) -> Self {
        self.version(env!("CARGO_PKG_VERSION"))
            .author(env!("CARGO_PKG_AUTHORS"))
    }
}

fn main() -> Result<(), Error> {
    let args = Command::new(env!("CARGO_PKG_NAME"))
        .setup_clap_app()
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .subcommand(Worker::sub_command().setup_clap_app())
        .get_matches();

    let role = Role::from_matches(&args);
    logging::init(role);

    let result = match role {
        Role::Supervisor => supervise(),
        Role::Worker => {
            let sub_args = args
                .subcommand_matches(Worker::NAME)
                .ok_or("worker arguments are missing")?;
            serve(sub_args)
        }
    };

    if let Err(err) = &result {
        error!("{} {} exited: {}", role, std::process::id(), err);
    }

    result
}

/// The supervisor only waits on children, a single thread is enough
fn supervise() -> Result<(), Error> {
    // the process driver reaps children on SIGCHLD
    let runtime = runtime::Builder::new_current_thread().enable_all().build()?;

    runtime.block_on(Supervisor::new().run())
}

fn serve(args: &ArgMatches) -> Result<(), Error> {
    let runtime = runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(Worker.run(args))
}
