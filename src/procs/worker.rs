// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use clap::{ArgMatches, Command};
use nix::unistd::Pid;
use tokio::net::{TcpListener, TcpSocket};
use tracing::info;

use crate::api;
use crate::config::Config;
use crate::procs::Process;
use crate::{Error, ErrorKind};

const LISTEN_BACKLOG: u32 = 1024;

/// Serve HTTP on the shared port
///
/// Rules:
///   - reads its own configuration at startup, nothing is inherited from the supervisor
///   - any failure to start is fatal, the supervisor will start a replacement
///   - never starts other processes
#[derive(Debug)]
pub struct Worker;

#[async_trait]
impl Process for Worker {
    const NAME: &'static str = "worker";

    fn sub_command() -> Command {
        Command::new(Self::NAME)
            .about("HTTP worker, started by the supervisor")
            .hide(true)
    }

    async fn run(self, _args: &ArgMatches) -> Result<(), Error> {
        let config = Config::from_env()?;
        let listener = bind_shared(config.port)?;

        info!(
            "Worker {} started and listening on port {}",
            Pid::this(),
            config.port
        );

        axum::serve(listener, api::router()).await?;

        Err(Error::from("Worker unexpectedly stopped serving"))
    }
}

/// Binds a listener on all interfaces that other workers may bind at the same time.
///
/// Every worker sets `SO_REUSEPORT`, the kernel distributes incoming connections between them.
pub fn bind_shared(port: u16) -> Result<TcpListener, Error> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

    let bind = || -> io::Result<TcpListener> {
        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.set_reuseport(true)?;
        socket.bind(addr)?;
        socket.listen(LISTEN_BACKLOG)
    };

    bind().map_err(|source| Error::from(ErrorKind::BindError { port, source }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workers_share_a_port() {
        let first = bind_shared(0).expect("bind failed");
        let port = first.local_addr().unwrap().port();

        let second = bind_shared(port).expect("second worker could not bind");
        assert_eq!(second.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let taken = std::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = bind_shared(port).unwrap_err();
        match err.kind() {
            ErrorKind::BindError { port: failed, .. } => assert_eq!(*failed, port),
            other => panic!("unexpected error: {}", other),
        }
    }
}
