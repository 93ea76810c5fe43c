// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Console logging for the supervisor and workers.
//!
//! Workers inherit the supervisor's stdout, so all processes log to the same console. The filter is
//!  taken from `RUST_LOG`, defaulting to [`DEFAULT_FILTER`]. Colors are only written to a terminal.

use std::io::{self, IsTerminal};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::procs::Role;

pub const DEFAULT_FILTER: &str = "info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber, a second call is ignored
pub fn init(role: Role) {
    let initialized = tracing_subscriber::registry()
        .with(filter())
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(io::stdout().is_terminal()),
        )
        .try_init()
        .is_ok();

    if initialized {
        tracing::debug!("logging initialized for {}", role);
    }
}
