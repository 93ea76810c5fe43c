// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A pre-forking HTTP server
//!
//! The entry process is the [`procs::Supervisor`], it starts one [`procs::Worker`] per CPU core by
//!  re-executing its own binary, and replaces every worker that exits. Workers all listen on the
//!  same port, `PORT` or 3000.

pub mod api;
pub mod config;
mod error;
pub mod fork;
pub mod logging;
pub mod procs;

pub use error::{Error, ErrorKind};
