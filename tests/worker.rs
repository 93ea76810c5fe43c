// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use prefork::api::{Greeting, GREETING};

const BIN: &str = env!("CARGO_BIN_EXE_prefork");

/// Kills the worker even if an assertion fails
struct WorkerGuard(Child);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.kill().ok();
        self.0.wait().ok();
    }
}

fn free_port() -> u16 {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn start_worker(port: &str) -> Child {
    Command::new(BIN)
        .arg("worker")
        .env("PORT", port)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .spawn()
        .expect("failed to start worker")
}

fn get(port: u16, path: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(10);

    let mut stream = loop {
        match TcpStream::connect((Ipv4Addr::LOCALHOST, port)) {
            Ok(stream) => break stream,
            Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(50)),
            Err(err) => panic!("worker never listened on {}: {}", port, err),
        }
    };

    write!(
        stream,
        "GET {} HTTP/1.1\r\nHost: localhost:{}\r\nConnection: close\r\n\r\n",
        path, port
    )
    .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

fn body(response: &str) -> &str {
    response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .expect("no body in response")
}

#[test]
fn test_worker_greets_on_configured_port() {
    let port = free_port();
    let worker = WorkerGuard(start_worker(&port.to_string()));

    let response = get(port, "/");
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{}", response);

    let greeting: Greeting = serde_json::from_str(body(&response)).unwrap();
    assert_eq!(greeting.pid, worker.0.id());
    assert_eq!(greeting.message, GREETING);
}

#[test]
fn test_worker_unknown_route() {
    let port = free_port();
    let _worker = WorkerGuard(start_worker(&port.to_string()));

    let response = get(port, "/nope");
    assert!(response.starts_with("HTTP/1.1 404"), "{}", response);
    assert_eq!(body(&response), "Cannot GET /nope");
}

#[test]
fn test_worker_exits_on_invalid_port() {
    let mut worker = start_worker("not-a-port");
    let status = worker.wait().unwrap();
    assert!(!status.success());
}

#[test]
fn test_redirected_log_has_no_color_codes() {
    let port = free_port();
    let mut worker = WorkerGuard(
        Command::new(BIN)
            .arg("worker")
            .env("PORT", port.to_string())
            .env("RUST_LOG", "info")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .expect("failed to start worker"),
    );

    let stdout = worker.0.stdout.take().expect("no stdout");
    let started = BufReader::new(stdout)
        .lines()
        .map(|line| line.expect("unreadable log line"))
        .find(|line| line.contains("started and listening"))
        .expect("worker never logged its start");

    assert!(!started.contains('\x1b'), "{:?}", started);
    assert!(started.contains(&format!("port {}", port)), "{}", started);
}
