/*
 * http_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of uhttpmock, a mock HTTP/HTTPS server for testing network clients.
 *
 * uhttpmock is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * uhttpmock is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with uhttpmock.  If not, see <http://www.gnu.org/licenses/>.
 */

//! End-to-end replay test: binds a real loopback listener via `Server::run`,
//! loads a trace file from disk, and drives it with a raw TCP client so the
//! full hyper/tokio worker loop is exercised, not just the in-process handler.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use uhttpmock::server::Server;

fn write_trace(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn send_request(port: u16, raw_request: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(raw_request.as_bytes()).unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

#[test]
fn replays_a_recorded_response_over_a_real_socket() {
    let dir = tempdir();
    let trace = write_trace(
        &dir,
        "replay.trace",
        concat!(
            "> GET /x HTTP/1.1\n",
            "> Host: example.org\n",
            "> \n",
            "  \n",
            "< HTTP/1.1 200 OK\n",
            "< Content-Length: 2\n",
            "< \n",
            "< ok\n",
            "  \n",
        ),
    );

    let mut server = Server::new();
    server.run().expect("run");
    server.load_trace(&trace).expect("load_trace");
    let port = server.port().expect("port assigned");

    let response = send_request(
        port,
        "GET /x HTTP/1.1\r\nHost: example.org\r\nConnection: close\r\n\r\n",
    );

    assert!(response.starts_with("HTTP/1.1 200 OK"), "got: {response}");
    assert!(response.contains("x-mock-trace-file-offset: 1"), "got: {response}");
    assert!(response.ends_with("ok"), "got: {response}");

    server.stop().expect("stop");
}

#[test]
fn mismatched_method_yields_400_with_diagnostic_body() {
    let dir = tempdir();
    let trace = write_trace(
        &dir,
        "mismatch.trace",
        concat!(
            "> GET /x HTTP/1.1\n",
            "> \n",
            "  \n",
            "< HTTP/1.1 200 OK\n",
            "< \n",
            "  \n",
        ),
    );

    let mut server = Server::new();
    server.run().expect("run");
    server.load_trace(&trace).expect("load_trace");
    let port = server.port().expect("port assigned");

    let response = send_request(port, "POST /x HTTP/1.1\r\nConnection: close\r\n\r\n");

    assert!(response.starts_with("HTTP/1.1 400"), "got: {response}");
    assert!(
        response.contains("Expected GET URI '/x', but got POST '/x'."),
        "got: {response}"
    );

    server.stop().expect("stop");
}

#[test]
fn trace_exhaustion_yields_400_unexpected_request() {
    let dir = tempdir();
    let trace = write_trace(
        &dir,
        "exhausted.trace",
        concat!(
            "> GET /x HTTP/1.1\n",
            "> \n",
            "  \n",
            "< HTTP/1.1 200 OK\n",
            "< \n",
            "  \n",
        ),
    );

    let mut server = Server::new();
    server.run().expect("run");
    server.load_trace(&trace).expect("load_trace");
    let port = server.port().expect("port assigned");

    // Consume the single recorded record.
    let _ = send_request(port, "GET /x HTTP/1.1\r\nConnection: close\r\n\r\n");
    // Trace is now exhausted.
    let response = send_request(port, "GET /y HTTP/1.1\r\nConnection: close\r\n\r\n");

    assert!(response.starts_with("HTTP/1.1 400"), "got: {response}");
    assert!(
        response.contains("Expected no request, but got GET '/y'."),
        "got: {response}"
    );

    server.stop().expect("stop");
}

#[test]
fn hosts_sidefile_seeds_the_resolver_on_load() {
    use uhttpmock::resolver::IpFamily;

    let dir = tempdir();
    let trace = write_trace(
        &dir,
        "hosts.trace",
        concat!("> GET / HTTP/1.1\n", "> \n", "  \n", "< HTTP/1.1 200 OK\n", "< \n", "  \n",),
    );
    write_trace(&dir, "hosts.trace.hosts", "api.example.org\n\nwww.example.org\n");

    let mut server = Server::new();
    server.run().expect("run");
    server.load_trace(&trace).expect("load_trace");

    let resolver = server.resolver().expect("resolver installed while running");
    assert!(resolver.lookup_by_name("api.example.org", IpFamily::Default).is_ok());
    assert!(resolver.lookup_by_name("www.example.org", IpFamily::Default).is_ok());
    assert!(resolver.lookup_by_name("unknown.example.org", IpFamily::Default).is_err());

    server.stop().expect("stop");
}

/// Minimal self-cleaning temp directory; avoids pulling in a `tempfile`
/// dependency for four tests.
struct TempDir(std::path::PathBuf);

impl std::ops::Deref for TempDir {
    type Target = std::path::Path;
    fn deref(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn tempdir() -> TempDir {
    let mut path = std::env::temp_dir();
    let unique = format!("uhttpmock-test-{}-{}", std::process::id(), ADDR_COUNTER.next());
    path.push(unique);
    std::fs::create_dir_all(&path).unwrap();
    TempDir(path)
}

/// Per-process monotonic counter so parallel `#[test]` functions never
/// collide on the same temp directory name (no `Instant`/`random` allowed).
struct Counter(std::sync::atomic::AtomicU64);
static ADDR_COUNTER: Counter = Counter(std::sync::atomic::AtomicU64::new(0));
impl Counter {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}
