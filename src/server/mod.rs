/*
 * mod.rs
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

//! Mock HTTP/HTTPS server: lifecycle, trace-directory conveniences, and the
//! replay/compare orchestration that ties `Message`, `TraceCodec`,
//! `CompareEngine` and `Resolver` together.

pub mod error;
mod handler;
mod install;
mod tls;
mod worker;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response};
use url::Url;

pub use error::ServerError;
pub use handler::HandledResponse;
pub use tls::TlsCertificate;
pub use worker::WorkerHandle;

use crate::compare::{CompareEngine, CompareFilter, IgnoreQueryParamsFilter};
use crate::message::Message;
use crate::resolver::{IpFamily, Resolver};
use crate::trace::TraceCodec;

/// A `handle-message`-style override: given the incoming request, either
/// fully handle it and return `Some(response)`, or return `None` to fall
/// through to the default trace-replay dispatch. Mirrors `UhmServerClass`'s
/// overridable `handle_message` vtable slot, re-architected as a plain
/// callback held by the `Server` rather than a GObject signal.
pub type HandleMessageFn = dyn Fn(&Message) -> Option<HandledResponse> + Send + Sync;

/// Static configuration knobs, mirroring `uhm_server_set_enable_online`,
/// `uhm_server_set_enable_logging`, `uhm_server_set_expected_domain_names`
/// and the certificate/trace-directory properties. Plain setters rather
/// than a builder.
pub struct ServerConfig {
    pub trace_directory: PathBuf,
    pub enable_online: bool,
    pub enable_logging: bool,
    pub tls_certificate: Option<TlsCertificate>,
    pub expected_domain_names: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            trace_directory: PathBuf::from("."),
            enable_online: false,
            enable_logging: false,
            tls_certificate: None,
            expected_domain_names: Vec::new(),
        }
    }
}

/// State scoped to one loaded trace: the input/output streams, the
/// lazily-parsed next expected message, the running comparison engine and
/// message counter, and the hosts-file dedupe set used while logging.
struct TraceState {
    trace_path: PathBuf,
    reader: Option<BufReader<File>>,
    log_writer: Option<BufWriter<File>>,
    hosts_writer: Option<BufWriter<File>>,
    hosts_seen: HashSet<String>,
    next_expected: Option<Message>,
    message_counter: u64,
    compare: CompareEngine,
}

impl TraceState {
    fn unload(mut self) -> Result<(), ServerError> {
        if let Some(mut w) = self.log_writer.take() {
            w.flush()?;
        }
        if let Some(mut w) = self.hosts_writer.take() {
            w.flush()?;
        }
        Ok(())
    }
}

/// State shared between the foreground `Server` handle and the worker
/// thread's request handler. Guarded by a single mutex: the handler runs on
/// the worker thread only, and the foreground is blocked in `run()` for the
/// duration.
struct SharedInner {
    trace: Option<TraceState>,
    port: u16,
    tls: bool,
    compare_filter: Option<Arc<dyn CompareFilter + Send + Sync>>,
    handle_message: Option<Arc<HandleMessageFn>>,
}

pub(crate) struct SharedState {
    inner: Mutex<SharedInner>,
}

impl SharedState {
    /// The server's own origin (`http(s)://127.0.0.1:{port}/`), used both to
    /// resolve relative trace URIs and to turn an incoming origin-form
    /// request line (`GET /x HTTP/1.1` + `Host:`) into an absolute `Message`
    /// URI.
    pub(crate) fn base_uri(&self) -> Url {
        let inner = self.inner.lock().unwrap();
        let scheme = if inner.tls { "https" } else { "http" };
        Url::parse(&format!("{}://127.0.0.1:{}/", scheme, inner.port)).unwrap()
    }

    fn process_request(&self, actual: &Message) -> HandledResponse {
        let mut inner = self.inner.lock().unwrap();
        let port = inner.port;
        let scheme = if inner.tls { "https" } else { "http" };

        if let Some(callback) = inner.handle_message.clone() {
            if let Some(response) = callback(actual) {
                return response;
            }
        }

        let Some(trace) = inner.trace.as_mut() else {
            let mut fallback = CompareEngine::new();
            if let Some(filter) = &inner.compare_filter {
                fallback.set_filter(Arc::clone(filter));
            }
            let mut no_trace: Option<Message> = None;
            let mut counter = 0u64;
            return handler::handle_message(&mut fallback, &mut no_trace, actual, &mut counter, "", port);
        };

        let trace_uri = trace.trace_path.display().to_string();

        if trace.next_expected.is_none() {
            if let Some(reader) = trace.reader.as_mut() {
                let base = Url::parse(&format!("{}://127.0.0.1:{}/", scheme, port)).unwrap();
                match TraceCodec::next_expected(reader, &base) {
                    Ok(next) => trace.next_expected = next,
                    Err(e) => {
                        trace.message_counter += 1;
                        let mut resp = handler::handle_parse_error(&e);
                        resp.headers.append(handler::TRACE_FILE_HEADER, trace_uri);
                        resp.headers
                            .append(handler::TRACE_FILE_OFFSET_HEADER, trace.message_counter.to_string());
                        return resp;
                    }
                }
            }
        }

        handler::handle_message(
            &mut trace.compare,
            &mut trace.next_expected,
            actual,
            &mut trace.message_counter,
            &trace_uri,
            port,
        )
    }
}

/// Mock HTTP/HTTPS server. Log, replay or compare traffic against a recorded
/// trace file; owns an in-memory `Resolver` that is installed as the process
/// default while running.
pub struct Server {
    config: ServerConfig,
    resolver: Option<Arc<Resolver>>,
    address: Option<std::net::IpAddr>,
    port: Option<u16>,
    worker: Option<WorkerHandle>,
    shared: Option<Arc<SharedState>>,
    trace_open: bool,
    /// Holds a loaded trace when `load_trace` runs before `run()` (no
    /// `SharedState` yet to move it into); adopted by the next `run()`.
    pending_trace: Option<TraceState>,
    /// Installed via `set_compare_filter`/`filter_ignore_parameter_values`;
    /// applied to every `CompareEngine` created by a subsequent trace load,
    /// and pushed live into the currently loaded trace if one is open.
    compare_filter: Option<Arc<dyn CompareFilter + Send + Sync>>,
    /// Installed via `set_handle_message`; consulted before the default
    /// trace-replay dispatch on every incoming request.
    handle_message: Option<Arc<HandleMessageFn>>,
}

impl Server {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            resolver: None,
            address: None,
            port: None,
            worker: None,
            shared: None,
            trace_open: false,
            pending_trace: None,
            compare_filter: None,
            handle_message: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ServerConfig {
        &mut self.config
    }

    pub fn address(&self) -> Option<std::net::IpAddr> {
        self.address
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn resolver(&self) -> Option<&Arc<Resolver>> {
        self.resolver.as_ref()
    }

    // ---- Pluggable callbacks ---------------------------------------------
    //
    // `handle-message` and `compare-messages` are signals on `UhmServer`
    // with overridable default handlers; here they're two plain callback
    // slots held directly by `Server` instead.

    /// Install a filter that replaces the default comparator for every
    /// message comparison from now on, mirroring
    /// `uhm_server_filter_ignore_parameter_values()`'s general mechanism.
    /// Applies immediately to the currently loaded trace (if any) and to
    /// every trace loaded afterwards, until `remove_compare_filter` is
    /// called.
    pub fn set_compare_filter(&mut self, filter: Arc<dyn CompareFilter + Send + Sync>) {
        self.compare_filter = Some(Arc::clone(&filter));
        if let Some(shared) = &self.shared {
            let mut inner = shared.inner.lock().unwrap();
            inner.compare_filter = Some(Arc::clone(&filter));
            if let Some(trace) = inner.trace.as_mut() {
                trace.compare.set_filter(filter);
            }
        }
    }

    /// Convenience wrapper over `set_compare_filter` for the one standard
    /// filter, mirroring `uhm_server_filter_ignore_parameter_values()`
    /// directly: the named query parameters must still be present on both
    /// sides, but their values are no longer compared.
    pub fn filter_ignore_parameter_values(&mut self, parameter_names: Vec<String>) {
        self.set_compare_filter(Arc::new(IgnoreQueryParamsFilter::new(parameter_names)));
    }

    /// Uninstall a previously-installed compare filter, reverting to the
    /// default comparator, mirroring `uhm_server_compare_messages_remove_filter()`.
    pub fn remove_compare_filter(&mut self) {
        self.compare_filter = None;
        if let Some(shared) = &self.shared {
            let mut inner = shared.inner.lock().unwrap();
            inner.compare_filter = None;
            if let Some(trace) = inner.trace.as_mut() {
                trace.compare.remove_filter();
            }
        }
    }

    /// Install a `handle-message` override: consulted on every incoming
    /// request before the default trace-replay dispatch. Returning
    /// `Some(response)` fully handles the request; `None` falls through to
    /// the default behavior.
    pub fn set_handle_message(&mut self, callback: Arc<HandleMessageFn>) {
        self.handle_message = Some(Arc::clone(&callback));
        if let Some(shared) = &self.shared {
            shared.inner.lock().unwrap().handle_message = Some(callback);
        }
    }

    /// Remove a previously-installed `handle-message` override.
    pub fn remove_handle_message(&mut self) {
        self.handle_message = None;
        if let Some(shared) = &self.shared {
            shared.inner.lock().unwrap().handle_message = None;
        }
    }

    // ---- Lifecycle -----------------------------------------------------

    /// Bind a loopback listener, install the resolver as the process
    /// default, apply `expected_domain_names`, and spawn the worker thread.
    pub fn run(&mut self) -> Result<(), ServerError> {
        if self.worker.is_some() {
            return Err(ServerError::InvalidState("server is already running".to_string()));
        }

        let std_listener = worker::bind_loopback()?;
        let local_addr = std_listener.local_addr()?;

        let resolver = Arc::new(Resolver::new());
        install::install(Arc::clone(&resolver))?;
        for name in &self.config.expected_domain_names {
            // Pointed at the server's own address: a client resolving an
            // expected domain name lands back on the mock listener.
            resolver.add_a(name, &local_addr.ip().to_string());
        }

        let tls_config = match &self.config.tls_certificate {
            Some(cert) => Some(cert.build_server_config()?),
            None => None,
        };

        let shared = Arc::new(SharedState {
            inner: Mutex::new(SharedInner {
                trace: self.pending_trace.take(),
                port: local_addr.port(),
                tls: tls_config.is_some(),
                compare_filter: self.compare_filter.clone(),
                handle_message: self.handle_message.clone(),
            }),
        });

        let handle = match worker::spawn(std_listener, tls_config, Arc::clone(&shared)) {
            Ok(handle) => handle,
            Err(e) => {
                install::uninstall();
                return Err(e);
            }
        };

        self.resolver = Some(resolver);
        self.address = Some(local_addr.ip());
        self.port = Some(local_addr.port());
        self.worker = Some(handle);
        self.shared = Some(shared);
        Ok(())
    }

    /// Post shutdown to the worker thread, join it, reset the resolver, and
    /// unload any loaded trace.
    pub fn stop(&mut self) -> Result<(), ServerError> {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
        install::uninstall();
        if let Some(resolver) = self.resolver.take() {
            resolver.reset();
        }
        self.address = None;
        self.port = None;
        self.shared = None;
        self.unload_trace()?;
        Ok(())
    }

    // ---- Trace orchestration -------------------------------------------

    fn base_uri(&self) -> Url {
        let scheme = if self.config.tls_certificate.is_some() { "https" } else { "http" };
        let port = self.port.unwrap_or(0);
        Url::parse(&format!("{}://127.0.0.1:{}/", scheme, port)).unwrap()
    }

    /// A fresh `CompareEngine`, with the currently installed compare filter
    /// (if any) already applied.
    fn new_compare_engine(&self) -> CompareEngine {
        let mut engine = CompareEngine::new();
        if let Some(filter) = &self.compare_filter {
            engine.set_filter(Arc::clone(filter));
        }
        engine
    }

    /// Open `file`, pre-parse its first record, reset the message counter and
    /// compare state, then apply `<file>.hosts` (if present) to the resolver.
    pub fn load_trace(&mut self, file: impl AsRef<Path>) -> Result<(), ServerError> {
        let file = file.as_ref();
        {
            let shared = self.shared.as_ref();
            let already_loaded = shared
                .map(|s| s.inner.lock().unwrap().trace.is_some())
                .unwrap_or(self.trace_open);
            if already_loaded {
                return Err(ServerError::InvalidState("a trace is already loaded".to_string()));
            }
        }

        let base = self.base_uri();
        let mut reader = BufReader::new(File::open(file)?);
        let next_expected = TraceCodec::next_expected(&mut reader, &base)?;

        let state = TraceState {
            trace_path: file.to_path_buf(),
            reader: Some(reader),
            log_writer: None,
            hosts_writer: None,
            hosts_seen: HashSet::new(),
            next_expected,
            message_counter: 0,
            compare: self.new_compare_engine(),
        };

        self.install_trace_state(state);
        self.trace_open = true;

        let hosts_path = hosts_sidefile_path(file);
        match fs::read_to_string(&hosts_path) {
            Ok(contents) => {
                if let Some(resolver) = &self.resolver {
                    let server_ip = self.address.map(|a| a.to_string()).unwrap_or_else(|| "127.0.0.1".to_string());
                    for line in contents.lines() {
                        if !line.trim().is_empty() {
                            resolver.add_a(line.trim(), &server_ip);
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    /// Same contract as `load_trace`, run off the calling thread via
    /// `std::thread::spawn`; the returned handle's `join` is
    /// `load_trace_finish`.
    pub fn load_trace_async(&self, file: impl AsRef<Path>) -> TraceLoadHandle {
        let file = file.as_ref().to_path_buf();
        let base = self.base_uri();
        let join_handle = std::thread::spawn(move || -> Result<PreparsedTrace, ServerError> {
            let mut reader = BufReader::new(File::open(&file)?);
            let next_expected = TraceCodec::next_expected(&mut reader, &base)?;
            Ok(PreparsedTrace {
                trace_path: file,
                reader,
                next_expected,
            })
        });
        TraceLoadHandle { join_handle: Some(join_handle) }
    }

    /// Join an async load started with `load_trace_async` and install its
    /// result, applying the `.hosts` side-file exactly as `load_trace` does.
    pub fn load_trace_finish(&mut self, handle: TraceLoadHandle) -> Result<(), ServerError> {
        let preparsed = handle.join()?;
        let state = TraceState {
            trace_path: preparsed.trace_path.clone(),
            reader: Some(preparsed.reader),
            log_writer: None,
            hosts_writer: None,
            hosts_seen: HashSet::new(),
            next_expected: preparsed.next_expected,
            message_counter: 0,
            compare: self.new_compare_engine(),
        };
        self.install_trace_state(state);
        self.trace_open = true;

        let hosts_path = hosts_sidefile_path(&preparsed.trace_path);
        match fs::read_to_string(&hosts_path) {
            Ok(contents) => {
                if let Some(resolver) = &self.resolver {
                    let server_ip = self.address.map(|a| a.to_string()).unwrap_or_else(|| "127.0.0.1".to_string());
                    for line in contents.lines() {
                        if !line.trim().is_empty() {
                            resolver.add_a(line.trim(), &server_ip);
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn install_trace_state(&mut self, state: TraceState) {
        if let Some(shared) = &self.shared {
            shared.inner.lock().unwrap().trace = Some(state);
        } else {
            // Not running yet: stash locally so `run()` can adopt it. In
            // practice trace loading after run() is the common path, since
            // the hosts file needs the bound address to seed the resolver.
            self.pending_trace = Some(state);
        }
    }

    /// Clear the trace file, input stream, `next_expected` and compare
    /// buffer; reset the message counter.
    pub fn unload_trace(&mut self) -> Result<(), ServerError> {
        self.trace_open = false;
        let state = if let Some(shared) = &self.shared {
            shared.inner.lock().unwrap().trace.take()
        } else {
            self.pending_trace.take()
        };
        if let Some(state) = state {
            state.unload()?;
        }
        Ok(())
    }

    /// Convenience over `load_trace`/`run`/logging-stream setup, resolving
    /// `name` under `trace_directory` and branching on `enable_online` ×
    /// `enable_logging`, mirroring `uhm_server_start_trace()`. Nesting
    /// without a matching `end_trace` is an error.
    pub fn start_trace(&mut self, name: &str) -> Result<(), ServerError> {
        let file = self.config.trace_directory.join(name);
        self.start_trace_full(&file)
    }

    pub fn start_trace_full(&mut self, file: impl AsRef<Path>) -> Result<(), ServerError> {
        if self.trace_open {
            return Err(ServerError::InvalidState(
                "a trace is already started; call end_trace first".to_string(),
            ));
        }
        let file = file.as_ref();

        match (self.config.enable_online, self.config.enable_logging) {
            (_, true) => {
                // Logging: open output streams (trace + hosts), recording
                // whatever traffic actually happens.
                let log_writer = BufWriter::new(File::create(file)?);
                let hosts_writer = BufWriter::new(File::create(hosts_sidefile_path(file))?);
                let state = TraceState {
                    trace_path: file.to_path_buf(),
                    reader: None,
                    log_writer: Some(log_writer),
                    hosts_writer: Some(hosts_writer),
                    hosts_seen: HashSet::new(),
                    next_expected: None,
                    message_counter: 0,
                    compare: self.new_compare_engine(),
                };
                self.install_trace_state(state);
                self.trace_open = true;
                if !self.config.enable_online {
                    self.run()?;
                }
                Ok(())
            }
            (false, false) => {
                // Replay: run and load the trace so requests are intercepted.
                self.run()?;
                self.load_trace(file)?;
                self.trace_open = true;
                Ok(())
            }
            (true, false) => {
                // Compare: load-only; traffic runs live and is diffed via
                // ingest_chunk/ingest_chunk_line.
                self.load_trace(file)?;
                self.trace_open = true;
                Ok(())
            }
        }
    }

    pub fn end_trace(&mut self) -> Result<(), ServerError> {
        if !self.trace_open {
            return Err(ServerError::InvalidState("no trace is started".to_string()));
        }
        self.unload_trace()?;
        if self.is_running() && !self.config.enable_online {
            self.stop()?;
        }
        Ok(())
    }

    // ---- Compare ingestion ----------------------------------------------

    /// Feed one line of a live client's chunk log through the compare state
    /// machine, mirroring `uhm_server_received_message_chunk()`. In
    /// online+compare mode, a completed exchange is compared against
    /// `next_expected`; a mismatch surfaces as
    /// `MessageMismatch`. In online+log mode, completion instead records the
    /// host header to the hosts output stream (deduplicated) and performs no
    /// comparison.
    pub fn ingest_chunk_line(&mut self, line: &str) -> Result<(), ServerError> {
        let Some(shared) = &self.shared else {
            return Err(ServerError::InvalidState("server is not running".to_string()));
        };
        let mut inner = shared.inner.lock().unwrap();
        let port = inner.port;
        let scheme = if inner.tls { "https" } else { "http" };
        let Some(trace) = inner.trace.as_mut() else {
            return Ok(());
        };

        let Some(record) = trace.compare.ingest_line(line) else {
            return Ok(());
        };

        let base = Url::parse(&format!("{}://127.0.0.1:{}/", scheme, port)).unwrap();
        let reassembled = CompareEngine::parse_reassembled(&record, &base)?;

        if self.config.enable_logging {
            if let Some(writer) = trace.log_writer.as_mut() {
                for line in &record.req_lines {
                    writeln!(writer, "{}", line)?;
                }
                for line in &record.resp_lines {
                    writeln!(writer, "{}", line)?;
                }
            }
            if let Some(host) = reassembled.request_headers().get("Host") {
                if trace.hosts_seen.insert(host.to_string()) {
                    if let Some(writer) = trace.hosts_writer.as_mut() {
                        writeln!(writer, "{}", host)?;
                    }
                }
            }
            return Ok(());
        }

        let expected = trace.next_expected.take();
        match &expected {
            Some(expected) if trace.compare.equal(expected, &reassembled) => {
                trace.message_counter += 1;
                Ok(())
            }
            Some(expected) => {
                trace.message_counter += 1;
                Err(ServerError::MessageMismatch {
                    expected_uri: expected.path_and_query(),
                    actual_uri: reassembled.path_and_query(),
                })
            }
            None => Err(ServerError::MessageMismatch {
                expected_uri: String::new(),
                actual_uri: reassembled.path_and_query(),
            }),
        }
    }

    /// Split `data` on LF and feed each resulting line through
    /// `ingest_chunk_line`. `direction` is accepted for API parity with the
    /// original (`UHM_SERVER_MESSAGE_DIRECTION_REQUEST`/`RESPONSE`) but the
    /// lines are already self-describing via their `"> "`/`"< "` tags.
    pub fn ingest_chunk(&mut self, _direction: MessageDirection, data: &str) -> Result<(), ServerError> {
        for line in data.lines() {
            self.ingest_chunk_line(line)?;
        }
        Ok(())
    }

    // ---- Family lookup convenience (used by tests / callers wiring DNS) --

    pub fn lookup_by_name(&self, name: &str, family: IpFamily) -> Result<Vec<std::net::IpAddr>, ServerError> {
        let resolver = self
            .resolver
            .as_ref()
            .ok_or_else(|| ServerError::InvalidState("server is not running".to_string()))?;
        Ok(resolver.lookup_by_name(name, family)?)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    Request,
    Response,
}

struct PreparsedTrace {
    trace_path: PathBuf,
    reader: BufReader<File>,
    next_expected: Option<Message>,
}

/// Handle for an in-flight `load_trace_async`; join it with
/// `Server::load_trace_finish`.
pub struct TraceLoadHandle {
    join_handle: Option<std::thread::JoinHandle<Result<PreparsedTrace, ServerError>>>,
}

impl TraceLoadHandle {
    fn join(mut self) -> Result<PreparsedTrace, ServerError> {
        let handle = self.join_handle.take().expect("TraceLoadHandle polled twice");
        handle
            .join()
            .unwrap_or_else(|_| Err(ServerError::Io(std::io::Error::other("trace load thread panicked"))))
    }
}

fn hosts_sidefile_path(trace_file: &Path) -> PathBuf {
    let mut name = trace_file.as_os_str().to_os_string();
    name.push(".hosts");
    PathBuf::from(name)
}

/// Extract an owned `Message` from an incoming hyper request, reading the
/// full body. `server_handler_cb()` builds its `UhmMessage` from a live
/// `SoupServerMessage` it can alias; here the body becomes an owned copy
/// instead, since hyper's `Incoming` body is consumed rather than a
/// listener object we can borrow from again.
///
/// Ordinary HTTP/1.1 clients send origin-form request lines (`GET /x
/// HTTP/1.1` plus a separate `Host:` header) — `req.uri()` for those is just
/// the path-and-query, with no scheme or authority. Resolving it against
/// `base` (the server's own origin) turns it into the absolute URI
/// `Message`/`CompareEngine` expect; an already-absolute request line (e.g.
/// proxy-style) is returned unchanged since `Url`'s base-relative parsing
/// ignores the base once the input supplies its own scheme.
async fn message_from_request(req: Request<Incoming>, base: &Url) -> Result<Message, ServerError> {
    let method = req.method().to_string();
    let uri_str = req.uri().to_string();
    let uri = Url::options()
        .base_url(Some(base))
        .parse(&uri_str)
        .unwrap_or_else(|_| base.clone());

    let mut message = Message::new_from_uri(method, uri);
    for (name, value) in req.headers() {
        message
            .request_headers_mut()
            .append(name.as_str().to_string(), value.to_str().unwrap_or("").to_string());
    }

    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| ServerError::Io(std::io::Error::other(e.to_string())))?
        .to_bytes();
    message.request_body_mut().append(&body);
    message.request_body_mut().complete();
    Ok(message)
}

fn response_from_handled(handled: HandledResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(handled.status);
    for (name, value) in handled.headers.iter() {
        builder = builder.header(name, value);
    }
    builder
        .body(Full::new(Bytes::from(handled.body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}
