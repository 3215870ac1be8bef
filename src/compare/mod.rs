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

//! Message comparator plus the compare-mode line-stream state machine that
//! reconstitutes full request/response records from a live client's chunk log.

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::message::Message;
use crate::trace::{TraceCodec, TraceParseError};

/// A predicate comparing an expected message against an actual one. Filters
/// replace the default comparator rather than augmenting it.
pub trait CompareFilter {
    fn equal(&self, expected: &Message, actual: &Message) -> bool;
}

/// The built-in comparator: method plus URI user/password/path/query/fragment,
/// case-sensitive. Host, port and scheme are intentionally ignored.
pub struct DefaultFilter;

impl CompareFilter for DefaultFilter {
    fn equal(&self, expected: &Message, actual: &Message) -> bool {
        if expected.method() != actual.method() {
            return false;
        }
        let (Some(exp_uri), Some(act_uri)) = (expected.uri(), actual.uri()) else {
            return expected.uri().is_none() && actual.uri().is_none();
        };
        exp_uri.username() == act_uri.username()
            && exp_uri.password() == act_uri.password()
            && exp_uri.path() == act_uri.path()
            && exp_uri.query() == act_uri.query()
            && exp_uri.fragment() == act_uri.fragment()
    }
}

/// Ignores the listed query parameter values while still requiring the
/// parameters to be present on both sides. All other default-equality
/// requirements (method, user/password/path/fragment) still apply.
pub struct IgnoreQueryParamsFilter {
    pub ignored: Vec<String>,
}

impl IgnoreQueryParamsFilter {
    pub fn new(ignored: Vec<String>) -> Self {
        Self { ignored }
    }

    fn decode_query(uri: Option<&Url>) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(uri) = uri {
            for (k, v) in uri.query_pairs() {
                map.insert(k.into_owned(), v.into_owned());
            }
        }
        map
    }
}

impl CompareFilter for IgnoreQueryParamsFilter {
    fn equal(&self, expected: &Message, actual: &Message) -> bool {
        if expected.method() != actual.method() {
            return false;
        }
        let (Some(exp_uri), Some(act_uri)) = (expected.uri(), actual.uri()) else {
            return expected.uri().is_none() && actual.uri().is_none();
        };
        if exp_uri.username() != act_uri.username()
            || exp_uri.password() != act_uri.password()
            || exp_uri.path() != act_uri.path()
            || exp_uri.fragment() != act_uri.fragment()
        {
            return false;
        }

        let mut exp_params = Self::decode_query(Some(exp_uri));
        let mut act_params = Self::decode_query(Some(act_uri));

        for name in &self.ignored {
            let exp_has = exp_params.remove(name);
            let act_has = act_params.remove(name);
            if exp_has.is_none() || act_has.is_none() {
                return false;
            }
        }

        exp_params == act_params
    }
}

/// State of the compare-mode line reassembly machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    Unknown,
    ReqData,
    ReqTerm,
    RespData,
    RespTerm,
}

/// A full request+response reconstituted from the live chunk stream, ready to
/// be compared against the trace's next expected message.
#[derive(Debug)]
pub struct ReassembledRecord {
    pub req_lines: Vec<String>,
    pub resp_lines: Vec<String>,
}

/// Comparator plus line-stream reassembler. Holds the default filter;
/// callers may install an override with `set_filter`, mirroring
/// `uhm_server_filter_ignore_parameter_values()` — it stays in place for
/// every subsequent `equal()` call until `remove_filter()` is called.
pub struct CompareEngine {
    default_filter: Box<dyn CompareFilter + Send + Sync>,
    override_filter: Option<Arc<dyn CompareFilter + Send + Sync>>,
    state: LineState,
    req_lines: Vec<String>,
    resp_lines: Vec<String>,
}

impl CompareEngine {
    pub fn new() -> Self {
        Self {
            default_filter: Box::new(DefaultFilter),
            override_filter: None,
            state: LineState::Unknown,
            req_lines: Vec::new(),
            resp_lines: Vec::new(),
        }
    }

    pub fn with_default_filter(filter: Box<dyn CompareFilter + Send + Sync>) -> Self {
        Self {
            default_filter: filter,
            override_filter: None,
            state: LineState::Unknown,
            req_lines: Vec::new(),
            resp_lines: Vec::new(),
        }
    }

    /// Install a filter that replaces the default comparator for every
    /// subsequent `equal()` call, until `remove_filter` is called. Only one
    /// override can be installed at a time, matching the upstream note that
    /// "only one of the installed comparison functions will be used." Takes
    /// an `Arc` so a `Server` can share one installed filter across every
    /// trace it loads.
    pub fn set_filter(&mut self, filter: Arc<dyn CompareFilter + Send + Sync>) {
        self.override_filter = Some(filter);
    }

    /// Uninstall a previously-installed override filter, reverting to the
    /// default comparator.
    pub fn remove_filter(&mut self) {
        self.override_filter = None;
    }

    pub fn equal(&mut self, expected: &Message, actual: &Message) -> bool {
        match &self.override_filter {
            Some(filter) => filter.equal(expected, actual),
            None => self.default_filter.equal(expected, actual),
        }
    }

    /// Clear reassembly state (e.g. when unloading a trace).
    pub fn reset_stream(&mut self) {
        self.state = LineState::Unknown;
        self.req_lines.clear();
        self.resp_lines.clear();
    }

    /// Feed one already-tagged line (`"> ..."`, `"< ..."`, or the bare `"  "`
    /// terminator) into the reassembly machine. Returns a completed record the
    /// instant the machine transitions into `RESP_TERM`; the internal buffers
    /// are cleared immediately after.
    pub fn ingest_line(&mut self, line: &str) -> Option<ReassembledRecord> {
        let prefix: &str = if line.len() >= 2 { &line[..2] } else { line };
        let next_state = match (self.state, prefix) {
            (LineState::Unknown, "> ") => LineState::ReqData,
            (LineState::Unknown, _) => LineState::Unknown,

            (LineState::ReqData, "> ") => LineState::ReqData,
            (LineState::ReqData, "  ") => LineState::ReqTerm,
            (LineState::ReqData, _) => LineState::Unknown,

            (LineState::ReqTerm, "< ") => LineState::RespData,
            (LineState::ReqTerm, _) => LineState::Unknown,

            (LineState::RespData, "< ") => LineState::RespData,
            (LineState::RespData, "  ") => LineState::RespTerm,
            (LineState::RespData, _) => LineState::Unknown,

            (LineState::RespTerm, "> ") => LineState::ReqData,
            (LineState::RespTerm, _) => LineState::Unknown,
        };

        match next_state {
            LineState::ReqData => self.req_lines.push(line.to_string()),
            LineState::ReqTerm => self.req_lines.push(line.to_string()),
            LineState::RespData => self.resp_lines.push(line.to_string()),
            LineState::RespTerm => self.resp_lines.push(line.to_string()),
            LineState::Unknown => {}
        }

        if next_state == LineState::Unknown {
            // Dropping out of an in-progress record discards any partial
            // buffers; a stray line never resumes a prior reassembly.
            self.req_lines.clear();
            self.resp_lines.clear();
        }

        self.state = next_state;

        if next_state == LineState::RespTerm {
            let record = ReassembledRecord {
                req_lines: std::mem::take(&mut self.req_lines),
                resp_lines: std::mem::take(&mut self.resp_lines),
            };
            self.state = LineState::Unknown;
            return Some(record);
        }
        None
    }

    /// Parse a reassembled record into a `Message` using the same grammar as
    /// the trace file codec.
    pub fn parse_reassembled(
        record: &ReassembledRecord,
        base_uri: &Url,
    ) -> Result<Message, TraceParseError> {
        TraceCodec::parse_record(&record.req_lines, &record.resp_lines, base_uri, 0)
    }
}

impl Default for CompareEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(uri: &str) -> Message {
        Message::new_from_uri("GET", Url::parse(uri).unwrap())
    }

    #[test]
    fn default_filter_ignores_host_port_scheme() {
        let mut engine = CompareEngine::new();
        let expected = msg("http://expected.example.org:8080/x?a=1");
        let actual = msg("https://actual.example.org:9090/x?a=1");
        assert!(engine.equal(&expected, &actual));
    }

    #[test]
    fn default_filter_rejects_path_mismatch() {
        let mut engine = CompareEngine::new();
        let expected = msg("http://example.org/x");
        let actual = msg("http://example.org/y");
        assert!(!engine.equal(&expected, &actual));
    }

    #[test]
    fn ignore_query_params_filter_requires_presence_on_both_sides() {
        let filter = IgnoreQueryParamsFilter::new(vec!["token".to_string()]);
        let expected = msg("http://example.org/x?token=abc&id=1");
        let actual_missing = msg("http://example.org/x?id=1");
        assert!(!filter.equal(&expected, &actual_missing));

        let actual_present = msg("http://example.org/x?token=xyz&id=1");
        assert!(filter.equal(&expected, &actual_present));
    }

    #[test]
    fn ignore_query_params_filter_rejects_other_param_mismatch() {
        let filter = IgnoreQueryParamsFilter::new(vec!["token".to_string()]);
        let expected = msg("http://example.org/x?token=abc&id=1");
        let actual = msg("http://example.org/x?token=xyz&id=2");
        assert!(!filter.equal(&expected, &actual));
    }

    #[test]
    fn installed_filter_stays_until_removed() {
        let mut engine = CompareEngine::new();
        engine.set_filter(Arc::new(IgnoreQueryParamsFilter::new(vec!["t".to_string()])));
        let expected = msg("http://example.org/x?t=1");
        let actual = msg("http://example.org/x?t=2");
        assert!(engine.equal(&expected, &actual));
        // Still installed: a second call also ignores the parameter.
        assert!(engine.equal(&expected, &actual));

        engine.remove_filter();
        // Removed: the restored default filter does compare the query.
        assert!(!engine.equal(&expected, &actual));
    }

    #[test]
    fn stray_response_before_any_request_is_dropped() {
        let mut engine = CompareEngine::new();
        assert!(engine.ingest_line("< HTTP/1.1 200 OK").is_none());
        assert!(engine.ingest_line("< Content-Length: 0").is_none());
        assert!(engine.ingest_line("  ").is_none());
        assert_eq!(engine.state, LineState::Unknown);
    }

    #[test]
    fn full_exchange_completes_on_response_terminator() {
        let mut engine = CompareEngine::new();
        assert!(engine.ingest_line("> GET /x HTTP/1.1").is_none());
        assert!(engine.ingest_line("> ").is_none());
        assert!(engine.ingest_line("  ").is_none());
        assert!(engine.ingest_line("< HTTP/1.1 200 OK").is_none());
        assert!(engine.ingest_line("< ").is_none());
        let record = engine.ingest_line("  ").expect("response terminator completes the record");
        assert_eq!(record.req_lines.len(), 2);
        assert_eq!(record.resp_lines.len(), 2);
    }

    #[test]
    fn terminator_reopens_into_new_request() {
        let mut engine = CompareEngine::new();
        engine.ingest_line("> GET /x HTTP/1.1");
        engine.ingest_line("> ");
        engine.ingest_line("  ");
        engine.ingest_line("< HTTP/1.1 200 OK");
        engine.ingest_line("< ");
        engine.ingest_line("  ");
        // RESP_TERM + "> " reopens a fresh request without needing an UNKNOWN line between records.
        assert!(engine.ingest_line("> GET /y HTTP/1.1").is_none());
        assert_eq!(engine.state, LineState::ReqData);
    }
}
